#![cfg_attr(not(test), no_std)]

mod complex;
pub use complex::*;
mod window;
pub use window::*;
mod fft;
pub use fft::*;
mod spectrum;
pub use spectrum::*;
mod peaks;
pub use peaks::*;
mod kalman;
pub use kalman::*;
mod crossing;
pub use crossing::*;
pub mod pid;

#[cfg(test)]
pub mod testing;
