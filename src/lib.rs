#![cfg_attr(not(test), no_std)]

pub mod amplitude;
pub mod analysis;
pub mod app;
pub mod da_output;
pub mod keys;
pub mod scheduler;
pub mod settings;
pub mod telemetry;
pub mod tracking;

pub use app::{App, Board, Peripherals};
pub use settings::Settings;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    DaOutput(#[from] da_output::Error),
    #[error(transparent)]
    Fpga(#[from] fpga::Error),
    #[error(transparent)]
    Settings(#[from] settings::Error),
    #[error("DDS access failed")]
    Dds,
    #[error("serial output failed")]
    Serial(#[from] core::fmt::Error),
}
