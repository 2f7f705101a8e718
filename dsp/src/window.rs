use core::f32::consts::PI;
use serde::{Deserialize, Serialize};

/// Analysis window shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    /// All ones, no compensation.
    Rectangular,
    /// Hamming-type raised cosine `0.539 - 0.46 cos(2 pi i / (N - 1))`.
    #[default]
    Hamming,
}

const HAMMING_A0: f32 = 0.539;
const HAMMING_A1: f32 = 0.46;

/// Window coefficients with their energy compensation factor.
#[derive(Copy, Clone, Debug)]
pub struct Window<const N: usize> {
    kind: WindowKind,
    coefficients: [f32; N],
    compensation: f32,
}

impl<const N: usize> Window<N> {
    /// Build a window of length `N`.
    ///
    /// For the Hamming-type window the compensation is the energy
    /// normalization `N / sum(w[i]^2)`. The rectangular window has unit
    /// compensation.
    pub fn new(kind: WindowKind) -> Self {
        let mut coefficients = [1.0; N];
        let compensation = match kind {
            WindowKind::Rectangular => 1.0,
            WindowKind::Hamming => {
                let scale = 2.0 * PI / (N.max(2) - 1) as f32;
                let mut energy = 0.0;
                for (i, w) in coefficients.iter_mut().enumerate() {
                    *w = HAMMING_A0 - HAMMING_A1 * libm::cosf(scale * i as f32);
                    energy += *w * *w;
                }
                N as f32 / energy
            }
        };
        Self {
            kind,
            coefficients,
            compensation,
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn coefficients(&self) -> &[f32; N] {
        &self.coefficients
    }

    /// Energy compensation factor applied to the magnitude spectrum.
    pub fn compensation(&self) -> f32 {
        self.compensation
    }
}
