use core::ops::{Add, Mul, Sub};
use serde::{Deserialize, Serialize};

/// A complex number as a `(re, im)` pair.
///
/// The layout is `#[repr(C)]` so that a slice of `Complex<f32>` can be
/// viewed as interleaved `[re, im, re, im, ...]` floats.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[repr(C)]
pub struct Complex<T>(pub T, pub T);

// Note(unsafe): `Complex<f32>` is `#[repr(C)]` over two `f32` with no padding.
unsafe impl bytemuck::Zeroable for Complex<f32> {}
unsafe impl bytemuck::Pod for Complex<f32> {}

impl Complex<f32> {
    /// Squared magnitude.
    pub fn norm_sqr(&self) -> f32 {
        self.0 * self.0 + self.1 * self.1
    }

    /// Magnitude.
    pub fn abs(&self) -> f32 {
        libm::sqrtf(self.norm_sqr())
    }

    /// Phase angle in radians, `atan2(im, re)`, in `[-pi, pi]`.
    pub fn arg(&self) -> f32 {
        libm::atan2f(self.1, self.0)
    }
}

impl Add for Complex<f32> {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0, self.1 + other.1)
    }
}

impl Sub for Complex<f32> {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0, self.1 - other.1)
    }
}

impl Mul for Complex<f32> {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Self(
            self.0 * other.0 - self.1 * other.1,
            self.0 * other.1 + self.1 * other.0,
        )
    }
}

/// View a complex buffer as interleaved `(re, im)` floats of twice the length.
pub fn interleaved(buf: &[Complex<f32>]) -> &[f32] {
    bytemuck::cast_slice(buf)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Complex(1.0f32, 2.0);
        let b = Complex(3.0f32, -1.0);
        assert_eq!(a + b, Complex(4.0, 1.0));
        assert_eq!(a - b, Complex(-2.0, 3.0));
        assert_eq!(a * b, Complex(5.0, 5.0));
        assert_eq!(Complex(3.0f32, 4.0).abs(), 5.0);
    }

    #[test]
    fn interleaved_view() {
        let buf = [Complex(1.0f32, 2.0), Complex(3.0, 4.0)];
        assert_eq!(interleaved(&buf), &[1.0, 2.0, 3.0, 4.0]);
    }
}
