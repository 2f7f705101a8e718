//! Helpers for numeric tests.
use super::Complex;

/// `actual` deviates from `expected` by at most `tolerance`.
pub fn near(actual: f32, expected: f32, tolerance: f32) -> bool {
    (actual - expected).abs() <= tolerance
}

/// Relative deviation of `actual` from `expected` is at most `relative`.
pub fn near_rel(actual: f32, expected: f32, relative: f32) -> bool {
    near(actual, expected, relative * expected.abs())
}

/// Largest magnitude of the bin wise difference of two spectra.
pub fn max_deviation(a: &[Complex<f32>], b: &[Complex<f32>]) -> f32 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&a, &b)| (a - b).abs())
        .fold(0.0, f32::max)
}

/// Sampled cosine `amplitude * cos(2 pi f n / fs + phase)`.
pub fn tone(
    frequency: f32,
    fs: f32,
    amplitude: f32,
    phase: f32,
    len: usize,
) -> impl Iterator<Item = f32> {
    (0..len).map(move |i| {
        amplitude
            * libm::cosf(
                core::f32::consts::TAU * frequency * i as f32 / fs + phase,
            )
    })
}
