use heapless::Vec;
use serde::Serialize;

/// Maximum number of peaks retained by [`find_peaks`].
pub const MAX_PEAKS: usize = 10;

/// Lowest bin considered by the peak search.
pub const PEAK_SEARCH_START: usize = 5;

/// Minimum distance in bins between two accepted peaks.
pub const MIN_PEAK_SEPARATION: usize = 10;

/// A spectral peak.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Peak {
    /// Bin index in `[0, N/2)`.
    pub bin: usize,
    /// Bin center frequency in Hz.
    pub frequency: f32,
    pub magnitude: f32,
    /// Parabolically interpolated frequency in Hz, within half a bin of
    /// `frequency`.
    pub refined_frequency: f32,
}

/// The two strongest peaks of a spectrum in ascending frequency order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct DualPeaks {
    pub a: Option<Peak>,
    pub b: Option<Peak>,
    /// `|f_a - f_b|` of the refined frequencies, zero unless both are found.
    pub separation: f32,
}

impl DualPeaks {
    /// Number of peaks found, 0 to 2.
    pub fn found(&self) -> usize {
        self.a.is_some() as usize + self.b.is_some() as usize
    }
}

/// Fractional bin offset of the vertex of a parabola through three
/// equidistant points.
///
/// # Args
/// * `y` - Magnitudes at bins `k - 1`, `k`, `k + 1`.
///
/// # Returns
/// Offset from `k` clamped to `[-0.5, 0.5]`. A flat neighborhood
/// (vanishing curvature) yields zero.
pub fn parabolic_offset(y: [f32; 3]) -> f32 {
    let denominator = y[0] - 2.0 * y[1] + y[2];
    if denominator.abs() < 1e-10 {
        return 0.0;
    }
    (0.5 * (y[0] - y[2]) / denominator).clamp(-0.5, 0.5)
}

/// Interpolated frequency of a bin.
///
/// Bins at the edges of `[0, N/2)` are returned without refinement.
pub fn refine_frequency(
    magnitude: &[f32],
    bin: usize,
    sampling_frequency: f32,
) -> f32 {
    let resolution = sampling_frequency / magnitude.len() as f32;
    if bin <= 1 || bin >= (magnitude.len() / 2).saturating_sub(1) {
        return bin as f32 * resolution;
    }
    let delta = parabolic_offset([
        magnitude[bin - 1],
        magnitude[bin],
        magnitude[bin + 1],
    ]);
    (bin as f32 + delta) * resolution
}

/// Find isolated local maxima in a magnitude spectrum.
///
/// # Args
/// * `magnitude` - Full length magnitude spectrum. Only the lower half is
///   searched.
/// * `max_count` - Maximum number of peaks to return.
/// * `sampling_frequency` - Sample rate in Hz.
/// * `relative_threshold` - Threshold relative to the largest magnitude at
///   or above bin 5.
///
/// # Returns
/// Peaks sorted by descending magnitude.
pub fn find_peaks(
    magnitude: &[f32],
    max_count: usize,
    sampling_frequency: f32,
    relative_threshold: f32,
) -> Vec<Peak, MAX_PEAKS> {
    let half = magnitude.len() / 2;
    let resolution = sampling_frequency / magnitude.len() as f32;
    let mut peaks: Vec<Peak, MAX_PEAKS> = Vec::new();
    if half <= PEAK_SEARCH_START + 1 {
        return peaks;
    }

    let reference = magnitude[PEAK_SEARCH_START..half]
        .iter()
        .fold(0.0f32, |a, &m| a.max(m));
    let threshold = reference * relative_threshold;

    for bin in PEAK_SEARCH_START..half - 1 {
        let m = magnitude[bin];
        let local_max = m > magnitude[bin - 1] && m > magnitude[bin + 1];
        if !(local_max && m > threshold) {
            continue;
        }
        if peaks
            .iter()
            .any(|p| p.bin.abs_diff(bin) < MIN_PEAK_SEPARATION)
        {
            continue;
        }
        let peak = Peak {
            bin,
            frequency: bin as f32 * resolution,
            magnitude: m,
            refined_frequency: refine_frequency(
                magnitude,
                bin,
                sampling_frequency,
            ),
        };
        if peaks.push(peak).is_err() {
            break;
        }
    }

    peaks.sort_unstable_by(|a, b| {
        b.magnitude
            .total_cmp(&a.magnitude)
            .then(a.bin.cmp(&b.bin))
    });
    peaks.truncate(max_count);
    peaks
}

/// Find the two strongest isolated peaks.
///
/// The peaks are ranked by magnitude, then reported in ascending order of
/// refined frequency.
pub fn find_dual_peaks(
    magnitude: &[f32],
    sampling_frequency: f32,
    relative_threshold: f32,
) -> DualPeaks {
    let peaks =
        find_peaks(magnitude, 2, sampling_frequency, relative_threshold);
    let mut result = DualPeaks {
        a: peaks.first().copied(),
        b: peaks.get(1).copied(),
        separation: 0.0,
    };
    if let (Some(a), Some(b)) = (result.a, result.b) {
        result.separation =
            (a.refined_frequency - b.refined_frequency).abs();
        if a.refined_frequency > b.refined_frequency {
            result.a = Some(b);
            result.b = Some(a);
        }
    }
    result
}

/// Interpolated frequency of the strongest bin in `[1, N/2)`.
///
/// Zero if that range is empty.
pub fn precise_peak_frequency(
    magnitude: &[f32],
    sampling_frequency: f32,
) -> f32 {
    if magnitude.len() < 4 {
        return 0.0;
    }
    let mut max_bin = 1;
    let mut max = 0.0;
    for (bin, &m) in magnitude
        .iter()
        .enumerate()
        .take(magnitude.len() / 2)
        .skip(1)
    {
        if m > max {
            max = m;
            max_bin = bin;
        }
    }
    refine_frequency(magnitude, max_bin, sampling_frequency)
}

/// Round a frequency to the nearest multiple of 1 kHz.
pub fn round_to_nearest_k(frequency: f32) -> f32 {
    libm::roundf(frequency / 1000.0) * 1000.0
}

/// Total harmonic distortion in percent.
///
/// Harmonics 2 through 10 below Nyquist are included. Spectral leakage is
/// accounted for by adding the neighboring bins with weight 1/2 (fundamental)
/// and 1/4 (harmonics) in power.
///
/// # Args
/// * `magnitude` - Magnitude spectrum.
/// * `fundamental` - Fundamental frequency in Hz.
/// * `sampling_frequency` - Sample rate in Hz.
///
/// # Returns
/// THD in percent or zero if the fundamental is out of range or absent.
pub fn thd(
    magnitude: &[f32],
    fundamental: f32,
    sampling_frequency: f32,
) -> f32 {
    let half = magnitude.len() / 2;
    let resolution = sampling_frequency / magnitude.len() as f32;
    let bin = (fundamental / resolution + 0.5) as usize;
    if bin < 1 || bin >= half {
        return 0.0;
    }
    let power = |bin: usize, weight: f32| {
        let mut p = magnitude[bin] * magnitude[bin];
        if bin > 1 {
            p += weight * magnitude[bin - 1] * magnitude[bin - 1];
        }
        if bin < half - 1 {
            p += weight * magnitude[bin + 1] * magnitude[bin + 1];
        }
        p
    };

    let fundamental_power = power(bin, 0.5);
    let harmonic_power: f32 = (2..=10)
        .map(|h| h * bin)
        .take_while(|&h| h < half)
        .map(|h| power(h, 0.25))
        .sum();

    if fundamental_power > 0.0 {
        libm::sqrtf(harmonic_power) / libm::sqrtf(fundamental_power) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{near, near_rel};

    const N: usize = 1024;

    fn spectrum_with(peaks: &[(usize, f32)]) -> [f32; N] {
        let mut m = [0.0; N];
        for &(bin, mag) in peaks {
            m[bin] = mag;
            m[bin - 1] = 0.5 * mag;
            m[bin + 1] = 0.4 * mag;
        }
        m
    }

    #[test]
    fn parabolic() {
        assert_eq!(parabolic_offset([1., 3., 1.]), 0.0);
        let d = parabolic_offset([1., 3., 2.]);
        assert!(d > 0.0 && d <= 0.5);
        assert!(near(d, 1. / 6., 1e-6));
        assert!(parabolic_offset([3., 2., 1.]) <= 0.5);
        assert_eq!(parabolic_offset([2., 2., 2.]), 0.0);
        assert_eq!(parabolic_offset([0., 1., 10.]), -0.5);
    }

    #[test]
    fn refined_within_half_bin() {
        let m = spectrum_with(&[(100, 1.0), (300, 0.3)]);
        for p in find_peaks(&m, MAX_PEAKS, 1024., 0.1) {
            assert!((p.refined_frequency - p.frequency).abs() <= 0.5);
        }
    }

    #[test]
    fn isolation_and_ranking() {
        let mut m = spectrum_with(&[(100, 1.0), (300, 2.0), (450, 0.5)]);
        // Leakage sidelobe too close to the peak at 100.
        m[105] = 0.3;
        let peaks = find_peaks(&m, MAX_PEAKS, 1024., 0.1);
        let bins: std::vec::Vec<_> = peaks.iter().map(|p| p.bin).collect();
        assert_eq!(bins, [300, 100, 450]);

        let peaks = find_peaks(&m, 1, 1024., 0.1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].bin, 300);
    }

    #[test]
    fn threshold_is_relative() {
        let m = spectrum_with(&[(100, 1.0), (300, 0.1)]);
        assert_eq!(find_peaks(&m, MAX_PEAKS, 1024., 0.15).len(), 1);
        assert_eq!(find_peaks(&m, MAX_PEAKS, 1024., 0.05).len(), 2);
    }

    #[test]
    fn edges_are_excluded() {
        let m = spectrum_with(&[(4, 1.0), (511, 1.0), (200, 0.5)]);
        let peaks = find_peaks(&m, MAX_PEAKS, 1024., 0.1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].bin, 200);
    }

    #[test]
    fn dual_peaks_ascending() {
        let m = spectrum_with(&[(120, 0.4), (60, 1.0)]);
        let d = find_dual_peaks(&m, 2048., 0.15);
        assert_eq!(d.found(), 2);
        let (a, b) = (d.a.unwrap(), d.b.unwrap());
        assert_eq!(a.bin, 60);
        assert_eq!(b.bin, 120);
        assert!(a.magnitude > b.magnitude);
        assert!(near(
            d.separation,
            b.refined_frequency - a.refined_frequency,
            1e-3
        ));

        let m = spectrum_with(&[(60, 0.4), (120, 1.0)]);
        let d = find_dual_peaks(&m, 2048., 0.15);
        assert_eq!(d.a.unwrap().bin, 60);
        assert!(d.b.unwrap().magnitude > d.a.unwrap().magnitude);
    }

    #[test]
    fn no_peaks() {
        let d = find_dual_peaks(&[0.0; N], 1000., 0.15);
        assert_eq!(d.found(), 0);
        assert_eq!(d.separation, 0.0);
    }

    #[test]
    fn degenerate_lengths() {
        for m in [&[][..], &[1.0], &[1.0, 2.0], &[1.0, 2.0, 3.0]] {
            assert_eq!(precise_peak_frequency(m, 1000.), 0.0);
            assert_eq!(find_peaks(m, 3, 1000., 0.15).len(), 0);
        }
        assert_eq!(refine_frequency(&[1.0], 3, 1000.), 3000.);
        assert_eq!(refine_frequency(&[1.0, 2.0, 3.0], 2, 300.), 200.);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to_nearest_k(999.6), 1000.);
        assert_eq!(round_to_nearest_k(1499.), 1000.);
        assert_eq!(round_to_nearest_k(1500.), 2000.);
        assert_eq!(round_to_nearest_k(120.), 0.);
    }

    #[test]
    fn thd_of_harmonics() {
        let mut m = [0.0; N];
        m[50] = 1.0;
        m[100] = 0.1;
        m[150] = 0.1;
        let t = thd(&m, 50. * 1024. / N as f32, 1024.);
        assert!(near_rel(t, 100. * libm::sqrtf(0.02), 1e-4));
        assert_eq!(thd(&m, 0.0, 1024.), 0.0);
        assert_eq!(thd(&[0.0; N], 50., 1024.), 0.0);
    }

    #[test]
    fn precise_peak() {
        let m = spectrum_with(&[(100, 1.0)]);
        let f = precise_peak_frequency(&m, 1024.);
        assert!(f > 99.5 && f < 100.0);
    }
}
