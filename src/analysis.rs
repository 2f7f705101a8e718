//! Dual peak analysis of the FPGA capture and DA auto configuration.
use dsp::{
    find_dual_peaks, round_to_nearest_k, DualPeaks, Spectrum, WindowKind,
};
use fpga::Capture;

use crate::da_output::{ChannelConfig, DaOutput, Waveform};
use crate::settings;

pub struct Analyzer {
    spectrum: Spectrum,
}

impl Analyzer {
    pub fn new(window: WindowKind) -> Self {
        Self {
            spectrum: Spectrum::new(window),
        }
    }

    /// Spectrum of the last analyzed capture.
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Find the two dominant tones of a capture.
    ///
    /// # Args
    /// * `capture` - FIFO samples.
    /// * `sampling_frequency` - Sample rate of the capture in Hz.
    /// * `threshold` - Peak threshold relative to the strongest bin.
    pub fn analyze(
        &mut self,
        capture: &Capture,
        sampling_frequency: f32,
        threshold: f32,
    ) -> DualPeaks {
        self.spectrum.compute(capture.volts());
        find_dual_peaks(
            self.spectrum.magnitude(),
            sampling_frequency,
            threshold,
        )
    }
}

/// Stage DA outputs reproducing the detected tones.
///
/// Peak A drives DA channel 1 and peak B channel 2, each at the peak
/// frequency rounded to the nearest kHz. Strong peaks are reproduced as
/// sine, weak ones as triangle. Peaks rounding to zero are ignored.
///
/// # Returns
/// The staged configuration per channel. Nothing needs to be applied if both
/// are `None`.
pub fn configure_from_peaks(
    peaks: &DualPeaks,
    da: &mut DaOutput,
    settings: &settings::Analysis,
) -> [Option<ChannelConfig>; 2] {
    let mut staged = [None; 2];
    for ((peak, channel), slot) in [peaks.a, peaks.b]
        .iter()
        .zip(da.channels_mut().iter_mut())
        .zip(staged.iter_mut())
    {
        let Some(peak) = peak else {
            continue;
        };
        let frequency = round_to_nearest_k(peak.refined_frequency);
        if frequency <= 0.0 {
            continue;
        }
        let waveform = if peak.magnitude > settings.sine_threshold {
            Waveform::Sine
        } else {
            Waveform::Triangle
        };
        *channel =
            ChannelConfig::new(frequency, settings.amplitude, 0, waveform);
        *slot = Some(*channel);
    }
    staged
}

#[cfg(test)]
mod test {
    use super::*;
    use fpga::FIFO_DEPTH;

    /// Capture of a sum of tones at integer bins with amplitudes in codes.
    fn capture(tones: &[(usize, f32)]) -> Capture {
        let mut raw = [0u16; FIFO_DEPTH];
        for (i, r) in raw.iter_mut().enumerate() {
            let v: f32 = tones
                .iter()
                .map(|&(bin, amplitude)| {
                    let x = core::f32::consts::TAU * (bin * i) as f32
                        / FIFO_DEPTH as f32;
                    amplitude * libm::sinf(x)
                })
                .sum();
            *r = (2048.0 + v) as u16;
        }
        Capture::from_raw(raw)
    }

    fn settings() -> settings::Analysis {
        settings::Analysis {
            sampling_frequency: 1.024e6,
            threshold: 0.02,
            ..Default::default()
        }
    }

    #[test]
    fn two_tones() {
        let s = settings();
        let mut analyzer = Analyzer::new(WindowKind::Hamming);
        // 2 V at 50 kHz and 0.1 V at 120 kHz.
        let c = capture(&[(50, 409.6), (120, 20.48)]);
        let peaks = analyzer.analyze(&c, s.sampling_frequency, s.threshold);
        assert_eq!(peaks.found(), 2);
        assert!(analyzer.spectrum().is_ready());

        let mut da = DaOutput::default();
        let staged = configure_from_peaks(&peaks, &mut da, &s);
        assert_eq!(
            staged[0],
            Some(ChannelConfig::new(50_000.0, 1000, 0, Waveform::Sine))
        );
        assert_eq!(
            staged[1],
            Some(ChannelConfig::new(120_000.0, 1000, 0, Waveform::Triangle))
        );
        assert_eq!(da.channels()[1], staged[1].unwrap());
    }

    #[test]
    fn silence_leaves_da_unchanged() {
        let s = settings();
        let mut analyzer = Analyzer::new(WindowKind::Hamming);
        let peaks =
            analyzer.analyze(&capture(&[]), s.sampling_frequency, s.threshold);
        assert_eq!(peaks.found(), 0);
        let mut da = DaOutput::default();
        assert_eq!(configure_from_peaks(&peaks, &mut da, &s), [None, None]);
        assert_eq!(da, DaOutput::default());
    }

    #[test]
    fn single_peak_only_touches_channel_one() {
        let s = settings();
        let mut analyzer = Analyzer::new(WindowKind::Hamming);
        let c = capture(&[(30, 409.6)]);
        let peaks = analyzer.analyze(&c, s.sampling_frequency, 0.15);
        assert_eq!(peaks.found(), 1);
        let mut da = DaOutput::default();
        let staged = configure_from_peaks(&peaks, &mut da, &s);
        assert_eq!(staged[0].map(|c| c.frequency), Some(30_000.0));
        assert_eq!(staged[1], None);
        assert_eq!(da.channels()[1], DaOutput::default().channels()[1]);
    }
}
