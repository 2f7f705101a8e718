//! Diagnostic reports on the serial console.
use core::fmt::{self, Write};

use dsp::{precise_peak_frequency, round_to_nearest_k, thd, DualPeaks};
use fpga::Capture;
use heapless::String;
use serde::Serialize;

use crate::da_output::ChannelConfig;

/// First bin listed in the spectrum dump.
const DUMP_START: usize = 10;

/// Summary of a magnitude spectrum.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpectrumReport {
    /// Sample rate in Hz.
    pub sampling_frequency: f32,
    /// Bin width in Hz.
    pub resolution: f32,
    /// Interpolated frequency of the strongest bin in Hz.
    pub raw_peak_frequency: f32,
    /// `raw_peak_frequency` rounded to the nearest kHz.
    pub peak_frequency: f32,
    pub peak_magnitude: f32,
    /// Total harmonic distortion in percent.
    pub thd: f32,
    pub dc: f32,
    pub peaks: DualPeaks,
}

impl SpectrumReport {
    /// Analyze a magnitude spectrum.
    ///
    /// # Args
    /// * `magnitude` - Magnitude spectrum.
    /// * `sampling_frequency` - Sample rate in Hz.
    /// * `threshold` - Relative threshold of the dual peak search.
    pub fn new(
        magnitude: &[f32],
        sampling_frequency: f32,
        threshold: f32,
    ) -> Self {
        let raw = precise_peak_frequency(magnitude, sampling_frequency);
        let peak_frequency = round_to_nearest_k(raw);
        let peak_magnitude = magnitude
            .iter()
            .take(magnitude.len() / 2)
            .skip(1)
            .fold(0.0f32, |a, &m| a.max(m));
        Self {
            sampling_frequency,
            resolution: sampling_frequency / magnitude.len() as f32,
            raw_peak_frequency: raw,
            peak_frequency,
            peak_magnitude,
            thd: thd(magnitude, peak_frequency, sampling_frequency),
            dc: magnitude.first().copied().unwrap_or_default(),
            peaks: dsp::find_dual_peaks(
                magnitude,
                sampling_frequency,
                threshold,
            ),
        }
    }

    /// Print the report including the bins of the spectrum it was computed
    /// from.
    pub fn write<W: Write>(&self, w: &mut W, magnitude: &[f32]) -> fmt::Result {
        writeln!(w, "=== FFT Spectrum Analysis ===")?;
        writeln!(w, "Sampling Freq: {:.0} Hz", self.sampling_frequency)?;
        writeln!(w, "Freq Resolution: {:.2} Hz", self.resolution)?;
        writeln!(w, "--- Spectrum Data ---")?;
        for (bin, m) in magnitude
            .iter()
            .enumerate()
            .take(magnitude.len() / 2)
            .skip(DUMP_START)
        {
            writeln!(w, "{:.1} Hz: {m:.6}", bin as f32 * self.resolution)?;
        }
        writeln!(w, "--- Peak Analysis ---")?;
        writeln!(
            w,
            "Peak Freq: {:.0} Hz (Raw: {:.2} Hz), Magnitude: {:.6} V",
            self.peak_frequency, self.raw_peak_frequency, self.peak_magnitude
        )?;
        writeln!(w, "THD: {:.2}%", self.thd)?;
        writeln!(w, "DC Component: {:.6} V", self.dc)?;
        writeln!(w)?;
        write_peaks(w, &self.peaks)?;
        writeln!(w, "=== End of Spectrum ===")
    }

    pub fn to_json<const N: usize>(
        &self,
    ) -> Result<String<N>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}

/// Print detected peaks with their frequencies rounded to the nearest kHz.
pub fn write_peaks<W: Write>(w: &mut W, peaks: &DualPeaks) -> fmt::Result {
    if peaks.found() == 0 {
        return writeln!(w, "No significant peaks found!");
    }
    for (i, peak) in [peaks.a, peaks.b].iter().enumerate() {
        if let Some(peak) = peak {
            writeln!(
                w,
                "Peak {}: {:.0} Hz (Bin: {}), Magnitude: {:.6} V",
                i + 1,
                round_to_nearest_k(peak.refined_frequency),
                peak.bin,
                peak.magnitude
            )?;
        }
    }
    Ok(())
}

/// Print the DA configuration staged from detected peaks.
pub fn write_staged<W: Write>(
    w: &mut W,
    staged: &[Option<ChannelConfig>; 2],
) -> fmt::Result {
    if staged.iter().all(Option::is_none) {
        return writeln!(w, "No valid peaks found, DA unchanged");
    }
    for (i, config) in staged.iter().enumerate() {
        if let Some(config) = config {
            writeln!(
                w,
                "{}: {:?}, DA{}: {:.0} Hz",
                ['A', 'B'][i],
                config.waveform,
                i + 1,
                config.frequency
            )?;
        }
    }
    Ok(())
}

/// Print a capture in volts, one sample per line.
pub fn write_capture<W: Write>(w: &mut W, capture: &Capture) -> fmt::Result {
    for v in capture.volts() {
        writeln!(w, "{v:.4}")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::da_output::Waveform;
    use dsp::Peak;
    use fpga::FIFO_DEPTH;

    fn spectrum() -> [f32; 1024] {
        let mut m = [0.0; 1024];
        m[0] = 0.25;
        m[99] = 0.5;
        m[100] = 1.0;
        m[101] = 0.5;
        m[300] = 0.1;
        m[600] = 5.0;
        m
    }

    #[test]
    fn report_fields() {
        let m = spectrum();
        let r = SpectrumReport::new(&m, 10_240.0, 0.2);
        assert_eq!(r.resolution, 10.0);
        assert_eq!(r.raw_peak_frequency, 1000.0);
        assert_eq!(r.peak_frequency, 1000.0);
        assert_eq!(r.peak_magnitude, 1.0);
        assert_eq!(r.dc, 0.25);
        // Third harmonic only: 0.1 / sqrt(1 + 0.5 * 0.5)
        assert!((r.thd - 8.944).abs() < 1e-2, "{}", r.thd);
        assert_eq!(r.peaks.found(), 1);
    }

    #[test]
    fn report_text() {
        let m = spectrum();
        let r = SpectrumReport::new(&m, 10_240.0, 0.2);
        let mut s = std::string::String::new();
        r.write(&mut s, &m).unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines[1], "Sampling Freq: 10240 Hz");
        assert_eq!(lines[2], "Freq Resolution: 10.00 Hz");
        assert_eq!(lines[4], "100.0 Hz: 0.000000");
        assert!(lines.contains(&"1000.0 Hz: 1.000000"));
        assert!(lines.contains(&"THD: 8.94%"));
        assert!(lines.contains(&"DC Component: 0.250000 V"));
        assert!(lines
            .contains(&"Peak 1: 1000 Hz (Bin: 100), Magnitude: 1.000000 V"));
        assert_eq!(lines.last(), Some(&"=== End of Spectrum ==="));
        // Header, 502 bins, peak section, blank line, one peak, footer.
        assert_eq!(lines.len(), 4 + 502 + 4 + 1 + 1 + 1);
    }

    #[test]
    fn report_json() {
        let r = SpectrumReport::new(&spectrum(), 10_240.0, 0.2);
        let json = r.to_json::<512>().unwrap();
        assert!(json.starts_with("{\"sampling_frequency\":10240.0,"));
        assert!(json.contains("\"b\":null"));
    }

    #[test]
    fn peaks_and_staged() {
        let mut s = std::string::String::new();
        write_peaks(&mut s, &DualPeaks::default()).unwrap();
        assert_eq!(s, "No significant peaks found!\n");

        let peak = |bin, f: f32, magnitude| Peak {
            bin,
            frequency: f,
            magnitude,
            refined_frequency: f + 120.0,
        };
        let peaks = DualPeaks {
            a: Some(peak(5, 1000.0, 0.5)),
            b: Some(peak(15, 3000.0, 0.25)),
            separation: 2000.0,
        };
        s.clear();
        write_peaks(&mut s, &peaks).unwrap();
        assert_eq!(
            s,
            "Peak 1: 1000 Hz (Bin: 5), Magnitude: 0.500000 V\n\
             Peak 2: 3000 Hz (Bin: 15), Magnitude: 0.250000 V\n"
        );

        s.clear();
        write_staged(&mut s, &[None, None]).unwrap();
        assert_eq!(s, "No valid peaks found, DA unchanged\n");
        s.clear();
        let c = ChannelConfig::new(3000.0, 1000, 0, Waveform::Triangle);
        write_staged(&mut s, &[None, Some(c)]).unwrap();
        assert_eq!(s, "B: Triangle, DA2: 3000 Hz\n");
    }

    #[test]
    fn capture_dump() {
        let mut raw = [2048; FIFO_DEPTH];
        raw[1] = 2048 + 1024;
        let mut s = std::string::String::new();
        write_capture(&mut s, &Capture::from_raw(raw)).unwrap();
        let mut lines = s.lines();
        assert_eq!(lines.next(), Some("0.0000"));
        assert_eq!(lines.next(), Some("5.0000"));
        assert_eq!(s.lines().count(), FIFO_DEPTH);
    }
}
