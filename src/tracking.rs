//! Phase locked frequency tracking of DA channel 1.
//!
//! The internal ADC pair samples both signals into one frame. Once a frame is
//! complete the phase difference of the two fundamentals is measured and the
//! DA channel 1 frequency is nudged to drive the difference to the
//! reference. The acquisition is then re-armed for the next frame.
//!
//! Each step of the cycle takes one call of [`Tracker::process`].
use dsp::{phase_difference, pid, Spectrum, WindowKind, FFT_LEN};
use embedded_hal::delay::DelayNs;
use fpga::{Fpga, RegisterBus};

use crate::da_output::DaOutput;
use crate::settings;

/// Volts per ADC code.
pub const SAMPLE_SCALE: f32 = 3.3 / 65536.0;

/// Interrupt driven ADC pair acquisition.
///
/// Both channels are packed into one word per sample, channel 1 in the low
/// half word.
pub trait Acquisition {
    /// A full frame has been transferred.
    fn is_complete(&self) -> bool;

    fn clear_complete(&mut self);

    /// The last frame.
    fn frame(&self) -> &[u32];

    /// Stop DMA transfer and the trigger timer.
    fn stop(&mut self);

    /// Clear all status flags of both converters.
    fn clear_flags(&mut self);

    /// Return both converter state machines to idle.
    fn reset_converters(&mut self);

    /// Start converters, DMA and trigger timer.
    fn start(&mut self);

    /// Restart a clean acquisition.
    fn rearm(&mut self) {
        self.stop();
        self.clear_flags();
        self.reset_converters();
        self.start();
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// Waiting for a frame.
    #[default]
    Armed,
    /// Spectra computed and phase difference extracted.
    Computing,
    /// Frequency correction applied, waiting for the re-arm.
    Adjusting,
}

/// Split a packed frame word into volts of both channels.
pub fn unpack(word: u32) -> [f32; 2] {
    [word & 0xffff, word >> 16].map(|code| code as f32 * SAMPLE_SCALE)
}

pub struct Tracker {
    spectra: [Spectrum; 2],
    pid: pid::Tracking,
    reference: f32,
    max_step: f32,
    state: State,
    calculated: bool,
    difference: Option<f32>,
}

impl Tracker {
    pub fn new(settings: &settings::Tracking, window: WindowKind) -> Self {
        Self {
            spectra: [Spectrum::new(window), Spectrum::new(window)],
            pid: pid::Tracking::new(settings.gains, settings.max_integral),
            reference: settings.reference,
            max_step: settings.max_step,
            state: State::Armed,
            calculated: false,
            difference: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Last measured phase difference in radians.
    pub fn difference(&self) -> Option<f32> {
        self.difference
    }

    pub fn spectra(&self) -> &[Spectrum; 2] {
        &self.spectra
    }

    pub fn pid(&self) -> &pid::Tracking {
        &self.pid
    }

    /// Advance the tracking cycle by one step.
    ///
    /// * `Armed`: on a complete frame, compute both spectra and the phase
    ///   difference. The calculation is only flagged done if both spectra
    ///   are ready. Frames shorter than [`FFT_LEN`] are dropped.
    /// * `Computing`: adjust and apply the DA channel 1 frequency. Without a
    ///   phase difference nothing is adjusted.
    /// * `Adjusting`: re-arm the acquisition if the calculation is flagged
    ///   done and consume the flag.
    ///
    /// # Args
    /// * `acquisition` - ADC pair.
    /// * `da` - DA configuration, channel 1 frequency is adjusted.
    /// * `fpga` - Register access for applying the DA configuration.
    ///
    /// # Returns
    /// The new DA channel 1 frequency if an adjustment was made.
    pub fn process<A, B, D>(
        &mut self,
        acquisition: &mut A,
        da: &mut DaOutput,
        fpga: &mut Fpga<B, D>,
    ) -> Option<f32>
    where
        A: Acquisition,
        B: RegisterBus,
        D: DelayNs,
    {
        match self.state {
            State::Armed => {
                if acquisition.is_complete() {
                    self.compute(acquisition.frame());
                    acquisition.clear_complete();
                    self.state = State::Computing;
                }
                None
            }
            State::Computing => {
                self.state = State::Adjusting;
                let difference = self.difference?;
                let frequency = self.adjust(difference, da);
                da.apply(fpga);
                Some(frequency)
            }
            State::Adjusting => {
                if core::mem::take(&mut self.calculated) {
                    acquisition.rearm();
                    for spectrum in self.spectra.iter_mut() {
                        spectrum.invalidate();
                    }
                }
                self.state = State::Armed;
                None
            }
        }
    }

    fn compute(&mut self, frame: &[u32]) {
        if frame.len() < FFT_LEN {
            log::warn!("Short ADC frame: {}", frame.len());
        } else {
            for (i, spectrum) in self.spectra.iter_mut().enumerate() {
                spectrum.compute(frame.iter().map(|&w| unpack(w)[i]));
            }
        }
        let [a, b] = &self.spectra;
        self.difference = phase_difference(a, b);
        self.calculated = self.difference.is_some();
    }

    /// Stage a corrected DA channel 1 frequency.
    fn adjust(&mut self, difference: f32, da: &mut DaOutput) -> f32 {
        let error = -(difference - self.reference);
        let correction = self.pid.update(error);
        let channel = &mut da.channels_mut()[0];
        let current = channel.frequency;
        channel.frequency = (current + correction)
            .clamp(current - self.max_step, current + self.max_step);
        log::trace!(
            "phase {difference:.4} rad, DA1 {current} -> {} Hz",
            channel.frequency
        );
        channel.frequency
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fpga::mock::{MockBus, MockDelay};
    use fpga::Write;

    #[derive(Default)]
    struct MockAcquisition {
        complete: bool,
        frame: Vec<u32>,
        calls: Vec<&'static str>,
    }

    impl MockAcquisition {
        /// Two tones at bin 50 with the given phases.
        fn with_phases(a: f32, b: f32) -> Self {
            let code = |i: usize, phase: f32| {
                let x = core::f32::consts::TAU * 50.0 * i as f32 / 1024.0;
                (32768.0 + 20000.0 * libm::cosf(x + phase)) as u32
            };
            Self {
                complete: true,
                frame: (0..1024)
                    .map(|i| code(i, a) | code(i, b) << 16)
                    .collect(),
                calls: vec![],
            }
        }
    }

    impl Acquisition for MockAcquisition {
        fn is_complete(&self) -> bool {
            self.complete
        }
        fn clear_complete(&mut self) {
            self.complete = false;
        }
        fn frame(&self) -> &[u32] {
            &self.frame
        }
        fn stop(&mut self) {
            self.calls.push("stop");
        }
        fn clear_flags(&mut self) {
            self.calls.push("clear_flags");
        }
        fn reset_converters(&mut self) {
            self.calls.push("reset_converters");
        }
        fn start(&mut self) {
            self.calls.push("start");
        }
    }

    fn setup() -> (Tracker, DaOutput, Fpga<MockBus, MockDelay>) {
        let mut fpga = Fpga::new(MockBus::default(), MockDelay::default());
        fpga.bus_mut().clear();
        (
            Tracker::new(&settings::Tracking::default(), WindowKind::Hamming),
            DaOutput::default(),
            fpga,
        )
    }

    #[test]
    fn unpack_halves() {
        assert_eq!(unpack(0x8000_0000), [0.0, 1.65]);
        assert_eq!(unpack(0x0000_ffff)[0], 65535.0 * SAMPLE_SCALE);
    }

    /// Run a full cycle.
    fn cycle(
        t: &mut Tracker,
        acq: &mut MockAcquisition,
        da: &mut DaOutput,
        fpga: &mut Fpga<MockBus, MockDelay>,
    ) -> Option<f32> {
        assert_eq!(t.process(acq, da, fpga), None);
        let f = t.process(acq, da, fpga);
        assert_eq!(t.process(acq, da, fpga), None);
        f
    }

    #[test]
    fn idle_without_frame() {
        let (mut t, mut da, mut fpga) = setup();
        let mut acq = MockAcquisition::default();
        assert_eq!(t.process(&mut acq, &mut da, &mut fpga), None);
        assert!(acq.calls.is_empty());
        assert!(fpga.bus().writes().is_empty());
        assert_eq!(t.state(), State::Armed);
    }

    #[test]
    fn one_step_per_pass() {
        let (mut t, mut da, mut fpga) = setup();
        let mut acq = MockAcquisition::with_phases(0.4, 0.1);

        assert_eq!(t.process(&mut acq, &mut da, &mut fpga), None);
        assert_eq!(t.state(), State::Computing);
        assert!(t.spectra()[0].is_ready());
        assert!(!acq.complete);
        assert!(fpga.bus().writes().is_empty());

        let f = t.process(&mut acq, &mut da, &mut fpga).unwrap();
        assert_eq!(t.state(), State::Adjusting);
        assert_eq!(fpga.bus().writes_to(Write::Da1FrequencyHigh).len(), 1);
        assert_eq!(da.channels()[0].frequency, f);
        assert!(acq.calls.is_empty());

        assert_eq!(t.process(&mut acq, &mut da, &mut fpga), None);
        assert_eq!(t.state(), State::Armed);
        assert_eq!(
            acq.calls,
            ["stop", "clear_flags", "reset_converters", "start"]
        );
        assert!(!t.spectra()[0].is_ready());
    }

    #[test]
    fn corrects_towards_reference() {
        let (mut t, mut da, mut fpga) = setup();
        let mut acq = MockAcquisition::with_phases(0.4, 0.1);
        let f = cycle(&mut t, &mut acq, &mut da, &mut fpga).unwrap();
        let d = t.difference().unwrap();
        assert!((d - 0.3).abs() < 1e-2, "{d}");
        // e = -d: Kp e + Kd e = -0.65 d
        let expect = 20_000.0 - 0.65 * d;
        assert!((f - expect).abs() < 1e-2, "{f}");
        assert_eq!(da.channels()[1].frequency, 20_000.0);
    }

    #[test]
    fn short_frame_is_not_rearmed() {
        let (mut t, mut da, mut fpga) = setup();
        let mut acq = MockAcquisition::with_phases(0.4, 0.1);
        acq.frame.truncate(FFT_LEN / 2);
        assert_eq!(cycle(&mut t, &mut acq, &mut da, &mut fpga), None);
        assert_eq!(t.difference(), None);
        assert!(acq.calls.is_empty());
        assert!(fpga.bus().writes().is_empty());
        assert_eq!(t.state(), State::Armed);
        assert_eq!(da.channels()[0].frequency, 20_000.0);
    }

    #[test]
    fn step_limited() {
        let (mut t, mut da, mut fpga) = setup();
        let mut acq = MockAcquisition::with_phases(2.0, 0.0);
        let f = cycle(&mut t, &mut acq, &mut da, &mut fpga);
        assert_eq!(f, Some(19_999.5));
        let mut acq = MockAcquisition::with_phases(-2.0, 0.0);
        let f = cycle(&mut t, &mut acq, &mut da, &mut fpga);
        assert_eq!(f, Some(20_000.0));
    }
}
