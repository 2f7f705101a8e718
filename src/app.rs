//! Application context and task table.
//!
//! All runtime state is owned by [`App`]. The tasks of the cooperative
//! scheduler receive it by mutable reference.
use core::fmt::Write;

use ad9959::Ad9959;
use dsp::{zero_crossing_phase, KalmanBank};
use embedded_hal::delay::DelayNs;
use fpga::{Capture, Channel, Fpga, RegisterBus};

use crate::amplitude::AmplitudeLoop;
use crate::analysis::{configure_from_peaks, Analyzer};
use crate::da_output::DaOutput;
use crate::keys::{Action, KeyInput, Keys};
use crate::scheduler::{Scheduler, Task};
use crate::settings::{Periods, Settings};
use crate::telemetry::{self, SpectrumReport};
use crate::tracking::{Acquisition, Tracker};
use crate::Error;

/// Hardware bindings of a target.
pub trait Board {
    type Bus: RegisterBus;
    type Delay: DelayNs;
    type Dds: ad9959::Interface;
    type Adc: Acquisition;
    type Keys: KeyInput;
    type Serial: Write;
}

pub struct Peripherals<H: Board> {
    pub fpga: Fpga<H::Bus, H::Delay>,
    pub dds: Ad9959<H::Dds>,
    pub adc: H::Adc,
    pub keys: H::Keys,
    pub serial: H::Serial,
}

pub struct App<H: Board> {
    settings: Settings,
    hw: Peripherals<H>,
    da: DaOutput,
    tracker: Tracker,
    amplitude: AmplitudeLoop,
    analyzer: Analyzer,
    keys: Keys,
    captures: [Capture; 2],
    vpp: [f32; 2],
    vpp_filter: KalmanBank<2>,
    thd_filter: KalmanBank<1>,
    // Bumped whenever a key changes the DA outputs.
    selector: u8,
}

/// Number of scheduled tasks.
pub const TASKS: usize = 6;

/// Build the task table.
pub fn tasks<H: Board>(periods: &Periods) -> Scheduler<App<H>, TASKS> {
    Scheduler::new([
        Task::new("acquire", periods.acquisition(), |app: &mut App<H>| {
            log_error(app.acquire())
        }),
        Task::new("keys", periods.keys(), |app: &mut App<H>| {
            log_error(app.scan_keys())
        }),
        Task::new("track", periods.tracking(), |app: &mut App<H>| {
            app.track();
        }),
        Task::new("amplitude", periods.amplitude(), |app: &mut App<H>| {
            log_error(app.regulate())
        }),
        Task::new("report", periods.report(), |app: &mut App<H>| {
            log_error(app.report_spectrum().map(drop))
        }),
        Task::new("frequency", periods.frequency(), |app: &mut App<H>| {
            app.measure_frequencies();
        }),
    ])
}

fn log_error(result: Result<(), Error>) {
    if let Err(e) = result {
        log::warn!("{e}");
    }
}

impl<H: Board> App<H> {
    /// Apply the initial DA configuration and start the ADC pair.
    pub fn new(settings: Settings, mut hw: Peripherals<H>) -> Self {
        hw.fpga
            .set_fifo_poll_limit(settings.acquisition.fifo_poll_limit);
        let da = DaOutput::new(settings.da);
        da.apply(&mut hw.fpga);
        hw.adc.start();
        log::info!("Started: {:?}", settings.amplitude.form);

        Self {
            tracker: Tracker::new(&settings.tracking, settings.window),
            amplitude: AmplitudeLoop::new(&settings.amplitude),
            analyzer: Analyzer::new(settings.window),
            vpp_filter: KalmanBank::new(settings.kalman),
            thd_filter: KalmanBank::new(settings.thd_kalman),
            keys: Keys::default(),
            captures: Default::default(),
            vpp: [0.0; 2],
            selector: 0,
            settings,
            hw,
            da,
        }
    }

    /// Task table for the current periods.
    pub fn scheduler(&self) -> Scheduler<Self, TASKS> {
        tasks(&self.settings.periods)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn peripherals(&self) -> &Peripherals<H> {
        &self.hw
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals<H> {
        &mut self.hw
    }

    pub fn da(&self) -> &DaOutput {
        &self.da
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn amplitude(&self) -> &AmplitudeLoop {
        &self.amplitude
    }

    pub fn captures(&self) -> &[Capture; 2] {
        &self.captures
    }

    /// Smoothed peak to peak voltages of both FIFO channels.
    pub fn vpp(&self) -> [f32; 2] {
        self.vpp
    }

    /// Sample both FIFO channels and update the smoothed voltages.
    pub fn acquire(&mut self) -> Result<(), Error> {
        self.hw
            .fpga
            .acquire(self.settings.acquisition.frequency, &mut self.captures)?;
        for (i, (vpp, capture)) in
            self.vpp.iter_mut().zip(self.captures.iter()).enumerate()
        {
            let raw = capture.vpp();
            *vpp = self
                .vpp_filter
                .update(self.selector, i, raw)
                .unwrap_or(raw);
        }
        Ok(())
    }

    /// Poll the keys and run the action of a new press.
    pub fn scan_keys(&mut self) -> Result<(), Error> {
        let value = self.hw.keys.read();
        match self.keys.scan(value) {
            Some(action) => self.handle(action),
            None => Ok(()),
        }
    }

    /// Run a key action.
    pub fn handle(&mut self, action: Action) -> Result<(), Error> {
        let serial = &mut self.hw.serial;
        match action {
            Action::CycleWaveform => {
                let waveform = self.keys.next_waveform();
                self.da.set_waveform(waveform);
                self.da.apply(&mut self.hw.fpga);
                self.selector = self.selector.wrapping_add(1);
                writeln!(serial, "DA waveform: {waveform:?}")?;
            }
            Action::DumpCapture => {
                let [a, b] = &self.captures;
                telemetry::write_capture(serial, a)?;
                let phase = zero_crossing_phase(a.volts(), b.volts());
                writeln!(serial, "Phase: {phase:.1} deg")?;
            }
            Action::StepPhase => {
                let phase = self.keys.next_phase();
                self.da.channel_mut(0)?.phase = phase;
                self.da.apply(&mut self.hw.fpga);
                writeln!(serial, "DA1 phase: {phase}")?;
            }
            Action::AnalyzeCapture => {
                let analysis = &self.settings.analysis;
                let peaks = self.analyzer.analyze(
                    &self.captures[0],
                    analysis.sampling_frequency,
                    analysis.threshold,
                );
                telemetry::write_peaks(serial, &peaks)?;
                let staged =
                    configure_from_peaks(&peaks, &mut self.da, analysis);
                telemetry::write_staged(serial, &staged)?;
                if staged.iter().any(Option::is_some) {
                    self.da.apply(&mut self.hw.fpga);
                    self.selector = self.selector.wrapping_add(1);
                }
            }
        }
        Ok(())
    }

    /// Advance the frequency tracking loop by one step.
    ///
    /// # Returns
    /// The adjusted DA channel 1 frequency on the adjusting step.
    pub fn track(&mut self) -> Option<f32> {
        self.tracker
            .process(&mut self.hw.adc, &mut self.da, &mut self.hw.fpga)
    }

    /// Run one amplitude regulation step on the AD2 voltage.
    pub fn regulate(&mut self) -> Result<(), Error> {
        if !self.settings.amplitude.enabled {
            return Ok(());
        }
        let code = self.amplitude.update(self.captures[1].vpp());
        log::trace!("amplitude code {code}");
        self.amplitude
            .drive(&mut self.hw.dds)
            .map_err(|_| Error::Dds)
    }

    /// Analyze the AD1 capture and print the spectrum report.
    ///
    /// The THD is smoothed across reports.
    pub fn report_spectrum(&mut self) -> Result<SpectrumReport, Error> {
        let analysis = &self.settings.analysis;
        self.analyzer.analyze(
            &self.captures[0],
            analysis.sampling_frequency,
            analysis.report_threshold,
        );
        let magnitude = self.analyzer.spectrum().magnitude();
        let mut report = SpectrumReport::new(
            magnitude,
            analysis.sampling_frequency,
            analysis.report_threshold,
        );
        report.thd = self
            .thd_filter
            .update(self.selector, 0, report.thd)
            .unwrap_or(report.thd);
        report.write(&mut self.hw.serial, magnitude)?;
        Ok(report)
    }

    /// Measure the signal frequency of both FIFO channels with the gated
    /// counters.
    pub fn measure_frequencies(&mut self) -> [Option<f32>; 2] {
        Channel::ALL.map(|ch| {
            let f = self.hw.fpga.measure_frequency(ch);
            log::info!("{ch:?}: {f:?} Hz");
            f
        })
    }
}
