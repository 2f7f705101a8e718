#![no_std]

use embedded_hal::delay::DelayNs;

pub mod bus;
pub mod register;
pub use bus::{Fmc, RegisterBus};
pub use register::{Channel, Control, Dac, Flag, Read, Write};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// FPGA system clock in Hz.
pub const CLOCK: f64 = 150e6;

/// Depth of the per-channel sample FIFO.
pub const FIFO_DEPTH: usize = 1024;

/// Sample rates above this (in units of the signal frequency) switch to
/// undersampling.
pub const UNDERSAMPLING_THRESHOLD: f32 = 60_000.0;

/// Gate time of the frequency counter.
pub const COUNTER_GATE_MS: u32 = 100;

/// Reference counts at or below this indicate an invalid gate.
pub const MIN_BASE_COUNT: u32 = 14_000_000;

/// Default number of full flag polls before giving up on a FIFO.
pub const FIFO_POLL_LIMIT: u32 = 1_000_000;

const PHASE_ACCUMULATOR: f64 = (1u64 << 32) as f64;
const VOLTS_PER_CODE: f32 = 10.0 / 2048.0;
const VOLTS_OFFSET: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("FIFO of {0:?} did not fill")]
    FifoTimeout(Channel),
}

/// Convert a raw ADC code to volts.
pub fn code_to_volts(code: u16) -> f32 {
    code as f32 * VOLTS_PER_CODE - VOLTS_OFFSET
}

/// Sample rate tuning word for a signal frequency.
///
/// The FIFO is filled with `FIFO_DEPTH` samples per signal period, or per
/// `(FIFO_DEPTH + 1) / FIFO_DEPTH` periods above
/// [`UNDERSAMPLING_THRESHOLD`].
///
/// # Args
/// * `frequency` - Signal frequency in Hz.
///
/// # Returns
/// Phase accumulator increment at [`CLOCK`].
pub fn sample_rate_word(frequency: f32) -> u32 {
    let n = FIFO_DEPTH as f32;
    let fs = if frequency <= UNDERSAMPLING_THRESHOLD {
        frequency * n
    } else {
        frequency * n / (n + 1.0)
    };
    (PHASE_ACCUMULATOR * (fs as u32) as f64 / CLOCK) as u32
}

/// One FIFO worth of raw samples of a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    raw: [u16; FIFO_DEPTH],
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            raw: [0; FIFO_DEPTH],
        }
    }
}

impl Capture {
    pub fn from_raw(raw: [u16; FIFO_DEPTH]) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &[u16; FIFO_DEPTH] {
        &self.raw
    }

    /// Samples in volts.
    pub fn volts(&self) -> impl Iterator<Item = f32> + '_ {
        self.raw.iter().map(|&c| code_to_volts(c))
    }

    /// Smallest and largest raw code.
    pub fn extrema(&self) -> (u16, u16) {
        self.raw
            .iter()
            .fold((u16::MAX, u16::MIN), |(lo, hi), &c| (lo.min(c), hi.max(c)))
    }

    /// Peak to peak amplitude in volts.
    pub fn vpp(&self) -> f32 {
        let (lo, hi) = self.extrema();
        (hi - lo) as f32 * VOLTS_PER_CODE
    }
}

/// FPGA register driver.
///
/// The control register is write-only. A shadow copy is kept and every
/// control change rewrites the full word.
pub struct Fpga<B, D> {
    bus: B,
    delay: D,
    control: Control,
    fifo_poll_limit: u32,
}

impl<B: RegisterBus, D: DelayNs> Fpga<B, D> {
    /// Create the driver and clear the control register.
    pub fn new(bus: B, delay: D) -> Self {
        let mut fpga = Self {
            bus,
            delay,
            control: Control::default(),
            fifo_poll_limit: FIFO_POLL_LIMIT,
        };
        fpga.init();
        fpga
    }

    /// Reset the control register: DA output, sample clocks, FIFOs and
    /// counters off.
    pub fn init(&mut self) {
        self.set_control(Control::default());
        log::info!("FPGA control cleared");
    }

    pub fn set_fifo_poll_limit(&mut self, limit: u32) {
        self.fifo_poll_limit = limit;
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    pub fn write(&mut self, reg: Write, value: u16) {
        self.bus.write(reg.into(), value);
    }

    pub fn read(&mut self, reg: Read) -> u16 {
        self.bus.read(reg.into())
    }

    fn read_u32(&mut self, [high, low]: [Read; 2]) -> u32 {
        let high = self.read(high) as u32;
        self.delay.delay_ms(1);
        let low = self.read(low) as u32;
        self.delay.delay_ms(1);
        (high << 16) | low
    }

    fn set_control(&mut self, control: Control) {
        self.control = control;
        self.write(Write::Control, control.raw_value());
    }

    fn set_flag(&mut self, channel: Channel, flag: Flag, value: bool) {
        self.set_control(self.control.with_flag(channel, flag, value));
    }

    pub fn da_start(&mut self) {
        self.set_control(self.control.with_da_enable(true));
    }

    pub fn da_stop(&mut self) {
        self.set_control(self.control.with_da_enable(false));
    }

    /// Write a 32 bit word as two halves, high first.
    pub fn write_u32(&mut self, [high, low]: [Write; 2], value: u32) {
        self.write(high, (value >> 16) as u16);
        self.write(low, value as u16);
    }

    /// Configure the sample clock of a channel.
    ///
    /// # Args
    /// * `channel` - ADC channel.
    /// * `frequency` - Signal frequency in Hz. Zero leaves the channel
    ///   untouched.
    ///
    /// # Returns
    /// The tuning word written, if any.
    pub fn set_sampling_frequency(
        &mut self,
        channel: Channel,
        frequency: f32,
    ) -> Option<u32> {
        if frequency == 0.0 {
            return None;
        }
        let word = sample_rate_word(frequency);
        let [high, low] = channel.sample_rate();
        self.set_flag(channel, Flag::Clock, true);
        self.delay.delay_ms(1);
        self.write(high, (word >> 16) as u16);
        self.delay.delay_ms(1);
        self.write(low, word as u16);
        Some(word)
    }

    fn wait_full(&mut self, channel: Channel) -> Result<(), Error> {
        for _ in 0..self.fifo_poll_limit {
            if self.read(channel.full()) == 1 {
                return Ok(());
            }
        }
        Err(Error::FifoTimeout(channel))
    }

    /// Read one FIFO worth of samples.
    pub fn read_fifo(&mut self, channel: Channel, capture: &mut Capture) {
        self.set_flag(channel, Flag::FifoRead, true);
        self.delay.delay_ms(1);
        for sample in capture.raw.iter_mut() {
            *sample = self.read(channel.data());
        }
        self.set_flag(channel, Flag::FifoRead, false);
    }

    /// Sample both channels in parallel.
    ///
    /// Channels with zero frequency are skipped and their capture is left
    /// untouched.
    ///
    /// # Args
    /// * `frequency` - Signal frequency per channel in Hz.
    /// * `capture` - Per channel sample buffers.
    pub fn acquire(
        &mut self,
        frequency: [f32; 2],
        capture: &mut [Capture; 2],
    ) -> Result<(), Error> {
        let active = |ch: Channel| frequency[ch.index()] > 0.0;
        for ch in Channel::ALL.into_iter().filter(|&ch| active(ch)) {
            self.set_sampling_frequency(ch, frequency[ch.index()]);
            self.set_flag(ch, Flag::FifoWrite, true);
        }
        self.delay.delay_ms(1);

        let mut full = Ok(());
        for ch in Channel::ALL.into_iter().filter(|&ch| active(ch)) {
            if full.is_ok() {
                full = self.wait_full(ch);
            }
            self.set_flag(ch, Flag::FifoWrite, false);
        }
        if let Err(e) = full {
            log::warn!("{e}");
            return Err(e);
        }

        for ch in Channel::ALL.into_iter().filter(|&ch| active(ch)) {
            self.read_fifo(ch, &mut capture[ch.index()]);
        }
        Ok(())
    }

    /// Measure the signal frequency of a channel with the gated counter.
    ///
    /// # Returns
    /// Frequency in Hz or `None` if no edges were counted or the reference
    /// count is implausible.
    pub fn measure_frequency(&mut self, channel: Channel) -> Option<f32> {
        self.set_flag(channel, Flag::CounterClearN, false);
        self.delay.delay_ms(1);
        self.set_flag(channel, Flag::CounterClearN, true);
        self.delay.delay_ms(1);

        self.set_flag(channel, Flag::CounterStart, true);
        self.delay.delay_ms(COUNTER_GATE_MS);
        self.set_flag(channel, Flag::CounterStart, false);

        let count = self.read_u32(channel.count());
        let base = self.read_u32(channel.base());
        if count == 0 || base <= MIN_BASE_COUNT {
            log::debug!("{channel:?}: count {count}, base {base}");
            return None;
        }
        Some((CLOCK / base as f64 * count as f64) as f32)
    }
}
