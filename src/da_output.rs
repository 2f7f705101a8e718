//! Two channel DA output configuration with deferred apply.
//!
//! Configuration changes only touch the in-memory shadow. The FPGA registers
//! are written in one burst by [`DaOutput::apply`], with the output stopped
//! while the channels are reprogrammed.
use embedded_hal::delay::DelayNs;
use fpga::{Dac, Fpga, RegisterBus, Write};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Phase register LSBs per degree.
pub const PHASE_SCALE: f32 = 2.844;

/// DA sample clock in Hz.
const DA_CLOCK: f64 = 150e6;

/// Samples per period of the DA waveform tables.
const TABLE_LEN: f64 = 1024.0;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u8)]
pub enum Waveform {
    #[default]
    Sine = 0,
    Square = 1,
    Triangle = 2,
    Sawtooth = 3,
}

impl Waveform {
    /// Next waveform in the key cycle, wrapping back to sine.
    pub fn next(self) -> Self {
        match self {
            Self::Sine => Self::Square,
            Self::Square => Self::Triangle,
            Self::Triangle => Self::Sawtooth,
            Self::Sawtooth => Self::Sine,
        }
    }
}

/// Settings of one DA channel.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Output frequency in Hz.
    pub frequency: f32,
    /// Amplitude code.
    pub amplitude: u16,
    /// Phase in degrees.
    pub phase: u16,
    pub waveform: Waveform,
}

impl ChannelConfig {
    pub const fn new(
        frequency: f32,
        amplitude: u16,
        phase: u16,
        waveform: Waveform,
    ) -> Self {
        Self {
            frequency,
            amplitude,
            phase,
            waveform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid DA channel {0}")]
    InvalidChannel(usize),
}

/// Frequency tuning word of the DA phase accumulator.
///
/// `2^32 f / 150 MHz * 1024`. Frequencies above about 146 kHz saturate.
pub fn frequency_word(frequency: f32) -> u32 {
    ((1u64 << 32) as f64 * frequency as f64 / DA_CLOCK * TABLE_LEN) as u32
}

/// Phase offset word for a phase in degrees.
pub fn phase_word(phase: u16) -> u16 {
    libm::roundf((phase % 360) as f32 * PHASE_SCALE) as u16
}

/// Shadow of the two DA channel configurations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DaOutput {
    channels: [ChannelConfig; 2],
}

impl Default for DaOutput {
    fn default() -> Self {
        Self::new([
            ChannelConfig::new(20_000.0, 1000, 180, Waveform::Sine),
            ChannelConfig::new(20_000.0, 1000, 0, Waveform::Sine),
        ])
    }
}

impl DaOutput {
    pub fn new(channels: [ChannelConfig; 2]) -> Self {
        Self { channels }
    }

    /// Stage a channel configuration. No hardware access.
    ///
    /// # Args
    /// * `index` - Channel index, 0 or 1.
    /// * `frequency` - Frequency in Hz.
    /// * `amplitude` - Amplitude code.
    /// * `phase` - Phase in degrees.
    /// * `waveform` - Waveform table.
    pub fn set_config(
        &mut self,
        index: usize,
        frequency: f32,
        amplitude: u16,
        phase: u16,
        waveform: Waveform,
    ) -> Result<(), Error> {
        *self.channel_mut(index)? =
            ChannelConfig::new(frequency, amplitude, phase, waveform);
        Ok(())
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelConfig, Error> {
        self.channels
            .get(index)
            .ok_or(Error::InvalidChannel(index))
    }

    pub fn channel_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut ChannelConfig, Error> {
        self.channels
            .get_mut(index)
            .ok_or(Error::InvalidChannel(index))
    }

    pub fn channels(&self) -> &[ChannelConfig; 2] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [ChannelConfig; 2] {
        &mut self.channels
    }

    /// Set the waveform of both channels.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        for ch in self.channels.iter_mut() {
            ch.waveform = waveform;
        }
    }

    /// Packed waveform register, channel 2 in the high byte.
    pub fn waveform_word(&self) -> u16 {
        let [a, b] = self.channels.map(|ch| u8::from(ch.waveform) as u16);
        (b << 8) | a
    }

    /// Write the staged configuration to the FPGA.
    ///
    /// The output is stopped, each channel's frequency, amplitude and phase
    /// registers are written once, then the shared waveform register, and
    /// the output is restarted.
    pub fn apply<B: RegisterBus, D: DelayNs>(&self, fpga: &mut Fpga<B, D>) {
        fpga.da_stop();
        for (dac, ch) in Dac::ALL.into_iter().zip(self.channels.iter()) {
            fpga.write_u32(dac.frequency(), frequency_word(ch.frequency));
            fpga.write(dac.amplitude(), ch.amplitude);
            fpga.write(dac.phase(), phase_word(ch.phase));
        }
        fpga.write(Write::DaWaveform, self.waveform_word());
        fpga.da_start();
        log::debug!("DA applied: {:?}", self.channels);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fpga::mock::{MockBus, MockDelay};
    use fpga::Control;

    #[test]
    fn words() {
        assert_eq!(frequency_word(1000.0), 29_320_310);
        assert_eq!(frequency_word(20_000.0), 586_406_201);
        assert_eq!(phase_word(180), 512);
        assert_eq!(phase_word(30), 85);
        assert_eq!(phase_word(390), 85);
        assert_eq!(phase_word(0), 0);
    }

    #[test]
    fn waveform_cycle() {
        let mut w = Waveform::Sine;
        let mut seen = vec![];
        for _ in 0..5 {
            seen.push(w);
            w = w.next();
        }
        use Waveform::*;
        assert_eq!(seen, [Sine, Square, Triangle, Sawtooth, Sine]);
        assert_eq!(Waveform::try_from(3u8).ok(), Some(Sawtooth));
        assert!(Waveform::try_from(4u8).is_err());
    }

    #[test]
    fn invalid_channel() {
        let mut da = DaOutput::default();
        let before = da;
        assert_eq!(
            da.set_config(2, 1.0, 1, 1, Waveform::Square),
            Err(Error::InvalidChannel(2))
        );
        assert_eq!(da, before);
        assert!(da.channel(5).is_err());
    }

    #[test]
    fn set_config_is_deferred() {
        let mut fpga = Fpga::new(MockBus::default(), MockDelay::default());
        fpga.bus_mut().clear();
        let mut da = DaOutput::default();
        da.set_config(1, 1000.0, 512, 90, Waveform::Triangle).unwrap();
        da.set_config(0, 2000.0, 256, 30, Waveform::Square).unwrap();
        assert!(fpga.bus().writes().is_empty());
        assert_eq!(da.waveform_word(), 0x0201);
    }

    #[test]
    fn apply_writes_each_register_once() {
        let mut fpga = Fpga::new(MockBus::default(), MockDelay::default());
        fpga.bus_mut().clear();
        let da = DaOutput::default();
        da.apply(&mut fpga);

        let bus = fpga.bus();
        // DA stopped first, restarted last.
        assert_eq!(bus.writes().first(), Some(&(1, 0)));
        let enabled = Control::default().with_da_enable(true).raw_value();
        assert_eq!(bus.writes().last(), Some(&(1, enabled)));
        let word = frequency_word(20_000.0);
        for reg in [Write::Da1FrequencyHigh, Write::Da2FrequencyHigh] {
            assert_eq!(bus.writes_to(reg), [(word >> 16) as u16]);
        }
        for reg in [Write::Da1FrequencyLow, Write::Da2FrequencyLow] {
            assert_eq!(bus.writes_to(reg), [word as u16]);
        }
        assert_eq!(bus.writes_to(Write::Da1Amplitude), [1000]);
        assert_eq!(bus.writes_to(Write::Da2Amplitude), [1000]);
        assert_eq!(bus.writes_to(Write::Da1Phase), [512]);
        assert_eq!(bus.writes_to(Write::Da2Phase), [0]);
        assert_eq!(bus.writes_to(Write::DaWaveform), [0]);
        // Control twice plus nine data registers.
        assert_eq!(bus.writes().len(), 11);
        // The waveform register follows both channels.
        assert_eq!(bus.writes()[9].0, u16::from(Write::DaWaveform));
    }
}
