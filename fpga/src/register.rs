//! FPGA register map.
//!
//! Registers are 16 bit wide. Most addresses have a different meaning when
//! written than when read, so the two directions are separate types sharing
//! the numeric address space.
use bitbybit::bitfield;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Registers written by the MCU.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Write {
    Control = 1,
    Da1FrequencyHigh = 2,
    Da1FrequencyLow = 3,
    Da2FrequencyHigh = 4,
    Da2FrequencyLow = 5,
    Ad1SampleRateHigh = 6,
    Ad1SampleRateLow = 7,
    Ad2SampleRateHigh = 8,
    Ad2SampleRateLow = 9,
    Da1Phase = 10,
    Da2Phase = 11,
    /// DA1 waveform in the low byte, DA2 in the high byte.
    DaWaveform = 12,
    Da1Amplitude = 14,
    Da2Amplitude = 15,
}

/// Registers read by the MCU.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Read {
    /// Reference clock count of the AD1 frequency counter gate.
    Base1High = 2,
    Base1Low = 3,
    Base2High = 4,
    Base2Low = 5,
    /// Pops one sample from the AD1 FIFO while reading is enabled.
    Ad1Data = 6,
    /// Reads 1 once the AD1 FIFO is full.
    Ad1Full = 7,
    Ad2Data = 8,
    Ad2Full = 9,
    /// Signal edge count of the AD1 frequency counter.
    Ad1CountHigh = 10,
    Ad1CountLow = 11,
    Ad2CountHigh = 12,
    Ad2CountLow = 13,
}

/// Shadow of the write-only control register.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Control {
    #[bit(0, rw)]
    pub da_enable: bool,
    #[bit(2, rw)]
    pub ad1_clock: bool,
    #[bit(3, rw)]
    pub ad2_clock: bool,
    #[bit(4, rw)]
    pub ad1_fifo_write: bool,
    #[bit(5, rw)]
    pub ad1_fifo_read: bool,
    #[bit(6, rw)]
    pub ad2_fifo_write: bool,
    #[bit(7, rw)]
    pub ad2_fifo_read: bool,
    /// Active low.
    #[bit(8, rw)]
    pub ad1_counter_clear_n: bool,
    #[bit(9, rw)]
    pub ad1_counter_start: bool,
    /// Active low.
    #[bit(10, rw)]
    pub ad2_counter_clear_n: bool,
    #[bit(11, rw)]
    pub ad2_counter_start: bool,
}

/// Per channel control bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    Clock,
    FifoWrite,
    FifoRead,
    /// Active low counter clear.
    CounterClearN,
    CounterStart,
}

impl Flag {
    pub const ALL: [Self; 5] = [
        Self::Clock,
        Self::FifoWrite,
        Self::FifoRead,
        Self::CounterClearN,
        Self::CounterStart,
    ];
}

impl Control {
    pub fn flag(self, channel: Channel, flag: Flag) -> bool {
        use Channel::*;
        match (channel, flag) {
            (Ad1, Flag::Clock) => self.ad1_clock(),
            (Ad1, Flag::FifoWrite) => self.ad1_fifo_write(),
            (Ad1, Flag::FifoRead) => self.ad1_fifo_read(),
            (Ad1, Flag::CounterClearN) => self.ad1_counter_clear_n(),
            (Ad1, Flag::CounterStart) => self.ad1_counter_start(),
            (Ad2, Flag::Clock) => self.ad2_clock(),
            (Ad2, Flag::FifoWrite) => self.ad2_fifo_write(),
            (Ad2, Flag::FifoRead) => self.ad2_fifo_read(),
            (Ad2, Flag::CounterClearN) => self.ad2_counter_clear_n(),
            (Ad2, Flag::CounterStart) => self.ad2_counter_start(),
        }
    }

    pub fn with_flag(self, channel: Channel, flag: Flag, value: bool) -> Self {
        use Channel::*;
        match (channel, flag) {
            (Ad1, Flag::Clock) => self.with_ad1_clock(value),
            (Ad1, Flag::FifoWrite) => self.with_ad1_fifo_write(value),
            (Ad1, Flag::FifoRead) => self.with_ad1_fifo_read(value),
            (Ad1, Flag::CounterClearN) => self.with_ad1_counter_clear_n(value),
            (Ad1, Flag::CounterStart) => self.with_ad1_counter_start(value),
            (Ad2, Flag::Clock) => self.with_ad2_clock(value),
            (Ad2, Flag::FifoWrite) => self.with_ad2_fifo_write(value),
            (Ad2, Flag::FifoRead) => self.with_ad2_fifo_read(value),
            (Ad2, Flag::CounterClearN) => self.with_ad2_counter_clear_n(value),
            (Ad2, Flag::CounterStart) => self.with_ad2_counter_start(value),
        }
    }
}

/// Sampling ADC channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    Ad1,
    Ad2,
}

impl Channel {
    pub const ALL: [Self; 2] = [Self::Ad1, Self::Ad2];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sample rate word registers, high half first.
    pub const fn sample_rate(self) -> [Write; 2] {
        match self {
            Self::Ad1 => [Write::Ad1SampleRateHigh, Write::Ad1SampleRateLow],
            Self::Ad2 => [Write::Ad2SampleRateHigh, Write::Ad2SampleRateLow],
        }
    }

    pub const fn data(self) -> Read {
        match self {
            Self::Ad1 => Read::Ad1Data,
            Self::Ad2 => Read::Ad2Data,
        }
    }

    pub const fn full(self) -> Read {
        match self {
            Self::Ad1 => Read::Ad1Full,
            Self::Ad2 => Read::Ad2Full,
        }
    }

    /// Signal count registers, high half first.
    pub const fn count(self) -> [Read; 2] {
        match self {
            Self::Ad1 => [Read::Ad1CountHigh, Read::Ad1CountLow],
            Self::Ad2 => [Read::Ad2CountHigh, Read::Ad2CountLow],
        }
    }

    /// Reference count registers, high half first.
    pub const fn base(self) -> [Read; 2] {
        match self {
            Self::Ad1 => [Read::Base1High, Read::Base1Low],
            Self::Ad2 => [Read::Base2High, Read::Base2Low],
        }
    }
}

/// Waveform generator DA channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dac {
    Da1,
    Da2,
}

impl Dac {
    pub const ALL: [Self; 2] = [Self::Da1, Self::Da2];

    /// Frequency word registers, high half first.
    pub const fn frequency(self) -> [Write; 2] {
        match self {
            Self::Da1 => [Write::Da1FrequencyHigh, Write::Da1FrequencyLow],
            Self::Da2 => [Write::Da2FrequencyHigh, Write::Da2FrequencyLow],
        }
    }

    pub const fn phase(self) -> Write {
        match self {
            Self::Da1 => Write::Da1Phase,
            Self::Da2 => Write::Da2Phase,
        }
    }

    pub const fn amplitude(self) -> Write {
        match self {
            Self::Da1 => Write::Da1Amplitude,
            Self::Da2 => Write::Da2Amplitude,
        }
    }
}
