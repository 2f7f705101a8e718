#![cfg_attr(not(test), no_std)]

use arbitrary_int::{u10, u2, u24, u4, u5, Number};
use bitbybit::{bitenum, bitfield};
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Frequency tuning word per Hz, calibrated for the 25 MHz reference with
/// the PLL multiplier of 20.
pub const FRE_REF: f64 = 8.5904963602764;

/// Phase offset word per degree, `2^14 / 360`.
pub const POW_REF: f32 = 45.511_11;

/// Largest amplitude scale factor.
pub const MAX_AMPLITUDE: u16 = 0x3ff;

/// Reference clock multiplier.
pub const PLL_RATIO: u8 = 20;

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum SerialMode {
    TwoWire = 0,
    ThreeWire = 1,
    TwoBit = 2,
    FourBit = 3,
}

/// Channel select register.
#[bitfield(u8, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Csr {
    #[bit(0, rw)]
    pub lsb_first: bool,
    #[bits(1..=2, rw)]
    pub mode: SerialMode,
    /// One enable bit per channel, channel 0 in the lowest bit.
    #[bits(4..=7, rw)]
    pub channels: u4,
}

/// Function register 1.
#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Fr1 {
    #[bits(16..=17, rw)]
    pub charge_pump: u2,
    #[bits(18..=22, rw)]
    pub pll_ratio: u5,
    /// VCO above 255 MHz.
    #[bit(23, rw)]
    pub vco_gain: bool,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum DacCurrent {
    Eighth = 0,
    Half = 1,
    Quarter = 2,
    Full = 3,
}

#[bitenum(u2, exhaustive = true)]
#[derive(Debug, PartialEq)]
pub enum Modulation {
    Disabled = 0,
    Amplitude = 1,
    Frequency = 2,
    Phase = 3,
}

/// Channel function register.
#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Cfr {
    #[bit(0, rw)]
    pub sine_output: bool,
    #[bit(1, rw)]
    pub clear_phase: bool,
    #[bit(2, rw)]
    pub autoclear_phase: bool,
    #[bit(3, rw)]
    pub clear_sweep: bool,
    #[bit(4, rw)]
    pub autoclear_sweep: bool,
    #[bit(5, rw)]
    pub matched_pipe_delays: bool,
    #[bit(6, rw)]
    pub dac_power_down: bool,
    #[bit(7, rw)]
    pub digital_power_down: bool,
    #[bits(8..=9, rw)]
    pub dac_current: DacCurrent,
    #[bit(13, rw)]
    pub load_srr: bool,
    #[bit(14, rw)]
    pub sweep: bool,
    /// Return to the start value once the sweep completes.
    #[bit(15, rw)]
    pub no_dwell: bool,
    #[bits(22..=23, rw)]
    pub modulation: Modulation,
}

/// Amplitude control register.
#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Acr {
    #[bits(0..=9, rw)]
    pub scale: u10,
    #[bit(10, rw)]
    pub load_arr: bool,
    #[bit(11, rw)]
    pub ramp: bool,
    #[bit(12, rw)]
    pub multiplier: bool,
    #[bits(14..=15, rw)]
    pub step: u2,
    #[bits(16..=23, rw)]
    pub ramp_rate: u8,
}

/// Ramp rate word per unit step interval.
const RAMP_RATE_SCALE: f32 = 0.4;

/// Serial register addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Register {
    Csr = 0x00,
    Fr1 = 0x01,
    Fr2 = 0x02,
    Cfr = 0x03,
    Cftw0 = 0x04,
    Cpow0 = 0x05,
    Acr = 0x06,
    Lsrr = 0x07,
    Rdw = 0x08,
    Fdw = 0x09,
    Cw1 = 0x0a,
    Cw2 = 0x0b,
    Cw3 = 0x0c,
    Cw4 = 0x0d,
    Cw5 = 0x0e,
    Cw6 = 0x0f,
    Cw7 = 0x10,
    Cw8 = 0x11,
    Cw9 = 0x12,
    Cw10 = 0x13,
    Cw11 = 0x14,
    Cw12 = 0x15,
    Cw13 = 0x16,
    Cw14 = 0x17,
    Cw15 = 0x18,
}

impl Register {
    /// Register width in bytes.
    pub const fn len(self) -> usize {
        match self {
            Self::Csr => 1,
            Self::Fr1 => 3,
            Self::Fr2 => 2,
            Self::Cfr => 3,
            Self::Cftw0 => 4,
            Self::Cpow0 => 2,
            Self::Acr => 3,
            Self::Lsrr => 2,
            _ => 4,
        }
    }
}

/// Output channel selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Channel {
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
    All = 4,
}

impl Channel {
    /// Channel enable bits of the CSR.
    pub fn csr(self) -> Csr {
        let channels = match self {
            Self::All => u4::MAX,
            ch => u4::new(1 << ch as u8),
        };
        Csr::default().with_channels(channels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error<E> {
    #[error("Interface")]
    Interface(E),
    #[error("Pin")]
    Pin,
}

/// Serial access to the DDS register file.
pub trait Interface {
    type Error;

    /// Write a register.
    ///
    /// # Args
    /// * `addr` - Register address.
    /// * `data` - Register contents, most significant byte first.
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Transfer the I/O buffers into the active registers.
    fn io_update(&mut self) -> Result<(), Self::Error>;
}

/// Frequency tuning word for a frequency in Hz.
pub fn frequency_to_ftw(frequency: f32) -> u32 {
    (frequency as f64 * FRE_REF) as u32
}

/// Phase offset word for a phase in degrees.
///
/// Only the low 14 bits are significant; negative phases wrap.
pub fn phase_to_pow(phase: f32) -> u16 {
    (phase * POW_REF) as i32 as u16
}

/// Amplitude control word with the multiplier enabled.
pub fn amplitude_to_acr(amplitude: u16) -> Acr {
    Acr::default()
        .with_multiplier(true)
        .with_scale(u10::new(amplitude.min(MAX_AMPLITUDE)))
}

fn word(raw: u24) -> u32 {
    raw.value()
}

/// Linear frequency sweep parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sweep {
    /// Start frequency in Hz.
    pub start: f32,
    /// End frequency in Hz.
    pub end: f32,
    /// Rising step in Hz.
    pub rise_step: f32,
    /// Falling step in Hz.
    pub fall_step: f32,
    /// Rising step interval.
    pub rise_interval: f32,
    /// Falling step interval.
    pub fall_interval: f32,
    /// Jump back to the start frequency at the end of the sweep instead of
    /// holding the end frequency.
    pub no_dwell: bool,
}

/// AD9959 driver.
pub struct Ad9959<I> {
    interface: I,
}

impl<I: Interface> Ad9959<I> {
    /// Reset and configure the DDS.
    ///
    /// # Args
    /// * `interface` - Serial interface.
    /// * `reset` - Master reset pin, active high.
    /// * `delay` - Delay for the reset pulse.
    pub fn new<R: OutputPin, D: DelayNs>(
        interface: I,
        reset: &mut R,
        delay: &mut D,
    ) -> Result<Self, Error<I::Error>> {
        reset.set_low().map_err(|_| Error::<I::Error>::Pin)?;
        delay.delay_ms(1);
        reset.set_high().map_err(|_| Error::<I::Error>::Pin)?;
        delay.delay_ms(1);
        reset.set_low().map_err(|_| Error::<I::Error>::Pin)?;

        let mut dds = Self { interface };
        dds.init()?;
        log::info!("AD9959 initialized");
        Ok(dds)
    }

    /// Write the default register configuration.
    pub fn init(&mut self) -> Result<(), Error<I::Error>> {
        let fr1 = Fr1::default()
            .with_vco_gain(true)
            .with_pll_ratio(u5::new(PLL_RATIO));
        let cfr = Cfr::default().with_dac_current(DacCurrent::Full);
        // Two wire serial mode, MSB first, no channel selected.
        self.write(Register::Csr, Csr::default().raw_value() as u32)?;
        self.write(Register::Fr1, word(fr1.raw_value()))?;
        self.write(Register::Fr2, 0)?;
        self.write(Register::Cfr, word(cfr.raw_value()))?;
        self.update()
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    /// Write a register, truncated to its width.
    pub fn write(
        &mut self,
        reg: Register,
        value: u32,
    ) -> Result<(), Error<I::Error>> {
        let bytes = value.to_be_bytes();
        self.interface
            .write(reg.into(), &bytes[bytes.len() - reg.len()..])
            .map_err(Error::Interface)
    }

    pub fn update(&mut self) -> Result<(), Error<I::Error>> {
        self.interface.io_update().map_err(Error::Interface)
    }

    /// Route subsequent channel register writes.
    pub fn select(&mut self, channel: Channel) -> Result<(), Error<I::Error>> {
        self.write(Register::Csr, channel.csr().raw_value() as u32)
    }

    /// Set the frequency of the selected channels.
    pub fn set_frequency(
        &mut self,
        frequency: f32,
    ) -> Result<u32, Error<I::Error>> {
        let ftw = frequency_to_ftw(frequency);
        self.write(Register::Cftw0, ftw)?;
        self.update()?;
        Ok(ftw)
    }

    /// Set the phase in degrees of the selected channels.
    pub fn set_phase(&mut self, phase: f32) -> Result<u16, Error<I::Error>> {
        let pow = phase_to_pow(phase);
        self.write(Register::Cpow0, pow as u32)?;
        self.update()?;
        Ok(pow)
    }

    /// Set the amplitude scale factor (0 to 1023) of the selected channels.
    pub fn set_amplitude(
        &mut self,
        amplitude: u16,
    ) -> Result<Acr, Error<I::Error>> {
        let acr = amplitude_to_acr(amplitude);
        self.write(Register::Acr, word(acr.raw_value()))?;
        self.update()?;
        Ok(acr)
    }

    /// Configure a channel for a fixed tone.
    ///
    /// # Args
    /// * `channel` - Output channel.
    /// * `frequency` - Frequency in Hz.
    /// * `phase` - Phase in degrees.
    /// * `amplitude` - Amplitude scale factor, 0 to 1023.
    pub fn single_output(
        &mut self,
        channel: Channel,
        frequency: f32,
        phase: f32,
        amplitude: u16,
    ) -> Result<(), Error<I::Error>> {
        self.select(channel)?;
        self.set_frequency(frequency)?;
        self.set_phase(phase)?;
        self.set_amplitude(amplitude)?;
        Ok(())
    }

    /// Configure a linear frequency sweep at full amplitude.
    ///
    /// The sweep is started by the channel profile pin.
    pub fn sweep_frequency(
        &mut self,
        channel: Channel,
        sweep: &Sweep,
    ) -> Result<(), Error<I::Error>> {
        let rise = (sweep.rise_interval * RAMP_RATE_SCALE) as u8;
        let fall = (sweep.fall_interval * RAMP_RATE_SCALE) as u8;
        let cfr = Cfr::default()
            .with_modulation(Modulation::Frequency)
            .with_sweep(true)
            .with_no_dwell(sweep.no_dwell)
            .with_dac_current(DacCurrent::Full)
            .with_autoclear_sweep(true)
            .with_autoclear_phase(true);
        let fr1 = Fr1::default()
            .with_vco_gain(true)
            .with_pll_ratio(u5::new(PLL_RATIO));
        let acr = Acr::default().with_scale(u10::new(MAX_AMPLITUDE));

        self.select(channel)?;
        self.write(Register::Acr, word(acr.raw_value()))?;
        self.write(Register::Cfr, word(cfr.raw_value()))?;
        self.write(Register::Fr1, word(fr1.raw_value()))?;
        self.write(Register::Cftw0, frequency_to_ftw(sweep.start))?;
        self.write(Register::Cw1, frequency_to_ftw(sweep.end))?;
        self.write(Register::Rdw, frequency_to_ftw(sweep.rise_step))?;
        self.write(Register::Fdw, frequency_to_ftw(sweep.fall_step))?;
        self.write(Register::Lsrr, u16::from_be_bytes([fall, rise]) as u32)?;
        self.update()
    }
}

/// Bit-banged single bit serial interface.
///
/// SDIO3 is held low during a transfer. Data is shifted out MSB first on
/// SDIO0 and latched on the rising SCLK edge.
pub struct BitBang<P, D> {
    cs: P,
    sclk: P,
    sdio0: P,
    sdio3: P,
    io_update: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> BitBang<P, D> {
    /// Half period of the serial and update clocks.
    const HALF_PERIOD_NS: u32 = 500;

    pub fn new(
        cs: P,
        sclk: P,
        sdio0: P,
        sdio3: P,
        io_update: P,
        delay: D,
    ) -> Result<Self, P::Error> {
        let mut bus = Self {
            cs,
            sclk,
            sdio0,
            sdio3,
            io_update,
            delay,
        };
        bus.sclk.set_low()?;
        bus.io_update.set_low()?;
        bus.cs.set_high()?;
        bus.delay.delay_ms(1);
        bus.cs.set_low()?;
        bus.delay.delay_ms(1);
        Ok(bus)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), P::Error> {
        for bit in (0..8).rev() {
            if byte & (1 << bit) != 0 {
                self.sdio0.set_high()?;
            } else {
                self.sdio0.set_low()?;
            }
            self.sclk.set_high()?;
            self.delay.delay_ns(Self::HALF_PERIOD_NS);
            self.sclk.set_low()?;
        }
        Ok(())
    }
}

impl<P: OutputPin, D: DelayNs> Interface for BitBang<P, D> {
    type Error = P::Error;

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.sdio3.set_low()?;
        self.cs.set_low()?;
        self.write_byte(addr)?;
        for &byte in data {
            self.write_byte(byte)?;
        }
        self.cs.set_high()?;
        self.sdio3.set_high()
    }

    fn io_update(&mut self) -> Result<(), Self::Error> {
        for _ in 0..2 {
            self.io_update.set_low()?;
            self.delay.delay_ns(Self::HALF_PERIOD_NS);
            self.io_update.set_high()?;
            self.delay.delay_ns(Self::HALF_PERIOD_NS);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::convert::Infallible;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Write(u8, Vec<u8>),
        Update,
    }

    #[derive(Default)]
    struct Recorder(Vec<Op>);

    impl Interface for Recorder {
        type Error = Infallible;

        fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), Infallible> {
            self.0.push(Op::Write(addr, data.to_vec()));
            Ok(())
        }

        fn io_update(&mut self) -> Result<(), Infallible> {
            self.0.push(Op::Update);
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Pin logging `(id, level)` transitions into a shared trace.
    struct Pin(u8, Rc<RefCell<Vec<(u8, bool)>>>);

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.1.borrow_mut().push((self.0, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.1.borrow_mut().push((self.0, true));
            Ok(())
        }
    }

    fn dds() -> Ad9959<Recorder> {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut reset = Pin(0, trace.clone());
        let dds = Ad9959::new(Recorder::default(), &mut reset, &mut NoDelay)
            .unwrap();
        assert_eq!(*trace.borrow(), [(0, false), (0, true), (0, false)]);
        dds
    }

    #[test]
    fn register_widths() {
        assert_eq!(Register::Csr.len(), 1);
        assert_eq!(Register::Fr2.len(), 2);
        assert_eq!(Register::Acr.len(), 3);
        assert_eq!(Register::Lsrr.len(), 2);
        assert_eq!(Register::Cw15.len(), 4);
        assert_eq!(Register::try_from(0x0a).ok(), Some(Register::Cw1));
    }

    #[test]
    fn register_fields() {
        assert_eq!(Channel::Zero.csr().raw_value(), 0x10);
        assert_eq!(Channel::Three.csr().raw_value(), 0x80);
        assert_eq!(Channel::All.csr().raw_value(), 0xf0);
        let csr = Csr::default()
            .with_mode(SerialMode::FourBit)
            .with_lsb_first(true);
        assert_eq!(csr.raw_value(), 0x07);

        let cfr = Cfr::new_with_raw_value(u24::new(0x80_c314));
        assert_eq!(cfr.modulation(), Modulation::Frequency);
        assert!(cfr.sweep() && cfr.no_dwell() && !cfr.load_srr());
        assert_eq!(cfr.dac_current(), DacCurrent::Full);
        assert!(cfr.autoclear_sweep() && cfr.autoclear_phase());

        let fr1 = Fr1::new_with_raw_value(u24::new(0xd0_0000));
        assert_eq!(fr1.pll_ratio(), u5::new(PLL_RATIO));
        assert!(fr1.vco_gain());
        assert_eq!(fr1.charge_pump(), u2::new(0));
    }

    #[test]
    fn init_sequence() {
        let dds = dds();
        assert_eq!(
            dds.interface().0,
            [
                Op::Write(0x00, vec![0x00]),
                Op::Write(0x01, vec![0xd0, 0x00, 0x00]),
                Op::Write(0x02, vec![0x00, 0x00]),
                Op::Write(0x03, vec![0x00, 0x03, 0x00]),
                Op::Update,
            ]
        );
    }

    #[test]
    fn words() {
        assert_eq!(frequency_to_ftw(0.0), 0);
        assert_eq!(frequency_to_ftw(2e6), 17_180_992);
        // Truncation of the rounded scale factor.
        assert_eq!(phase_to_pow(90.0), 4095);
        assert_eq!(phase_to_pow(-90.0), (-4095i32) as u16);
        assert_eq!(amplitude_to_acr(38).raw_value().value(), 0x1026);
        let acr = amplitude_to_acr(5000);
        assert_eq!(acr.scale(), u10::new(MAX_AMPLITUDE));
        assert!(acr.multiplier() && !acr.ramp());
    }

    #[test]
    fn single_output() {
        let mut dds = dds();
        dds.interface_mut().0.clear();
        dds.single_output(Channel::Zero, 2e6, 0.0, 1023).unwrap();
        let ftw = 17_180_992u32.to_be_bytes();
        assert_eq!(
            dds.interface().0,
            [
                Op::Write(0x00, vec![0x10]),
                Op::Write(0x04, ftw.to_vec()),
                Op::Update,
                Op::Write(0x05, vec![0, 0]),
                Op::Update,
                Op::Write(0x06, vec![0x00, 0x13, 0xff]),
                Op::Update,
            ]
        );
    }

    #[test]
    fn sweep() {
        let mut dds = dds();
        dds.interface_mut().0.clear();
        let sweep = Sweep {
            start: 1e3,
            end: 1e6,
            rise_step: 100.0,
            fall_step: 200.0,
            rise_interval: 10.0,
            fall_interval: 20.0,
            no_dwell: true,
        };
        dds.sweep_frequency(Channel::All, &sweep).unwrap();
        let ops = &dds.interface().0;
        assert_eq!(ops[0], Op::Write(0x00, vec![0xf0]));
        assert_eq!(ops[2], Op::Write(0x03, vec![0x80, 0xc3, 0x14]));
        assert_eq!(ops[8], Op::Write(0x07, vec![8, 4]));
        assert_eq!(ops.last(), Some(&Op::Update));
        assert_eq!(ops.len(), 10);
    }

    #[test]
    fn bit_bang_frame() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let pin = |id| Pin(id, trace.clone());
        // cs = 1, sclk = 2, sdio0 = 3, sdio3 = 4, io_update = 5
        let mut bus =
            BitBang::new(pin(1), pin(2), pin(3), pin(4), pin(5), NoDelay)
                .unwrap();
        trace.borrow_mut().clear();
        bus.write(0x00, &[0xa5]).unwrap();
        let t = trace.borrow();
        assert_eq!(t[..2], [(4, false), (1, false)]);
        assert_eq!(t[t.len() - 2..], [(1, true), (4, true)]);
        // Data bits in order of rising SCLK edges.
        let mut bits = Vec::new();
        let mut data = false;
        for &(id, level) in t.iter() {
            match (id, level) {
                (3, l) => data = l,
                (2, true) => bits.push(data),
                _ => {}
            }
        }
        assert_eq!(bits.len(), 16);
        let byte = bits[8..].iter().fold(0u8, |b, &x| (b << 1) | x as u8);
        assert_eq!(byte, 0xa5);
        assert!(bits[..8].iter().all(|&b| !b));
    }
}
