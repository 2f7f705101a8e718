//! DDS amplitude regulation.
//!
//! The peak to peak voltage measured on AD2 is scaled into the regulated
//! quantity and a PID drives the AD9959 channel 0 amplitude code.
use ad9959::{Ad9959, Channel, Interface};
use dsp::pid::{Controller, Incremental, Positional};
use serde::{Deserialize, Serialize};

use crate::settings;

/// PID form of the amplitude loop.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Form {
    #[default]
    Incremental,
    Positional,
}

/// The configured amplitude controller.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Regulator {
    Incremental(Incremental),
    Positional(Positional),
}

impl Regulator {
    pub fn new(settings: &settings::Amplitude) -> Self {
        let (min, max) = (settings.min as f32, settings.max as f32);
        match settings.form {
            Form::Incremental => Self::Incremental(Incremental::new(
                settings.incremental,
                settings.setpoint,
                min,
                max,
            )),
            Form::Positional => Self::Positional(Positional::new(
                settings.positional,
                settings.setpoint,
                min,
                max,
                settings.max_integral,
            )),
        }
    }

    pub fn form(&self) -> Form {
        match self {
            Self::Incremental(_) => Form::Incremental,
            Self::Positional(_) => Form::Positional,
        }
    }
}

impl Controller for Regulator {
    fn update(&mut self, measurement: f32) -> f32 {
        match self {
            Self::Incremental(pid) => pid.update(measurement),
            Self::Positional(pid) => pid.update(measurement),
        }
    }

    fn setpoint(&self) -> f32 {
        match self {
            Self::Incremental(pid) => pid.setpoint(),
            Self::Positional(pid) => pid.setpoint(),
        }
    }

    fn set_setpoint(&mut self, setpoint: f32) {
        match self {
            Self::Incremental(pid) => pid.set_setpoint(setpoint),
            Self::Positional(pid) => pid.set_setpoint(setpoint),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Incremental(pid) => pid.reset(),
            Self::Positional(pid) => pid.reset(),
        }
    }
}

pub struct AmplitudeLoop {
    regulator: Regulator,
    scale: f32,
    min: u16,
    max: u16,
    frequency: f32,
    phase: f32,
    code: u16,
}

impl AmplitudeLoop {
    pub fn new(settings: &settings::Amplitude) -> Self {
        Self {
            regulator: Regulator::new(settings),
            scale: settings.scale,
            min: settings.min,
            max: settings.max,
            frequency: settings.frequency,
            phase: settings.phase,
            code: settings.min,
        }
    }

    pub fn regulator(&self) -> &Regulator {
        &self.regulator
    }

    pub fn regulator_mut(&mut self) -> &mut Regulator {
        &mut self.regulator
    }

    /// Current amplitude code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Regulated quantity for a peak to peak voltage.
    pub fn measurement(&self, vpp: f32) -> f32 {
        vpp / 2.0 * self.scale
    }

    /// Run one control step.
    ///
    /// # Args
    /// * `vpp` - Measured peak to peak voltage.
    ///
    /// # Returns
    /// The new amplitude code, truncated and clamped to the code range.
    pub fn update(&mut self, vpp: f32) -> u16 {
        let u = self.regulator.update(self.measurement(vpp));
        // Saturating cast, NaN maps to zero and is then clamped.
        self.code = (u as i32).clamp(self.min as i32, self.max as i32) as u16;
        self.code
    }

    /// Program the DDS channel 0 tone with the current code.
    pub fn drive<I: Interface>(
        &self,
        dds: &mut Ad9959<I>,
    ) -> Result<(), ad9959::Error<I::Error>> {
        dds.single_output(Channel::Zero, self.frequency, self.phase, self.code)
    }
}
