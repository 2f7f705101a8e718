//! Runtime configuration.
//!
//! All calibrated defaults live in the `Default` implementations below. The
//! whole tree can be stored and loaded as JSON.
use dsp::{pid::Gains, KalmanConfig, WindowKind};
use fugit::ExtU32;
use heapless::String;
use serde::{Deserialize, Serialize};

use crate::amplitude::Form;
use crate::da_output::{ChannelConfig, Waveform};
use crate::scheduler::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("settings decode: {0}")]
    Decode(serde_json_core::de::Error),
    #[error("settings encode: {0}")]
    Encode(serde_json_core::ser::Error),
}

/// FPGA FIFO acquisition.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    /// Signal frequency per channel in Hz. Zero disables a channel.
    pub frequency: [f32; 2],
    /// Full flag polls before a FIFO read is abandoned.
    pub fifo_poll_limit: u32,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            frequency: [2e6, 2e6],
            fifo_poll_limit: fpga::FIFO_POLL_LIMIT,
        }
    }
}

/// Dual peak analysis of the FIFO capture.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Sample rate assumed for the FIFO capture in Hz.
    pub sampling_frequency: f32,
    /// Relative peak threshold for DA auto configuration.
    pub threshold: f32,
    /// Relative peak threshold of the spectrum report.
    pub report_threshold: f32,
    /// Peaks above this magnitude in volts are reproduced as sine, others as
    /// triangle.
    pub sine_threshold: f32,
    /// Amplitude code of auto configured channels.
    pub amplitude: u16,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            sampling_frequency: 2e6,
            threshold: 0.15,
            report_threshold: 0.2,
            sine_threshold: 0.3,
            amplitude: 1000,
        }
    }
}

/// Frequency tracking loop.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub gains: Gains,
    pub max_integral: f32,
    /// Largest frequency change per step in Hz.
    pub max_step: f32,
    /// Phase difference setpoint in radians.
    pub reference: f32,
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            gains: Gains::new(0.05, 0.0, 0.6),
            max_integral: 0.2,
            max_step: 0.5,
            reference: 0.0,
        }
    }
}

/// Amplitude regulation loop.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amplitude {
    pub enabled: bool,
    pub form: Form,
    pub incremental: Gains,
    pub positional: Gains,
    /// Target in units of the scaled measurement.
    pub setpoint: f32,
    /// Amplitude code range.
    pub min: u16,
    pub max: u16,
    /// Integral bound of the positional form.
    pub max_integral: f32,
    /// Measurement scale applied to half the peak to peak voltage.
    pub scale: f32,
    /// DDS channel 0 tone.
    pub frequency: f32,
    pub phase: f32,
}

impl Default for Amplitude {
    fn default() -> Self {
        Self {
            enabled: true,
            form: Form::Incremental,
            incremental: Gains::new(0.8, 0.7, 0.2),
            positional: Gains::new(10.0, 0.5, 6.0),
            setpoint: 3.0,
            min: 38,
            max: 1023,
            max_integral: 1023.0,
            scale: 10.0,
            frequency: 2e6,
            phase: 0.0,
        }
    }
}

/// Task periods in milliseconds.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Periods {
    pub acquisition: u32,
    pub keys: u32,
    pub tracking: u32,
    pub amplitude: u32,
    /// Spectrum report of the AD1 capture.
    pub report: u32,
    /// Gated counter frequency measurement.
    pub frequency: u32,
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            acquisition: 1,
            keys: 10,
            tracking: 1,
            amplitude: 1,
            report: 1000,
            frequency: 5000,
        }
    }
}

impl Periods {
    pub fn acquisition(&self) -> Duration {
        self.acquisition.millis()
    }

    pub fn keys(&self) -> Duration {
        self.keys.millis()
    }

    pub fn tracking(&self) -> Duration {
        self.tracking.millis()
    }

    pub fn amplitude(&self) -> Duration {
        self.amplitude.millis()
    }

    pub fn report(&self) -> Duration {
        self.report.millis()
    }

    pub fn frequency(&self) -> Duration {
        self.frequency.millis()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub window: WindowKind,
    pub acquisition: Acquisition,
    pub analysis: Analysis,
    pub tracking: Tracking,
    pub amplitude: Amplitude,
    /// Smoothing of the per channel peak to peak voltages.
    pub kalman: KalmanConfig,
    /// Smoothing of the reported THD.
    pub thd_kalman: KalmanConfig,
    /// DA configuration at startup.
    pub da: [ChannelConfig; 2],
    pub periods: Periods,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowKind::Hamming,
            acquisition: Acquisition::default(),
            analysis: Analysis::default(),
            tracking: Tracking::default(),
            amplitude: Amplitude::default(),
            kalman: KalmanConfig::default(),
            thd_kalman: KalmanConfig {
                initial_covariance: 1.0,
                ..KalmanConfig::default()
            },
            da: [
                ChannelConfig::new(20_000.0, 1000, 180, Waveform::Sine),
                ChannelConfig::new(20_000.0, 1000, 0, Waveform::Sine),
            ],
            periods: Periods::default(),
        }
    }
}

impl Settings {
    /// Decode settings from JSON. All fields are required.
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let (settings, _) =
            serde_json_core::from_slice(json).map_err(Error::Decode)?;
        Ok(settings)
    }

    /// Encode settings as JSON.
    pub fn to_json<const N: usize>(&self) -> Result<String<N>, Error> {
        serde_json_core::to_string(self).map_err(Error::Encode)
    }
}
