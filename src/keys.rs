//! Front panel keys.
use crate::da_output::Waveform;

/// Phase step of the phase key in degrees.
pub const PHASE_STEP: u16 = 30;

/// Key scanning.
pub trait KeyInput {
    /// Code of the pressed key, zero if none.
    fn read(&mut self) -> u8;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Key 1: next waveform on both DA channels.
    CycleWaveform,
    /// Key 2: print the AD1 FIFO capture.
    DumpCapture,
    /// Key 3: advance the DA channel 1 phase.
    StepPhase,
    /// Key 4: dual peak analysis and DA auto configuration.
    AnalyzeCapture,
}

impl TryFrom<u8> for Action {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        Ok(match code {
            1 => Self::CycleWaveform,
            2 => Self::DumpCapture,
            3 => Self::StepPhase,
            4 => Self::AnalyzeCapture,
            other => return Err(other),
        })
    }
}

/// Key edge detection and the state stepped by key presses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Keys {
    old: u8,
    waveform: Waveform,
    phase: u16,
}

impl Keys {
    /// Feed one scan result.
    ///
    /// Codes are compared bitwise with the previous scan and only newly set
    /// bits count as a press.
    ///
    /// # Returns
    /// The action of a new press, if any.
    pub fn scan(&mut self, value: u8) -> Option<Action> {
        let down = value & (self.old ^ value);
        self.old = value;
        Action::try_from(down).ok()
    }

    /// Advance the waveform cycle.
    pub fn next_waveform(&mut self) -> Waveform {
        self.waveform = self.waveform.next();
        self.waveform
    }

    /// Advance the phase by [`PHASE_STEP`], wrapping to zero at 360.
    pub fn next_phase(&mut self) -> u16 {
        self.phase += PHASE_STEP;
        if self.phase >= 360 {
            self.phase = 0;
        }
        self.phase
    }
}
