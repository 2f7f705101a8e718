use serde::{Deserialize, Serialize};

/// Proportional, integral and derivative gains.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl Gains {
    pub const fn new(p: f32, i: f32, d: f32) -> Self {
        Self { p, i, d }
    }
}

/// A closed loop regulator driving a measurement towards a setpoint.
pub trait Controller {
    /// Run one control step.
    ///
    /// # Args
    /// * `measurement` - Current value of the controlled quantity.
    ///
    /// # Returns
    /// The new actuator output.
    fn update(&mut self, measurement: f32) -> f32;

    fn setpoint(&self) -> f32;

    fn set_setpoint(&mut self, setpoint: f32);

    /// Clear the error history and accumulated state.
    fn reset(&mut self);
}

/// Incremental (velocity form) PID.
///
/// Each step adds
/// `Kp (e - e1) + Ki e + Kd (e - 2 e1 + e2)`
/// to the accumulated output, which is then clamped to `[min, max]`.
/// Clamping the accumulator bounds the integral action as well.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incremental {
    gains: Gains,
    setpoint: f32,
    min: f32,
    max: f32,
    output: f32,
    // error history, most recent first
    e1: f32,
    e2: f32,
}

impl Incremental {
    /// Create a controller starting from `min`.
    pub fn new(gains: Gains, setpoint: f32, min: f32, max: f32) -> Self {
        debug_assert!(min <= max);
        Self {
            gains,
            setpoint,
            min,
            max,
            output: min,
            e1: 0.0,
            e2: 0.0,
        }
    }

    pub fn output(&self) -> f32 {
        self.output
    }
}

impl Controller for Incremental {
    fn update(&mut self, measurement: f32) -> f32 {
        let e = self.setpoint - measurement;
        let g = &self.gains;
        let delta = g.p * (e - self.e1)
            + g.i * e
            + g.d * (e - 2.0 * self.e1 + self.e2);
        self.output = (self.output + delta).clamp(self.min, self.max);
        self.e2 = self.e1;
        self.e1 = e;
        self.output
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    fn reset(&mut self) {
        self.output = self.min;
        self.e1 = 0.0;
        self.e2 = 0.0;
    }
}

/// Positional PID with a clamped integral.
///
/// `u = Kp e + I + Kd (e - e1)` with `I = clamp(I + Ki e, -max_integral,
/// max_integral)`, then clamped to `[min, max]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Positional {
    gains: Gains,
    setpoint: f32,
    min: f32,
    max: f32,
    max_integral: f32,
    integral: f32,
    e1: f32,
}

impl Positional {
    pub fn new(
        gains: Gains,
        setpoint: f32,
        min: f32,
        max: f32,
        max_integral: f32,
    ) -> Self {
        debug_assert!(min <= max && max_integral >= 0.0);
        Self {
            gains,
            setpoint,
            min,
            max,
            max_integral,
            integral: 0.0,
            e1: 0.0,
        }
    }

    /// Accumulated integral term.
    pub fn integral(&self) -> f32 {
        self.integral
    }
}

impl Controller for Positional {
    fn update(&mut self, measurement: f32) -> f32 {
        let e = self.setpoint - measurement;
        self.integral = (self.integral + self.gains.i * e)
            .clamp(-self.max_integral, self.max_integral);
        let u = self.gains.p * e
            + self.integral
            + self.gains.d * (e - self.e1);
        self.e1 = e;
        u.clamp(self.min, self.max)
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.e1 = 0.0;
    }
}

/// Error driven PID for the frequency tracking loop.
///
/// Unlike [`Controller`] implementors it takes the error directly and
/// returns an unbounded correction. The integral is clamped to
/// `[-max_integral, max_integral]` before it is added.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    gains: Gains,
    max_integral: f32,
    integral: f32,
    e1: f32,
}

impl Tracking {
    pub fn new(gains: Gains, max_integral: f32) -> Self {
        Self {
            gains,
            max_integral,
            integral: 0.0,
            e1: 0.0,
        }
    }

    /// Run one step.
    ///
    /// # Args
    /// * `error` - Control error.
    ///
    /// # Returns
    /// Correction `Kp e + I + Kd (e - e1)`.
    pub fn update(&mut self, error: f32) -> f32 {
        self.integral = (self.integral + self.gains.i * error)
            .clamp(-self.max_integral, self.max_integral);
        let derivative = self.gains.d * (error - self.e1);
        self.e1 = error;
        self.gains.p * error + self.integral + derivative
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.e1 = 0.0;
    }
}
