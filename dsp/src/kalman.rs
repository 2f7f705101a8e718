use serde::{Deserialize, Serialize};

/// Noise and initialization parameters of a scalar Kalman filter.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KalmanConfig {
    /// Process noise variance `Q`.
    pub process_noise: f32,
    /// Measurement noise variance `R`.
    pub measurement_noise: f32,
    /// Covariance `p` assigned on (re-)initialization.
    pub initial_covariance: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.03445,
            measurement_noise: 0.07,
            initial_covariance: 0.01,
        }
    }
}

/// Scalar Kalman filter for a random walk observed in white noise.
///
/// State transition and observation coefficients are both unity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kalman {
    // estimate
    x: f32,
    // estimate covariance
    p: f32,
    q: f32,
    r: f32,
    // last gain
    k: f32,
}

impl Kalman {
    const A: f32 = 1.0;
    const H: f32 = 1.0;

    pub fn new(x: f32, config: &KalmanConfig) -> Self {
        Self {
            x,
            p: config.initial_covariance,
            q: config.process_noise,
            r: config.measurement_noise,
            k: 0.0,
        }
    }

    /// Restart from a new estimate and covariance.
    pub fn reset(&mut self, x: f32, p: f32) {
        self.x = x;
        self.p = p;
        self.k = 0.0;
    }

    /// Predict and correct with a measurement.
    ///
    /// # Args
    /// * `z` - Measurement.
    ///
    /// # Returns
    /// Updated estimate.
    pub fn update(&mut self, z: f32) -> f32 {
        let x = Self::A * self.x;
        let p = Self::A * Self::A * self.p + self.q;
        self.k = p * Self::H / (p * Self::H * Self::H + self.r);
        self.x = x + self.k * (z - Self::H * x);
        self.p = (1.0 - self.k * Self::H) * p;
        self.x
    }

    pub fn estimate(&self) -> f32 {
        self.x
    }

    pub fn covariance(&self) -> f32 {
        self.p
    }

    pub fn gain(&self) -> f32 {
        self.k
    }
}

/// A bank of independent scalar filters sharing a source selector.
///
/// Whenever the selector differs from the one seen on the previous update,
/// all filters restart from the new measurement. This drops stale estimates
/// when the tracked source is switched.
#[derive(Copy, Clone, Debug)]
pub struct KalmanBank<const N: usize> {
    filters: [Kalman; N],
    config: KalmanConfig,
    selector: Option<u8>,
}

impl<const N: usize> KalmanBank<N> {
    pub fn new(config: KalmanConfig) -> Self {
        Self {
            filters: [Kalman::new(0.0, &config); N],
            config,
            selector: None,
        }
    }

    /// Filter a measurement.
    ///
    /// # Args
    /// * `selector` - Current source selector.
    /// * `index` - Filter index.
    /// * `z` - Measurement.
    ///
    /// # Returns
    /// The estimate, `z` itself right after a selector change, or `None`
    /// for an invalid index.
    pub fn update(
        &mut self,
        selector: u8,
        index: usize,
        z: f32,
    ) -> Option<f32> {
        if index >= N {
            return None;
        }
        if self.selector != Some(selector) {
            self.selector = Some(selector);
            for filter in self.filters.iter_mut() {
                filter.reset(z, self.config.initial_covariance);
            }
            return Some(z);
        }
        Some(self.filters[index].update(z))
    }

    pub fn filter(&self, index: usize) -> Option<&Kalman> {
        self.filters.get(index)
    }
}
