use core::f32::consts::{PI, TAU};

use super::{fft, interleaved, Complex, Window, WindowKind};

/// Transform length of the spectral analysis.
pub const FFT_LEN: usize = 1024;

/// Lowest bin considered when searching for the fundamental. Bins below are
/// dominated by DC leakage.
pub const FUNDAMENTAL_SEARCH_START: usize = 3;

/// Windowed single-sided magnitude spectrum of one channel.
///
/// The complex bins of the last transform are retained for phase
/// extraction. The spectrum is `ready` once [`Spectrum::compute`] has run
/// and until [`Spectrum::invalidate`] is called.
#[derive(Clone)]
pub struct Spectrum {
    window: Window<FFT_LEN>,
    bins: [Complex<f32>; FFT_LEN],
    magnitude: [f32; FFT_LEN],
    ready: bool,
}

impl Spectrum {
    pub fn new(window: WindowKind) -> Self {
        Self {
            window: Window::new(window),
            bins: [Complex::default(); FFT_LEN],
            magnitude: [0.0; FFT_LEN],
            ready: false,
        }
    }

    /// Rebuild the analysis window.
    pub fn set_window(&mut self, kind: WindowKind) {
        if self.window.kind() != kind {
            self.window = Window::new(kind);
        }
    }

    pub fn window(&self) -> &Window<FFT_LEN> {
        &self.window
    }

    /// Compute the magnitude spectrum of a block of samples.
    ///
    /// At most [`FFT_LEN`] samples are consumed. Shorter inputs are zero
    /// padded, which broadens peaks but is otherwise harmless.
    ///
    /// Magnitudes are scaled such that a sinusoid of amplitude `A` yields
    /// `A` in its bin and a constant offset `c` yields `c` in bin 0, with the
    /// window energy compensated.
    ///
    /// # Args
    /// * `samples` - Time domain samples.
    pub fn compute<I: IntoIterator<Item = f32>>(&mut self, samples: I) {
        self.bins = [Complex::default(); FFT_LEN];
        for ((bin, x), w) in self
            .bins
            .iter_mut()
            .zip(samples)
            .zip(self.window.coefficients().iter())
        {
            *bin = Complex(x * w, 0.0);
        }

        fft(&mut self.bins);

        let compensation = self.window.compensation();
        let dc = compensation / FFT_LEN as f32;
        let ac = 2.0 * dc;
        for (i, (m, bin)) in
            self.magnitude.iter_mut().zip(self.bins.iter()).enumerate()
        {
            *m = bin.abs() * if i == 0 { dc } else { ac };
        }
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Mark the spectrum stale, e.g. after the acquisition was re-armed.
    pub fn invalidate(&mut self) {
        self.ready = false;
    }

    /// Scaled magnitudes. Only `[0, FFT_LEN/2)` is meaningful.
    pub fn magnitude(&self) -> &[f32; FFT_LEN] {
        &self.magnitude
    }

    /// Raw complex bins of the last transform.
    pub fn bins(&self) -> &[Complex<f32>; FFT_LEN] {
        &self.bins
    }

    /// Complex bins as interleaved `(re, im)` floats.
    pub fn interleaved(&self) -> &[f32] {
        interleaved(&self.bins)
    }

    /// Strongest bin above the DC region.
    pub fn fundamental_bin(&self) -> usize {
        fundamental_bin(&self.magnitude)
    }

    /// Phase of a bin in radians.
    pub fn phase(&self, bin: usize) -> f32 {
        self.bins[bin].arg()
    }
}

/// Find the bin of maximum magnitude in `[3, N/2)`.
///
/// Ties resolve to the lowest bin. If all magnitudes are zero, the first
/// searched bin is returned.
pub fn fundamental_bin(magnitude: &[f32]) -> usize {
    let mut max_bin = FUNDAMENTAL_SEARCH_START;
    let mut max = 0.0;
    for (bin, &m) in magnitude
        .iter()
        .enumerate()
        .take(magnitude.len() / 2)
        .skip(FUNDAMENTAL_SEARCH_START)
    {
        if m > max {
            max = m;
            max_bin = bin;
        }
    }
    max_bin
}

/// Wrap a phase into `(-pi, pi]`.
///
/// Uses repeated whole turn corrections. For differences of two principal
/// values this takes at most one iteration.
pub fn wrap_phase(mut phase: f32) -> f32 {
    if !phase.is_finite() {
        return 0.0;
    }
    while phase > PI {
        phase -= TAU;
    }
    while phase <= -PI {
        phase += TAU;
    }
    phase
}

/// Phase difference `a - b` of the fundamentals of two spectra.
///
/// Each spectrum is evaluated at its own fundamental bin.
///
/// # Returns
/// The wrapped difference in radians, or `None` if either spectrum is not
/// ready.
pub fn phase_difference(a: &Spectrum, b: &Spectrum) -> Option<f32> {
    if !(a.is_ready() && b.is_ready()) {
        return None;
    }
    let pa = a.phase(a.fundamental_bin());
    let pb = b.phase(b.fundamental_bin());
    Some(wrap_phase(pa - pb))
}
