//! One-pole (6 dB/octave) lowpass and highpass.
//!
//! ```text
//! lp[n] = x[n] + coeff * (lp[n-1] - x[n])
//! hp[n] = x[n] - lp[n]
//! ```
//!
//! where `coeff = exp(-2π * freq / sample_rate)`.

use crate::flush_denormal;
use libm::exp;

/// Response of a [`OnePole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnePoleMode {
    /// Attenuates above the cutoff.
    Lowpass,
    /// Attenuates below the cutoff.
    Highpass,
}

/// One-pole filter with a lowpass core and optional highpass tap.
///
/// # Invariants
///
/// - `coeff` is in `[0, 1]` for any non-negative cutoff
/// - `state` is flushed to zero below `1e-20`
#[derive(Debug, Clone)]
pub struct OnePole {
    mode: OnePoleMode,
    state: f32,
    coeff: f32,
    sample_rate: f64,
    freq: f64,
}

impl OnePole {
    /// Creates a filter at `freq_hz`.
    pub fn new(mode: OnePoleMode, sample_rate: f64, freq_hz: f64) -> Self {
        let mut filter = Self {
            mode,
            state: 0.0,
            coeff: 0.0,
            sample_rate,
            freq: freq_hz,
        };
        filter.recalculate_coeff();
        filter
    }

    /// Moves the cutoff. Unchanged frequencies skip the `exp`.
    pub fn set_frequency(&mut self, freq_hz: f64) {
        if freq_hz != self.freq {
            self.freq = freq_hz;
            self.recalculate_coeff();
        }
    }

    /// Current cutoff in Hz.
    pub fn frequency(&self) -> f64 {
        self.freq
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(input + self.coeff * (self.state - input));
        match self.mode {
            OnePoleMode::Lowpass => self.state,
            OnePoleMode::Highpass => input - self.state,
        }
    }

    /// Clears filter history.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn recalculate_coeff(&mut self) {
        let freq = self.freq.clamp(0.0, self.sample_rate / 2.0);
        self.coeff = exp(-core::f64::consts::TAU * freq / self.sample_rate) as f32;
    }
}
