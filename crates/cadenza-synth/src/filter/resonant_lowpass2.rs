//! Cascaded Butterworth lowpass with a resonant final section.
//!
//! Order 2, 4 or 6 maps to 1, 2 or 3 biquad sections. Section `k` of an
//! order-`N` Butterworth prototype has
//!
//! ```text
//! Q_k = 1 / (2 sin((2k + 1) π / (2N)))
//! ```
//!
//! Sections run in ascending Q so the peakiest one comes last; resonance
//! multiplies that final Q.
//!
//! # Broken mode
//!
//! Older instruments were rendered with every section reading the raw input
//! instead of the previous section's output, so only the final section was
//! audible. `broken = true` reproduces that sound exactly.

#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};

use cadenza_core::{Biquad, BiquadCoefficients};
use core::f64::consts::PI;
use libm::sin;

use crate::error::{Result, SynthError};

/// Multi-section resonant lowpass.
#[derive(Debug, Clone)]
pub struct ResonantLowpass2 {
    sections: Vec<Biquad>,
    coefficients: Vec<BiquadCoefficients>,
    prototype_q: Vec<f64>,
    broken: bool,
    sample_rate: f64,
    old_cutoff: f64,
    old_q: f64,
}

impl ResonantLowpass2 {
    /// Creates a filter of `order` (2, 4 or 6).
    pub fn new(order: u32, broken: bool, sample_rate: f64) -> Result<Self> {
        if !matches!(order, 2 | 4 | 6) {
            return Err(SynthError::invalid_template(format!(
                "resonant lowpass order must be 2, 4 or 6, got {order}"
            )));
        }
        let prototype_q = butterworth_qs(order);
        let count = prototype_q.len();
        Ok(Self {
            sections: (0..count).map(|_| Biquad::new()).collect(),
            coefficients: vec_identity(count),
            prototype_q,
            broken,
            sample_rate,
            old_cutoff: f64::NAN,
            old_q: f64::NAN,
        })
    }

    /// Retunes the sections. Unchanged `(cutoff, resonance)` pairs skip the
    /// design step.
    pub fn set_params(&mut self, cutoff: f64, resonance: f64) {
        let cutoff = cutoff.clamp(1.0, self.sample_rate * 0.49);
        let q = resonance.max(1e-3);
        if cutoff == self.old_cutoff && q == self.old_q {
            return;
        }
        self.old_cutoff = cutoff;
        self.old_q = q;
        let last = self.prototype_q.len() - 1;
        for (k, section) in self.sections.iter_mut().enumerate() {
            let section_q = if k == last {
                self.prototype_q[k] * q
            } else {
                self.prototype_q[k]
            };
            let c = BiquadCoefficients::lowpass(cutoff, section_q, self.sample_rate);
            section.set_coefficients(&c);
            self.coefficients[k] = c;
        }
    }

    /// Processes one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.broken {
            let mut out = input;
            for section in &mut self.sections {
                out = section.process(input);
            }
            out
        } else {
            self.sections.iter_mut().fold(input, |x, s| s.process(x))
        }
    }

    /// Processes a block.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x);
        }
    }

    /// Current coefficients of every section, lowest Q first.
    pub fn section_coefficients(&self) -> &[BiquadCoefficients] {
        &self.coefficients
    }

    /// Whether the legacy unchained mode is on.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Clears every section's history.
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.clear();
        }
    }
}

fn vec_identity(count: usize) -> Vec<BiquadCoefficients> {
    core::iter::repeat_n(BiquadCoefficients::IDENTITY, count).collect()
}

/// Butterworth section Qs for an even `order`, ascending.
pub fn butterworth_qs(order: u32) -> Vec<f64> {
    let n = f64::from(order);
    let mut qs: Vec<f64> = (0..order / 2)
        .map(|k| 1.0 / (2.0 * sin(f64::from(2 * k + 1) * PI / (2.0 * n))))
        .collect();
    qs.sort_by(f64::total_cmp);
    qs
}
