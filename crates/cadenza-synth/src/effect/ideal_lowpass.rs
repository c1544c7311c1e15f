//! Windowed-sinc FIR lowpass.
//!
//! The impulse response is a sinc centered on the middle tap, shaped by a
//! triangular window and normalized to unity gain at DC:
//!
//! ```text
//! h[n] = w[n] · sin(2π·fc·(n − m)) / (π·(n − m))     (h[m] = 2·fc)
//! w[n] = 1 − |n − m| / (m + 1)
//! ```
//!
//! where `m = (order − 1) / 2` and `fc` is the cutoff in cycles per sample.
//! When the cutoff is at or above Nyquist, or the processing rate is below
//! the configured minimum, the filter is disabled and [`IdealLowpass::apply`]
//! leaves the block untouched.

#[cfg(not(feature = "std"))]
use alloc::{format, vec, vec::Vec};

use core::f64::consts::PI;

use crate::error::{Result, SynthError};

/// Ideal lowpass parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IdealLowpassSpec {
    /// Cutoff in Hz.
    pub cutoff: f64,
    /// Number of taps; odd and positive.
    pub order: u32,
    /// Below this processing rate the filter does nothing.
    pub min_sample_rate: f64,
}

impl Default for IdealLowpassSpec {
    fn default() -> Self {
        Self {
            cutoff: 20000.0,
            order: 31,
            min_sample_rate: 0.0,
        }
    }
}

impl IdealLowpassSpec {
    /// Rejects even or zero orders.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 || self.order % 2 == 0 {
            return Err(SynthError::invalid_template(format!(
                "ideal lowpass order must be odd and positive, got {}",
                self.order
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Delay {
    history: Vec<f32>,
    pos: usize,
}

impl Delay {
    fn process(&mut self, taps: &[f32], buf: &mut [f32]) {
        let n = self.history.len();
        for x in buf.iter_mut() {
            self.history[self.pos] = *x;
            let (older, newer) = self.history.split_at(self.pos + 1);
            // taps[0] meets the newest sample; the response is symmetric
            let mut acc = 0.0f32;
            for (t, h) in taps.iter().zip(older.iter().rev().chain(newer.iter().rev())) {
                acc += t * h;
            }
            *x = acc;
            self.pos = (self.pos + 1) % n;
        }
    }
}

/// Circular-buffer FIR lowpass, one delay line per channel.
#[derive(Debug, Clone)]
pub struct IdealLowpass {
    taps: Vec<f32>,
    channels: [Delay; 2],
    enabled: bool,
}

impl IdealLowpass {
    /// Designs the filter for `sample_rate`. `spec` must already be
    /// validated.
    pub fn new(spec: &IdealLowpassSpec, sample_rate: f64) -> Self {
        let enabled = spec.cutoff < sample_rate / 2.0 && sample_rate >= spec.min_sample_rate;
        let order = spec.order.max(1) as usize;
        let taps = if enabled {
            design(spec.cutoff / sample_rate, order)
        } else {
            Vec::new()
        };
        let delay = || Delay {
            history: vec![0.0; if enabled { order } else { 0 }],
            pos: 0,
        };
        Self {
            taps,
            channels: [delay(), delay()],
            enabled,
        }
    }

    /// Whether [`apply`](Self::apply) does anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Impulse response.
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Filters both channels in place.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32]) {
        if !self.enabled {
            return;
        }
        let [l, r] = &mut self.channels;
        l.process(&self.taps, left);
        r.process(&self.taps, right);
    }
}

fn design(fc: f64, order: usize) -> Vec<f32> {
    let m = (order - 1) / 2;
    let mut taps: Vec<f64> = (0..order)
        .map(|n| {
            let k = n as f64 - m as f64;
            let sinc = if n == m {
                2.0 * fc
            } else {
                libm::sin(2.0 * PI * fc * k) / (PI * k)
            };
            let window = 1.0 - libm::fabs(k) / (m as f64 + 1.0);
            sinc * window
        })
        .collect();
    let sum: f64 = taps.iter().sum();
    if sum != 0.0 {
        for t in &mut taps {
            *t /= sum;
        }
    }
    taps.into_iter().map(|t| t as f32).collect()
}
