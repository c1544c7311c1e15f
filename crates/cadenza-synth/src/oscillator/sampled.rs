//! Sampled oscillator with optional sustain loop.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::Fixed64;

use super::OscCommon;
use crate::wavetable::Sample;

/// Plays a recorded sample transposed to the oscillator pitch.
///
/// A sample with a loop range keeps cycling through it until the first
/// sustain point is released, then plays on to the end of the data.
#[derive(Debug)]
pub struct SampledOscillator {
    sample: Arc<Sample>,
    sample_rate: f64,
    position: Fixed64,
    increment: Fixed64,
    looping: bool,
    exhausted: bool,
}

impl SampledOscillator {
    pub(super) fn new(sample: &Arc<Sample>, sample_rate: f64) -> Self {
        Self {
            looping: sample.loop_range.is_some(),
            sample: Arc::clone(sample),
            sample_rate,
            position: Fixed64::ZERO,
            increment: Fixed64::ZERO,
            exhausted: false,
        }
    }

    pub(super) fn update(&mut self, common: &OscCommon) {
        let ratio = common.pitch_hz() / self.sample.root_hz * self.sample.sample_rate / self.sample_rate;
        self.increment = Fixed64::from_f64(ratio.max(0.0));
    }

    pub(super) fn generate(&mut self, out: &mut [f32]) {
        let data = &self.sample.data;
        let loop_range = if self.looping { self.sample.loop_range } else { None };
        for x in out.iter_mut() {
            let i = self.position.int_part().max(0) as usize;
            if i >= data.len() {
                self.exhausted = true;
                return;
            }
            let next = match loop_range {
                Some((start, end)) if i + 1 == end => data[start],
                _ => data.get(i + 1).copied().unwrap_or(0.0),
            };
            let t = self.position.frac_f64() as f32;
            *x = data[i] + (next - data[i]) * t;
            self.position += self.increment;
            if let Some((start, end)) = loop_range {
                let span = (end - start) as i32;
                while self.position.int_part() >= end as i32 {
                    self.position = self.position.sub_int(span);
                }
            }
        }
    }

    pub(super) fn key_up_sustain(&mut self, index: usize) {
        if index == 0 {
            self.looping = false;
        }
    }

    /// True once playback has run off the end of the data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
