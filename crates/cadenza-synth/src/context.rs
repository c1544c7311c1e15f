//! Engine settings and the runtime context shared by every component.

#[cfg(not(feature = "std"))]
use alloc::{format, sync::Arc};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::{RoundingCarry, ScratchBuffer, ScratchPool};

use crate::error::{Result, SynthError};
use crate::formula::FormulaHost;

/// Static engine configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SynthSettings {
    /// Base (output) sample rate in Hz.
    pub sample_rate: f64,
    /// Envelope ticks per second.
    pub envelope_rate: f64,
    /// Processing rate multiplier (1 = no oversampling).
    pub oversampling: u32,
    /// Ramp oscillator gains across each tick's block.
    pub interpolate_intra_tick: bool,
    /// Ramp filter output multipliers when they change.
    pub smooth_outputs: bool,
    /// Tempo handed to pluggable processors.
    pub tempo_bpm: f64,
    /// Number of scratch regions in the pool.
    pub scratch_slots: usize,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            envelope_rate: 400.0,
            oversampling: 1,
            interpolate_intra_tick: true,
            smooth_outputs: true,
            tempo_bpm: 120.0,
            scratch_slots: 16,
        }
    }
}

impl SynthSettings {
    /// Checks the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate <= 0.0 || !self.sample_rate.is_finite() {
            return Err(SynthError::invalid_template(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.envelope_rate.is_nan()
            || self.envelope_rate <= 0.0
            || self.envelope_rate > self.sample_rate
        {
            return Err(SynthError::invalid_template(format!(
                "envelope rate must be in (0, {}], got {}",
                self.sample_rate, self.envelope_rate
            )));
        }
        if self.oversampling == 0 {
            return Err(SynthError::invalid_template("oversampling factor must be at least 1"));
        }
        if self.scratch_slots == 0 {
            return Err(SynthError::invalid_template("scratch pool needs at least one slot"));
        }
        Ok(())
    }
}

/// Runtime context: rates, the formula host, the scratch pool, and the
/// transport clock.
pub struct SynthParams {
    settings: SynthSettings,
    host: Arc<dyn FormulaHost>,
    scratch: ScratchPool,
    elapsed_seconds: f64,
}

impl SynthParams {
    /// Builds a context after validating `settings`.
    pub fn new(settings: SynthSettings, host: Arc<dyn FormulaHost>) -> Result<Self> {
        settings.validate()?;
        let block_len = max_block_len(&settings);
        Ok(Self {
            scratch: ScratchPool::new(settings.scratch_slots, block_len),
            settings,
            host,
            elapsed_seconds: 0.0,
        })
    }

    /// Settings this context was built from.
    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    /// Processing sample rate (base rate times oversampling).
    pub fn sample_rate(&self) -> f64 {
        self.settings.sample_rate * f64::from(self.settings.oversampling)
    }

    /// Base (output) sample rate.
    pub fn base_sample_rate(&self) -> f64 {
        self.settings.sample_rate
    }

    /// Oversampling factor.
    pub fn oversampling(&self) -> usize {
        self.settings.oversampling as usize
    }

    /// Envelope ticks per second.
    pub fn envelope_rate(&self) -> f64 {
        self.settings.envelope_rate
    }

    /// Longest block a single tick can produce at the processing rate.
    pub fn max_block_len(&self) -> usize {
        max_block_len(&self.settings)
    }

    /// Whether oscillator gains ramp within a tick.
    pub fn interpolate_intra_tick(&self) -> bool {
        self.settings.interpolate_intra_tick
    }

    /// Whether filter output multipliers are smoothed.
    pub fn smooth_outputs(&self) -> bool {
        self.settings.smooth_outputs
    }

    /// Tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        self.settings.tempo_bpm
    }

    /// Changes the tempo.
    pub fn set_tempo(&mut self, bpm: f64) {
        self.settings.tempo_bpm = bpm;
    }

    /// Seconds since the transport started.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Advances the transport by one envelope tick.
    pub fn advance_tick(&mut self) {
        self.elapsed_seconds += 1.0 / self.settings.envelope_rate;
    }

    /// The formula evaluator.
    pub fn host(&self) -> &dyn FormulaHost {
        self.host.as_ref()
    }

    /// Shared handle to the formula evaluator.
    pub fn host_handle(&self) -> Arc<dyn FormulaHost> {
        Arc::clone(&self.host)
    }

    /// The scratch pool.
    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }

    /// Borrows a zeroed scratch region of `len` samples.
    pub fn acquire(&self, len: usize) -> Result<ScratchBuffer<'_>> {
        self.scratch.acquire(len).ok_or(SynthError::ScratchExhausted)
    }

    /// A clock producing per-tick block lengths for this context.
    pub fn block_clock(&self) -> BlockClock {
        BlockClock::new(self.settings.sample_rate / self.settings.envelope_rate, self.oversampling())
    }
}

impl core::fmt::Debug for SynthParams {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SynthParams")
            .field("settings", &self.settings)
            .field("elapsed_seconds", &self.elapsed_seconds)
            .finish_non_exhaustive()
    }
}

fn max_block_len(settings: &SynthSettings) -> usize {
    let per_tick = libm::ceil(settings.sample_rate / settings.envelope_rate) as usize + 1;
    per_tick * settings.oversampling.max(1) as usize
}

/// Splits a fractional samples-per-tick ratio into whole per-tick blocks.
///
/// Lengths are rounded at the base rate with a carried residual and then
/// multiplied by the oversampling factor, so every block divides evenly for
/// processors running at the base rate.
#[derive(Debug, Clone)]
pub struct BlockClock {
    base_samples_per_tick: f64,
    oversampling: usize,
    carry: RoundingCarry,
}

impl BlockClock {
    /// Creates a clock.
    pub fn new(base_samples_per_tick: f64, oversampling: usize) -> Self {
        Self {
            base_samples_per_tick,
            oversampling: oversampling.max(1),
            carry: RoundingCarry::new(),
        }
    }

    /// Length of the next tick's block at the processing rate.
    pub fn next_len(&mut self) -> usize {
        let base = self.carry.round(self.base_samples_per_tick).max(0) as usize;
        base * self.oversampling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FunctionTable;

    #[test]
    fn rejects_bad_settings() {
        let host: Arc<dyn FormulaHost> = Arc::new(FunctionTable::new());
        let settings = SynthSettings {
            envelope_rate: 0.0,
            ..SynthSettings::default()
        };
        assert!(SynthParams::new(settings, Arc::clone(&host)).is_err());
        let settings = SynthSettings {
            oversampling: 0,
            ..SynthSettings::default()
        };
        assert!(SynthParams::new(settings, host).is_err());
    }

    #[test]
    fn block_clock_tracks_fractional_rate() {
        let mut clock = BlockClock::new(110.25, 2);
        let total: usize = (0..4).map(|_| clock.next_len()).sum();
        assert_eq!(total, 882);
    }

    #[test]
    fn rates_and_scratch() {
        let settings = SynthSettings {
            oversampling: 2,
            ..SynthSettings::default()
        };
        let params = SynthParams::new(settings, Arc::new(FunctionTable::new())).unwrap();
        assert_eq!(params.sample_rate(), 88200.0);
        assert!(params.max_block_len() >= 2 * 111);
        let buf = params.acquire(params.max_block_len()).unwrap();
        assert_eq!(buf.len(), params.max_block_len());
    }
}
