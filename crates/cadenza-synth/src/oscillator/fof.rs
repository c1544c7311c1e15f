//! FOF (formant wave function) oscillator.
//!
//! A pulse accumulator runs at the oscillator pitch. Every time it crosses an
//! integer a grain is launched: a one-shot read of the wave table at the
//! grain rate, with the table frame, crossfade and stereo gains captured at
//! launch. All active grains are summed into the output.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::Fixed64;

use super::OscCommon;
use crate::envelope::EnvelopeParams;
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::modulation::ModulatedParam;
use crate::origin::OriginAligned;
use crate::wavetable::{MultiWaveTable, WaveTable};

/// Grains advancing slower than this (table samples per output sample) are
/// never launched.
pub const MIN_GRAIN_DIFFERENTIAL: f64 = 1.0 / 65536.0;

/// What happens to sounding grains when a new one launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FofCompression {
    /// Grains overlap.
    #[default]
    Overlap,
    /// Earlier grains are cut off.
    Discard,
}

/// What happens when a grain reaches the end of its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FofExpansion {
    /// The grain ends, leaving silence until the next launch.
    #[default]
    SilenceFill,
    /// The newest grain loops; older grains end.
    Loop,
}

#[derive(Debug, Clone)]
struct Grain {
    table: Arc<WaveTable>,
    frame: usize,
    weight: f32,
    gains: [f32; 2],
    phase: Fixed64,
    differential: Fixed64,
}

/// Pitch-synchronous grain oscillator.
#[derive(Debug)]
pub struct FofOscillator {
    tables: Arc<MultiWaveTable>,
    table: Option<Arc<WaveTable>>,
    rate: ModulatedParam,
    rate_hz: f64,
    compression: FofCompression,
    expansion: FofExpansion,
    sample_rate: f64,
    pulse: Fixed64,
    pulse_increment: Fixed64,
    frame: usize,
    weight: f32,
    launching: bool,
    grains: Vec<Grain>,
}

impl FofOscillator {
    pub(super) fn new(
        tables: &Arc<MultiWaveTable>,
        rate: ModulatedParam,
        compression: FofCompression,
        expansion: FofExpansion,
        pitch_hz: f64,
        sample_rate: f64,
    ) -> Self {
        let rate_hz = rate.initial_value();
        Self {
            tables: Arc::clone(tables),
            table: tables.select(pitch_hz).cloned(),
            rate,
            rate_hz,
            compression,
            expansion,
            sample_rate,
            pulse: Fixed64::ZERO,
            pulse_increment: Fixed64::ZERO,
            frame: 0,
            weight: 0.0,
            launching: false,
            grains: Vec::new(),
        }
    }

    pub(super) fn update(&mut self, common: &OscCommon, host: &dyn FormulaHost) -> Result<()> {
        let pitch = common.pitch_hz();
        self.rate_hz = self.rate.update(pitch, host)?;
        self.table = self.tables.select(pitch).cloned();
        if let Some(table) = &self.table {
            (self.frame, self.weight) = table.blend(common.index());
        }
        self.pulse_increment = Fixed64::from_f64(pitch.max(0.0) / self.sample_rate);
        self.launching = !common.loudness_at_end();
        Ok(())
    }

    pub(super) fn generate(&mut self, common: &OscCommon, left: &mut [f32], right: &mut [f32]) {
        let gains = common.gains();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.pulse += self.pulse_increment;
            if self.pulse.int_part() >= 1 {
                self.pulse = self.pulse.fraction_only();
                if self.launching {
                    self.launch(gains);
                }
            }
            let (sum_l, sum_r) = self.sum_grains();
            *l += sum_l;
            *r += sum_r;
        }
    }

    fn launch(&mut self, gains: [f32; 2]) {
        let Some(table) = &self.table else {
            return;
        };
        if self.compression == FofCompression::Discard {
            self.grains.clear();
        }
        let differential = table.frame_len() as f64 * self.rate_hz / self.sample_rate;
        if differential.is_nan() || differential < MIN_GRAIN_DIFFERENTIAL {
            return;
        }
        self.grains.push(Grain {
            table: Arc::clone(table),
            frame: self.frame,
            weight: self.weight,
            gains,
            phase: Fixed64::ZERO,
            differential: Fixed64::from_f64(differential),
        });
    }

    fn sum_grains(&mut self) -> (f32, f32) {
        let newest = self.grains.len().wrapping_sub(1);
        let expansion = self.expansion;
        let mut position = 0;
        let mut sum = (0.0, 0.0);
        self.grains.retain_mut(|grain| {
            let is_newest = position == newest;
            position += 1;
            let s = grain.table.sample_blended(grain.frame, grain.weight, grain.phase);
            sum.0 += s * grain.gains[0];
            sum.1 += s * grain.gains[1];
            grain.phase += grain.differential;
            let len = grain.table.frame_len() as u32;
            if grain.phase.int_part() as u32 >= len {
                if expansion == FofExpansion::Loop && is_newest {
                    grain.phase = grain.phase.wrap_int(len);
                } else {
                    return false;
                }
            }
            true
        });
        sum
    }

    pub(super) fn key_up_sustain(&mut self, index: usize) {
        self.rate.key_up_sustain(index);
    }

    pub(super) fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        self.rate.retrigger_from_origin(params, host)
    }

    pub(super) fn pre_origin_ticks(&self) -> u32 {
        self.rate.pre_origin_ticks()
    }

    pub(super) fn fix_origin(&mut self, max_pre_origin: u32) {
        self.rate.fix_origin(max_pre_origin);
    }

    pub(super) fn is_finished(&self, loudness_done: bool) -> bool {
        self.table.is_none() || (self.grains.is_empty() && loudness_done)
    }

    /// Number of sounding grains.
    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{held, note, synth};
    use super::super::{Oscillator, OscillatorSource, OscillatorSpec, OscillatorTemplate, OscillatorKind};
    use super::*;
    use crate::context::SynthParams;
    use crate::envelope::{EnvelopePhase, EnvelopeSpec};
    use crate::modulation::ModulatedSpec;
    use crate::pluggable::PluggableRegistry;
    use crate::wavetable::WaveLibrary;

    fn library() -> WaveLibrary {
        let mut library = WaveLibrary::new();
        library.insert_wave_table(
            "grain",
            MultiWaveTable::single(WaveTable::single(vec![1.0; 8]).unwrap()),
        );
        library
    }

    fn fof(
        synth: &SynthParams,
        rate: f64,
        loudness: ModulatedSpec,
        compression: FofCompression,
        expansion: FofExpansion,
    ) -> Oscillator {
        let spec = OscillatorSpec {
            loudness,
            ..OscillatorSpec::new(OscillatorSource::Fof {
                table: "grain".into(),
                rate: ModulatedSpec::constant(rate),
                compression,
                expansion,
            })
        };
        OscillatorTemplate::new(&spec, &library(), &PluggableRegistry::new(), synth.host())
            .unwrap()
            .instantiate(&note(69.0), synth)
            .unwrap()
            .align(0)
    }

    fn grains(osc: &Oscillator) -> usize {
        match osc.kind() {
            OscillatorKind::Fof(f) => f.grain_count(),
            _ => unreachable!(),
        }
    }

    fn run(osc: &mut Oscillator, synth: &SynthParams, pitch: f64, len: usize) -> Vec<f32> {
        osc.update_envelopes(pitch, synth.host()).unwrap();
        let mut left = vec![0.0f32; len];
        let mut right = vec![0.0f32; len];
        osc.generate(&mut left, &mut right, synth).unwrap();
        left
    }

    #[test]
    fn grains_launch_once_per_period_and_end() {
        let synth = synth();
        // 1000 Hz at 8 kHz launches every 8 samples; 8-sample grain at 2000 Hz
        // rate lasts 4 samples
        let mut osc = fof(&synth, 2000.0, held(), FofCompression::Overlap, FofExpansion::SilenceFill);
        let out = run(&mut osc, &synth, 1000.0, 16);
        let sounding: Vec<bool> = out.iter().map(|&x| x != 0.0).collect();
        assert_eq!(&sounding[..8], &[false, false, false, false, false, false, false, true]);
        assert_eq!(&sounding[8..12], &[true, true, true, false]);
        assert!(sounding[15]);
        assert_eq!(out[7], 0.5);
    }

    #[test]
    fn overlap_sums_and_discard_cuts() {
        let synth = synth();
        // grain lasts 16 samples, one launch every 8
        let mut overlap = fof(&synth, 500.0, held(), FofCompression::Overlap, FofExpansion::SilenceFill);
        let out = run(&mut overlap, &synth, 1000.0, 24);
        assert_eq!(out[16], 1.0);
        assert_eq!(grains(&overlap), 2);

        let mut discard = fof(&synth, 500.0, held(), FofCompression::Discard, FofExpansion::SilenceFill);
        let out = run(&mut discard, &synth, 1000.0, 24);
        assert_eq!(out[16], 0.5);
        assert_eq!(grains(&discard), 1);
    }

    #[test]
    fn loop_keeps_only_the_newest_grain() {
        let synth = synth();
        // grain lasts 2 samples, period is 8: a looping grain fills the gaps
        let mut osc = fof(&synth, 8000.0, held(), FofCompression::Overlap, FofExpansion::Loop);
        let out = run(&mut osc, &synth, 1000.0, 32);
        assert!(out[7..15].iter().all(|&x| x == 0.5));
        // the retiring grain still sounds on the launch sample
        assert_eq!(out[15], 1.0);
        assert!(out[16..23].iter().all(|&x| x == 0.5));
        assert_eq!(grains(&osc), 1);
    }

    #[test]
    fn zero_rate_grains_are_never_launched() {
        let synth = synth();
        let loudness = ModulatedSpec::envelope(EnvelopeSpec::with_phases(
            1.0,
            vec![EnvelopePhase::linear(0.02, 0.0)],
        ));
        let mut osc = fof(&synth, 0.0, loudness, FofCompression::Overlap, FofExpansion::SilenceFill);
        let out = run(&mut osc, &synth, 1000.0, 80);
        assert!(out.iter().all(|&x| x == 0.0));
        assert_eq!(grains(&osc), 0);
        assert!(!osc.is_finished());
        run(&mut osc, &synth, 1000.0, 80);
        assert!(osc.is_finished());
    }

    #[test]
    fn finished_waits_for_grains_after_loudness_ends() {
        let synth = synth();
        let loudness = ModulatedSpec::envelope(EnvelopeSpec::with_phases(
            1.0,
            vec![EnvelopePhase::linear(0.01, 1.0)],
        ));
        // grain lasts 16 samples
        let mut osc = fof(&synth, 500.0, loudness, FofCompression::Overlap, FofExpansion::SilenceFill);
        // tick 1: loudness ends on this update, so nothing launches
        run(&mut osc, &synth, 1000.0, 8);
        assert!(osc.is_finished());

        let loudness = ModulatedSpec::envelope(EnvelopeSpec::with_phases(
            1.0,
            vec![EnvelopePhase::linear(0.02, 1.0)],
        ));
        let mut osc = fof(&synth, 500.0, loudness, FofCompression::Overlap, FofExpansion::SilenceFill);
        run(&mut osc, &synth, 1000.0, 8);
        assert_eq!(grains(&osc), 1);
        run(&mut osc, &synth, 1000.0, 4);
        assert_eq!(grains(&osc), 1);
        assert!(!osc.is_finished());
        run(&mut osc, &synth, 1000.0, 16);
        assert_eq!(grains(&osc), 0);
        assert!(osc.is_finished());
    }
}
