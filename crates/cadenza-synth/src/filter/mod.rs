//! Unified filter array.
//!
//! A filter array is a parallel bank of filter slots. Every slot filters the
//! same input and the slot outputs are summed, each scaled by its own output
//! multiplier. Slot parameters are driven per tick either by envelopes and
//! LFOs (oscillator role) or by scalar formulas over the track's eight
//! effect accents (track role).
//!
//! ## Output smoothing
//!
//! When a slot's output multiplier changes between ticks, the change is
//! spread over the block as a per-sample ramp instead of a step. The ramp is
//! additive for linear-amplitude envelope segments and geometric for
//! decibel segments, matching the domain the envelope itself moves in.
//! Multipliers driven by a sample-and-hold LFO step on purpose and are never
//! smoothed.

mod kinds;
mod resonant_lowpass2;

pub use kinds::{Filter, FilterChannel, FilterKind, FilterParams, ParamsMask};
pub use resonant_lowpass2::{ResonantLowpass2, butterworth_qs};

#[cfg(not(feature = "std"))]
use alloc::{format, vec::Vec};

use cadenza_core::{RampMode, fill_ramp};

use crate::accent::AccentVec;
use crate::context::SynthParams;
use crate::control::{ControlSpec, ControlState, ControlTemplate};
use crate::effect::EffectRole;
use crate::envelope::EnvelopeParams;
use crate::error::{Result, SynthError};
use crate::formula::FormulaHost;
use crate::modulation::ModulatedParam;
use crate::origin::{OriginAligned, Staged};

/// One slot of a filter array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterSpec {
    /// Response.
    pub kind: FilterKind,
    /// Channels processed.
    pub channel: FilterChannel,
    /// Order for [`FilterKind::ResonantLowpass2`].
    pub order: u32,
    /// Legacy unchained mode for [`FilterKind::ResonantLowpass2`].
    pub broken: bool,
    /// Cutoff or center frequency in Hz.
    pub cutoff: ControlSpec,
    /// Bandwidth, slope, or resonance.
    pub bandwidth: ControlSpec,
    /// Gain in dB.
    pub gain: ControlSpec,
    /// Output multiplier.
    pub output: ControlSpec,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            kind: FilterKind::Null,
            channel: FilterChannel::Both,
            order: 2,
            broken: false,
            cutoff: ControlSpec::Constant(1000.0),
            bandwidth: ControlSpec::Constant(1.0),
            gain: ControlSpec::Constant(0.0),
            output: ControlSpec::Constant(1.0),
        }
    }
}

impl FilterSpec {
    /// A slot of `kind` with default controls.
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Controls read by this slot's kind followed by the output, as
    /// `(index, control)`.
    fn active_controls(&self) -> impl Iterator<Item = (usize, &ControlSpec)> {
        let mask = self.kind.params_mask();
        [
            (ParamsMask::CUTOFF, &self.cutoff),
            (ParamsMask::BANDWIDTH_OR_SLOPE, &self.bandwidth),
            (ParamsMask::GAIN, &self.gain),
            (ParamsMask::NONE, &self.output),
        ]
        .into_iter()
        .enumerate()
        .filter(move |(_, (bit, _))| mask.contains(*bit))
        .map(|(i, (_, control))| (i, control))
    }

    /// Formula names referenced by the controls this slot reads.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        self.active_controls().flat_map(|(_, c)| c.formula_names())
    }
}

const OUTPUT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
struct SlotTemplate {
    kind: FilterKind,
    channel: FilterChannel,
    order: u32,
    broken: bool,
    controls: [Option<ControlTemplate>; 4],
}

/// Resolved filter array shared across notes or owned by a track.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArrayTemplate {
    role: EffectRole,
    slots: Vec<SlotTemplate>,
}

impl FilterArrayTemplate {
    /// Resolves every slot's controls for `role`.
    ///
    /// Modulated controls need a note and are rejected in the track role;
    /// formula controls read track accents and are rejected in the
    /// oscillator role.
    pub fn new(specs: &[FilterSpec], role: EffectRole, host: &dyn FormulaHost) -> Result<Self> {
        let mut slots = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.kind == FilterKind::ResonantLowpass2 && !matches!(spec.order, 2 | 4 | 6) {
                return Err(SynthError::invalid_template(format!(
                    "resonant lowpass order must be 2, 4 or 6, got {}",
                    spec.order
                )));
            }
            let mut controls = [None, None, None, None];
            for (index, control) in spec.active_controls() {
                controls[index] = Some(ControlTemplate::new(control, role, host)?);
            }
            slots.push(SlotTemplate {
                kind: spec.kind,
                channel: spec.channel,
                order: spec.order,
                broken: spec.broken,
                controls,
            });
        }
        Ok(Self { role, slots })
    }

    /// Role the controls were resolved for.
    pub fn role(&self) -> EffectRole {
        self.role
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone)]
struct FilterSlot {
    channel: FilterChannel,
    controls: [Option<ControlState>; 4],
    left: Option<Filter>,
    right: Option<Filter>,
    params: FilterParams,
    current: f64,
    previous: f64,
    exponential: bool,
    sample_and_hold: bool,
}

impl FilterSlot {
    fn refresh(&mut self, pitch_hz: f64, accents: &AccentVec, host: &dyn FormulaHost) -> Result<()> {
        let mut values = [None; 4];
        for (value, control) in values.iter_mut().zip(&mut self.controls) {
            if let Some(control) = control {
                *value = Some(control.update(pitch_hz, accents, host)?);
            }
        }
        self.store(values);
        Ok(())
    }

    fn store(&mut self, values: [Option<f64>; 4]) {
        let [cutoff, bandwidth, gain, output] = values;
        self.params = FilterParams {
            cutoff: cutoff.unwrap_or(self.params.cutoff),
            bandwidth_or_slope: bandwidth.unwrap_or(self.params.bandwidth_or_slope),
            gain: gain.unwrap_or(self.params.gain),
        };
        if let Some(output) = output {
            self.current = output;
        }
        if let Some(m) = self.controls[OUTPUT].as_ref().and_then(ControlState::modulated) {
            self.exponential = m.is_exponential_segment();
            self.sample_and_hold = m.is_sample_and_hold();
        }
        for filter in [self.left.as_mut(), self.right.as_mut()].into_iter().flatten() {
            filter.update_params(&self.params);
        }
    }

    fn modulated(&mut self) -> impl Iterator<Item = &mut ModulatedParam> {
        self.controls
            .iter_mut()
            .filter_map(|c| c.as_mut().and_then(ControlState::modulated_mut))
    }
}

/// Per-note or per-track filter array state.
#[derive(Debug, Clone)]
pub struct FilterArray {
    slots: Vec<FilterSlot>,
}

impl FilterArray {
    /// Builds the oscillator-role state for one note.
    pub fn new_oscillator(
        template: &FilterArrayTemplate,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
        sample_rate: f64,
    ) -> Result<Staged<Self>> {
        Self::build(template, Some(params), &AccentVec::ZERO, host, sample_rate).map(Staged::new)
    }

    /// Builds the track-role state, evaluating formulas against the
    /// current effect accents.
    pub fn new_track(
        template: &FilterArrayTemplate,
        effect_accents: &AccentVec,
        host: &dyn FormulaHost,
        sample_rate: f64,
    ) -> Result<Self> {
        Self::build(template, None, effect_accents, host, sample_rate)
    }

    fn build(
        template: &FilterArrayTemplate,
        note: Option<&EnvelopeParams<'_>>,
        accents: &AccentVec,
        host: &dyn FormulaHost,
        sample_rate: f64,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(template.slots.len());
        for slot in &template.slots {
            let make = || Filter::new(slot.kind, slot.order, slot.broken, sample_rate);
            let mut controls = [None, None, None, None];
            let mut initial = [None; 4];
            for (i, control) in slot.controls.iter().enumerate() {
                let Some(control) = control else { continue };
                let (state, value) = ControlState::new(control, note, accents, host)?;
                controls[i] = Some(state);
                initial[i] = Some(value);
            }
            let mut state = FilterSlot {
                channel: slot.channel,
                controls,
                left: if slot.channel.has_left() { Some(make()?) } else { None },
                right: if slot.channel.has_right() { Some(make()?) } else { None },
                params: FilterParams::default(),
                current: 1.0,
                previous: 1.0,
                exponential: false,
                sample_and_hold: false,
            };
            state.store(initial);
            state.previous = state.current;
            slots.push(state);
        }
        Ok(Self { slots })
    }

    /// Advances envelope-driven controls one tick (oscillator role).
    pub fn osc_update(&mut self, pitch_hz: f64, host: &dyn FormulaHost) -> Result<()> {
        self.slots
            .iter_mut()
            .try_for_each(|s| s.refresh(pitch_hz, &AccentVec::ZERO, host))
    }

    /// Re-evaluates formula controls against `effect_accents` (track role).
    pub fn track_update(&mut self, effect_accents: &AccentVec, host: &dyn FormulaHost) -> Result<()> {
        self.slots
            .iter_mut()
            .try_for_each(|s| s.refresh(0.0, effect_accents, host))
    }

    /// Filters `left`/`right` in place.
    ///
    /// The input is snapshotted into scratch, the outputs are cleared, and
    /// each slot's scaled output is accumulated back.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let len = left.len().min(right.len());
        let (left, right) = (&mut left[..len], &mut right[..len]);
        let mut in_left = synth.acquire(len)?;
        let mut in_right = synth.acquire(len)?;
        let mut filtered = synth.acquire(len)?;
        let mut ramp = synth.acquire(len)?;
        in_left.copy_from_slice(left);
        in_right.copy_from_slice(right);
        left.fill(0.0);
        right.fill(0.0);

        for slot in &mut self.slots {
            let smooth =
                synth.smooth_outputs() && !slot.sample_and_hold && slot.previous != slot.current;
            if smooth {
                let mode = if slot.exponential {
                    RampMode::Multiplicative
                } else {
                    RampMode::Additive
                };
                fill_ramp(&mut ramp, slot.previous, slot.current, mode);
            }
            let gain = slot.current as f32;
            let channels = [
                (slot.left.as_mut(), &in_left, &mut *left),
                (slot.right.as_mut(), &in_right, &mut *right),
            ];
            for (filter, input, output) in channels {
                let Some(filter) = filter else { continue };
                filter.process_block(input, &mut filtered);
                if smooth {
                    for ((out, &y), &g) in output.iter_mut().zip(filtered.iter()).zip(ramp.iter()) {
                        *out += y * g;
                    }
                } else {
                    for (out, &y) in output.iter_mut().zip(filtered.iter()) {
                        *out += y * gain;
                    }
                }
            }
            slot.previous = slot.current;
        }
        Ok(())
    }

    /// Releases sustain point `index` on every envelope-driven control.
    pub fn key_up_sustain(&mut self, index: usize) {
        for slot in &mut self.slots {
            for m in slot.modulated() {
                m.key_up_sustain(index);
            }
        }
    }

    /// Retriggers every envelope-driven control.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        for slot in &mut self.slots {
            for m in slot.modulated() {
                m.retrigger_from_origin(params, host)?;
            }
        }
        Ok(())
    }

    /// `(previous, current)` output multiplier of slot `index`.
    pub fn multiplier(&self, index: usize) -> Option<(f64, f64)> {
        self.slots.get(index).map(|s| (s.previous, s.current))
    }

    /// Channels processed by slot `index`.
    pub fn channel(&self, index: usize) -> Option<FilterChannel> {
        self.slots.get(index).map(|s| s.channel)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the array has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl OriginAligned for FilterArray {
    fn pre_origin_ticks(&self) -> u32 {
        self.slots
            .iter()
            .flat_map(|s| s.controls.iter())
            .filter_map(|c| c.as_ref().and_then(ControlState::modulated))
            .map(OriginAligned::pre_origin_ticks)
            .max()
            .unwrap_or(0)
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        for slot in &mut self.slots {
            for m in slot.modulated() {
                m.fix_origin(max_pre_origin);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SynthSettings;
    use crate::envelope::{EnvelopePhase, EnvelopeSpec};
    use crate::accent::NUM_ACCENTS;
    use crate::formula::FunctionTable;
    use crate::lfo::{LfoSpec, LfoWaveform};
    use crate::modulation::ModulatedSpec;
    use std::sync::Arc;

    const RATE: f64 = 100.0;

    fn synth(host: FunctionTable) -> SynthParams {
        let settings = SynthSettings {
            sample_rate: 4800.0,
            envelope_rate: RATE,
            ..SynthSettings::default()
        };
        SynthParams::new(settings, Arc::new(host)).unwrap()
    }

    fn note_params() -> EnvelopeParams<'static> {
        EnvelopeParams {
            accents: &AccentVec::ZERO,
            live_accents: &AccentVec::ZERO,
            pitch_hz: 440.0,
            loudness: 1.0,
            hurry_up: 1.0,
            envelope_rate: RATE,
        }
    }

    fn accent_host() -> FunctionTable {
        let mut host = FunctionTable::new();
        host.register_scalar("first_accent", NUM_ACCENTS, |a| a[0]);
        host
    }

    fn assert_ramp(out: &[f32], from: f32, to: f32) {
        let mut prev = from;
        for &v in out {
            assert!(v > prev, "{v} after {prev}");
            prev = v;
        }
        assert_eq!(*out.last().unwrap(), to);
    }

    #[test]
    fn additive_output_ramp() {
        let spec = FilterSpec {
            output: ControlSpec::Formula("first_accent".into()),
            ..FilterSpec::new(FilterKind::Null)
        };
        let synth = synth(accent_host());
        let template = FilterArrayTemplate::new(&[spec], EffectRole::Track, synth.host()).unwrap();
        let mut accents = AccentVec::ZERO;
        accents[0] = 0.2;
        let mut array = FilterArray::new_track(&template, &accents, synth.host(), 4800.0).unwrap();
        assert_eq!(array.multiplier(0), Some((0.2, 0.2)));

        accents[0] = 0.8;
        array.track_update(&accents, synth.host()).unwrap();
        let mut left = vec![1.0f32; 48];
        let mut right = vec![1.0f32; 48];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert_ramp(&left, 0.2, 0.8);
        assert_eq!(left, right);
        assert_eq!(array.multiplier(0), Some((0.8, 0.8)));

        let mut left = vec![1.0f32; 48];
        let mut right = vec![1.0f32; 48];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&v| v == 0.8f32));
    }

    #[test]
    fn multiplicative_output_ramp() {
        let host = FunctionTable::new();
        let spec = FilterSpec {
            output: ControlSpec::Modulated(ModulatedSpec::envelope(EnvelopeSpec::with_phases(
                0.2,
                vec![EnvelopePhase::decibel(1.0 / RATE, 0.8)],
            ))),
            ..FilterSpec::new(FilterKind::Null)
        };
        let synth = synth(host);
        let template =
            FilterArrayTemplate::new(&[spec], EffectRole::Oscillator, synth.host()).unwrap();
        let mut array = FilterArray::new_oscillator(&template, &note_params(), synth.host(), 4800.0)
            .unwrap()
            .align(0);
        array.osc_update(440.0, synth.host()).unwrap();
        let mut left = vec![1.0f32; 48];
        let mut right = vec![1.0f32; 48];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert_ramp(&left, 0.2, 0.8);
        // Geometric: constant ratio between neighbors.
        let r0 = f64::from(left[1]) / f64::from(left[0]);
        let r1 = f64::from(left[40]) / f64::from(left[39]);
        assert!((r0 - r1).abs() < 1e-5);
    }

    #[test]
    fn smoothing_can_be_disabled() {
        let spec = FilterSpec {
            output: ControlSpec::Formula("first_accent".into()),
            ..FilterSpec::new(FilterKind::Null)
        };
        let host = accent_host();
        let settings = SynthSettings {
            sample_rate: 4800.0,
            envelope_rate: RATE,
            smooth_outputs: false,
            ..SynthSettings::default()
        };
        let synth = SynthParams::new(settings, Arc::new(host)).unwrap();
        let template = FilterArrayTemplate::new(&[spec], EffectRole::Track, synth.host()).unwrap();
        let mut array =
            FilterArray::new_track(&template, &AccentVec::ZERO, synth.host(), 4800.0).unwrap();
        let mut accents = AccentVec::ZERO;
        accents[0] = 0.5;
        array.track_update(&accents, synth.host()).unwrap();
        let mut left = vec![1.0f32; 8];
        let mut right = vec![1.0f32; 8];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&v| v == 0.5));
    }

    #[test]
    fn sample_and_hold_is_never_smoothed() {
        let host = FunctionTable::new();
        let mut output = ModulatedSpec::constant(0.5);
        output.lfos.push(LfoSpec::steady(LfoWaveform::SampleAndHold, 50.0, 0.25));
        let spec = FilterSpec {
            output: ControlSpec::Modulated(output),
            ..FilterSpec::new(FilterKind::Null)
        };
        let synth = synth(host);
        let template =
            FilterArrayTemplate::new(&[spec], EffectRole::Oscillator, synth.host()).unwrap();
        let mut array = FilterArray::new_oscillator(&template, &note_params(), synth.host(), 4800.0)
            .unwrap()
            .align(0);
        for _ in 0..6 {
            array.osc_update(440.0, synth.host()).unwrap();
            let mut left = vec![1.0f32; 16];
            let mut right = vec![1.0f32; 16];
            array.apply(&mut left, &mut right, &synth).unwrap();
            assert!(left.iter().all(|&v| v == left[0]));
        }
    }

    #[test]
    fn uncovered_channel_is_silent() {
        let host = FunctionTable::new();
        let spec = FilterSpec {
            channel: FilterChannel::Left,
            ..FilterSpec::new(FilterKind::Null)
        };
        let synth = synth(host);
        let template = FilterArrayTemplate::new(&[spec], EffectRole::Track, synth.host()).unwrap();
        let mut array =
            FilterArray::new_track(&template, &AccentVec::ZERO, synth.host(), 4800.0).unwrap();
        let mut left = vec![1.0f32; 8];
        let mut right = vec![1.0f32; 8];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&v| v == 1.0));
        assert!(right.iter().all(|&v| v == 0.0));
        assert_eq!(array.channel(0), Some(FilterChannel::Left));
    }

    #[test]
    fn parallel_slots_sum() {
        let host = FunctionTable::new();
        let half = FilterSpec {
            output: ControlSpec::Constant(0.5),
            ..FilterSpec::new(FilterKind::Null)
        };
        let synth = synth(host);
        let template =
            FilterArrayTemplate::new(&[half.clone(), half], EffectRole::Track, synth.host())
                .unwrap();
        let mut array =
            FilterArray::new_track(&template, &AccentVec::ZERO, synth.host(), 4800.0).unwrap();
        let mut left = vec![0.25f32; 8];
        let mut right = vec![-0.25f32; 8];
        array.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&v| v == 0.25));
        assert!(right.iter().all(|&v| v == -0.25));
    }

    #[test]
    fn rejects_controls_for_the_wrong_role() {
        let host = accent_host();
        let formula = FilterSpec {
            cutoff: ControlSpec::Formula("first_accent".into()),
            ..FilterSpec::new(FilterKind::Lowpass)
        };
        assert!(FilterArrayTemplate::new(&[formula], EffectRole::Oscillator, &host).is_err());
        let modulated = FilterSpec {
            cutoff: ControlSpec::Modulated(ModulatedSpec::constant(500.0)),
            ..FilterSpec::new(FilterKind::Lowpass)
        };
        assert!(FilterArrayTemplate::new(&[modulated], EffectRole::Track, &host).is_err());
    }

    #[test]
    fn unused_controls_are_not_resolved() {
        let host = FunctionTable::new();
        let spec = FilterSpec {
            gain: ControlSpec::Formula("missing".into()),
            ..FilterSpec::new(FilterKind::Lowpass)
        };
        assert!(spec.formula_names().next().is_none());
        assert!(FilterArrayTemplate::new(&[spec], EffectRole::Track, &host).is_ok());
    }

    #[test]
    fn pre_origin_comes_from_modulated_controls() {
        let host = FunctionTable::new();
        let mut envelope =
            EnvelopeSpec::with_phases(100.0, vec![EnvelopePhase::linear(0.05, 1000.0)]);
        envelope.origin = 1;
        let spec = FilterSpec {
            cutoff: ControlSpec::Modulated(ModulatedSpec::envelope(envelope)),
            ..FilterSpec::new(FilterKind::Lowpass)
        };
        let template = FilterArrayTemplate::new(&[spec], EffectRole::Oscillator, &host).unwrap();
        let staged = FilterArray::new_oscillator(&template, &note_params(), &host, 4800.0).unwrap();
        assert_eq!(staged.pre_origin_ticks(), 5);
    }
}
