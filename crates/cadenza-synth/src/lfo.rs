//! Control-rate low frequency oscillators.
//!
//! An LFO runs at the envelope tick rate. Its frequency and amplitude are
//! themselves envelopes, so an LFO can fade in, speed up, or be released
//! through sustain points exactly like any other envelope. Each tick it
//! takes a base value (usually an envelope output) and returns the base
//! modulated by the current waveform sample.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use core::f64::consts::TAU;
use libm::{exp2, floor, sin};

use crate::envelope::{EnvelopeParams, EnvelopeSpec, EnvelopeState, EnvelopeTemplate};
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::origin::{OriginAligned, Staged};

/// LFO waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LfoWaveform {
    /// Sine starting at zero.
    #[default]
    Sine,
    /// Triangle starting at zero, rising first.
    Triangle,
    /// +1 for the first half cycle, -1 for the second.
    Square,
    /// Rising ramp from -1 to 1.
    RampUp,
    /// Falling ramp from 1 to -1.
    RampDown,
    /// Random value held for one cycle.
    SampleAndHold,
    /// Always 1.
    Constant,
}

/// Output range of the waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LfoPolarity {
    /// `[-1, 1]`
    #[default]
    Signed,
    /// `[0, 1]`
    Positive,
}

/// How the waveform combines with the base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LfoModulation {
    /// Offset the base.
    #[default]
    Additive,
    /// Scale the base by the waveform.
    Multiplicative,
    /// Scale the base by one minus the waveform.
    InverseMultiplicative,
}

/// Units of an additive offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LfoAdding {
    /// Offset in the base's own units.
    #[default]
    Linear,
    /// Offset in half steps, for pitch.
    HalfSteps,
}

/// Definition of one LFO.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LfoSpec {
    /// Waveform shape.
    pub waveform: LfoWaveform,
    /// Waveform range.
    pub polarity: LfoPolarity,
    /// Combination rule.
    pub modulation: LfoModulation,
    /// Units of additive modulation.
    pub adding: LfoAdding,
    /// Frequency envelope in Hz.
    pub frequency: EnvelopeSpec,
    /// Amplitude envelope.
    pub amplitude: EnvelopeSpec,
    /// Starting phase in cycles.
    pub phase_offset: f64,
    /// Seed for sample-and-hold values.
    pub seed: u32,
}

impl Default for LfoSpec {
    fn default() -> Self {
        Self {
            waveform: LfoWaveform::Sine,
            polarity: LfoPolarity::Signed,
            modulation: LfoModulation::Additive,
            adding: LfoAdding::Linear,
            frequency: EnvelopeSpec::constant(1.0),
            amplitude: EnvelopeSpec::constant(0.0),
            phase_offset: 0.0,
            seed: 1,
        }
    }
}

impl LfoSpec {
    /// An LFO with constant frequency and amplitude.
    pub fn steady(waveform: LfoWaveform, frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            waveform,
            frequency: EnvelopeSpec::constant(frequency_hz),
            amplitude: EnvelopeSpec::constant(amplitude),
            ..Self::default()
        }
    }

    /// Names of every formula referenced by either envelope.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        self.frequency.formula_names().chain(self.amplitude.formula_names())
    }
}

/// Resolved LFO shared across notes.
#[derive(Debug, Clone, PartialEq)]
pub struct LfoTemplate {
    spec: LfoSpec,
    frequency: Arc<EnvelopeTemplate>,
    amplitude: Arc<EnvelopeTemplate>,
}

impl LfoTemplate {
    /// Validates both envelopes of `spec`.
    pub fn new(spec: &LfoSpec, host: &dyn FormulaHost) -> Result<Self> {
        Ok(Self {
            frequency: Arc::new(EnvelopeTemplate::new(&spec.frequency, host)?),
            amplitude: Arc::new(EnvelopeTemplate::new(&spec.amplitude, host)?),
            spec: spec.clone(),
        })
    }

    /// The definition.
    pub fn spec(&self) -> &LfoSpec {
        &self.spec
    }
}

/// Multipliers applied on top of an LFO's own envelopes.
///
/// The pitch LFO uses these for the track's pitch displacement depth and
/// rate. Everything else passes [`LfoScaling::UNITY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoScaling {
    /// Multiplies the amplitude envelope.
    pub amplitude: f64,
    /// Multiplies the frequency envelope.
    pub rate: f64,
}

impl LfoScaling {
    /// No scaling.
    pub const UNITY: Self = Self {
        amplitude: 1.0,
        rate: 1.0,
    };
}

impl Default for LfoScaling {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Per-note LFO state.
#[derive(Debug, Clone, PartialEq)]
pub struct LfoGenerator {
    template: Arc<LfoTemplate>,
    frequency: EnvelopeState,
    amplitude: EnvelopeState,
    scaling: LfoScaling,
    envelope_rate: f64,
    phase: f64,
    held: f64,
    rng: u32,
    pre_origin: u32,
    start_countdown: u32,
}

impl LfoGenerator {
    /// Builds the generator for one note; the lead-in is the larger of the
    /// two envelopes' lead-ins.
    pub fn new(
        template: &Arc<LfoTemplate>,
        params: &EnvelopeParams<'_>,
        scaling: LfoScaling,
        host: &dyn FormulaHost,
    ) -> Result<Staged<Self>> {
        let frequency = EnvelopeState::new(&template.frequency, params, host)?;
        let amplitude = EnvelopeState::new(&template.amplitude, params, host)?;
        let pre_origin = frequency.pre_origin_ticks().max(amplitude.pre_origin_ticks());
        let offset = template.spec.phase_offset;
        let mut lfo = Self {
            template: Arc::clone(template),
            frequency: frequency.into_child(),
            amplitude: amplitude.into_child(),
            scaling,
            envelope_rate: params.envelope_rate,
            phase: offset - floor(offset),
            held: 0.0,
            rng: template.spec.seed,
            pre_origin,
            start_countdown: 0,
        };
        lfo.draw_held();
        Ok(Staged::new(lfo))
    }

    /// Advances one tick and returns `base` modulated by the waveform.
    pub fn update(&mut self, base: f64, pitch_hz: f64, host: &dyn FormulaHost) -> Result<f64> {
        let frequency = self.frequency.update(pitch_hz, host)? * self.scaling.rate;
        let amplitude = self.amplitude.update(pitch_hz, host)? * self.scaling.amplitude;
        let wave = self.wave();
        if self.start_countdown > 0 {
            self.start_countdown -= 1;
        } else {
            self.advance_phase(frequency);
        }
        Ok(self.modulate(base, wave, amplitude))
    }

    /// The value the first update would produce from `base`, without
    /// advancing.
    pub fn initial_value(&self, base: f64) -> f64 {
        self.modulate(base, self.wave(), self.amplitude.value() * self.scaling.amplitude)
    }

    /// Releases sustain point `index` on both envelopes.
    pub fn key_up_sustain(&mut self, index: usize) {
        self.frequency.key_up_sustain(index);
        self.amplitude.key_up_sustain(index);
    }

    /// Restarts both envelopes at their origins. The phase carries on so the
    /// waveform stays continuous across a tie.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        self.frequency.retrigger_from_origin(params, host)?;
        self.amplitude.retrigger_from_origin(params, host)?;
        self.start_countdown = 0;
        Ok(())
    }

    /// Whether the waveform is sample-and-hold.
    pub fn is_sample_and_hold(&self) -> bool {
        self.template.spec.waveform == LfoWaveform::SampleAndHold
    }

    /// Current phase in cycles, in `[0, 1)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    fn wave(&self) -> f64 {
        let p = self.phase;
        let raw = match self.template.spec.waveform {
            LfoWaveform::Sine => sin(TAU * p),
            LfoWaveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            LfoWaveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::RampUp => 2.0 * p - 1.0,
            LfoWaveform::RampDown => 1.0 - 2.0 * p,
            LfoWaveform::SampleAndHold => self.held,
            LfoWaveform::Constant => 1.0,
        };
        match self.template.spec.polarity {
            LfoPolarity::Signed => raw,
            LfoPolarity::Positive => 0.5 * (raw + 1.0),
        }
    }

    fn modulate(&self, base: f64, wave: f64, amplitude: f64) -> f64 {
        let depth = wave * amplitude;
        let spec = &self.template.spec;
        match (spec.modulation, spec.adding) {
            (LfoModulation::Additive, LfoAdding::Linear) => base + depth,
            (LfoModulation::Additive, LfoAdding::HalfSteps) => base * exp2(depth / 12.0),
            (LfoModulation::Multiplicative, _) => base * depth,
            (LfoModulation::InverseMultiplicative, _) => base * (1.0 - depth),
        }
    }

    fn advance_phase(&mut self, frequency: f64) {
        self.phase += frequency / self.envelope_rate;
        if self.phase >= 1.0 || self.phase < 0.0 {
            self.phase -= floor(self.phase);
            self.draw_held();
        }
    }

    fn draw_held(&mut self) {
        self.rng = self.rng.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.held = f64::from(self.rng >> 8) / f64::from(1u32 << 24) * 2.0 - 1.0;
    }
}

impl OriginAligned for LfoGenerator {
    fn pre_origin_ticks(&self) -> u32 {
        self.pre_origin
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        self.frequency.fix_origin(max_pre_origin);
        self.amplitude.fix_origin(max_pre_origin);
        self.start_countdown = max_pre_origin.saturating_sub(self.pre_origin);
    }
}

/// LFOs applied one after another, each modulating the previous result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LfoList {
    lfos: Vec<LfoGenerator>,
}

impl LfoList {
    /// Builds every generator in `templates`.
    pub fn new(
        templates: &[Arc<LfoTemplate>],
        params: &EnvelopeParams<'_>,
        scaling: LfoScaling,
        host: &dyn FormulaHost,
    ) -> Result<Staged<Self>> {
        let lfos = templates
            .iter()
            .map(|t| LfoGenerator::new(t, params, scaling, host).map(Staged::into_child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Staged::new(Self { lfos }))
    }

    /// Runs every generator for one tick.
    pub fn update(&mut self, base: f64, pitch_hz: f64, host: &dyn FormulaHost) -> Result<f64> {
        self.lfos
            .iter_mut()
            .try_fold(base, |value, lfo| lfo.update(value, pitch_hz, host))
    }

    /// Modulated value before the first tick.
    pub fn initial_value(&self, base: f64) -> f64 {
        self.lfos.iter().fold(base, |value, lfo| lfo.initial_value(value))
    }

    /// Releases sustain point `index` on every generator.
    pub fn key_up_sustain(&mut self, index: usize) {
        for lfo in &mut self.lfos {
            lfo.key_up_sustain(index);
        }
    }

    /// Retriggers every generator.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        self.lfos
            .iter_mut()
            .try_for_each(|lfo| lfo.retrigger_from_origin(params, host))
    }

    /// True if any generator is sample-and-hold.
    pub fn is_sample_and_hold(&self) -> bool {
        self.lfos.iter().any(LfoGenerator::is_sample_and_hold)
    }

    /// Number of generators.
    pub fn len(&self) -> usize {
        self.lfos.len()
    }

    /// True when the list has no generators.
    pub fn is_empty(&self) -> bool {
        self.lfos.is_empty()
    }
}

impl OriginAligned for LfoList {
    fn pre_origin_ticks(&self) -> u32 {
        self.lfos.iter().map(OriginAligned::pre_origin_ticks).max().unwrap_or(0)
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        for lfo in &mut self.lfos {
            lfo.fix_origin(max_pre_origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accent::AccentVec;
    use crate::envelope::EnvelopePhase;
    use crate::formula::FunctionTable;

    const RATE: f64 = 128.0;

    fn params() -> EnvelopeParams<'static> {
        EnvelopeParams {
            accents: &AccentVec::ZERO,
            live_accents: &AccentVec::ZERO,
            pitch_hz: 440.0,
            loudness: 1.0,
            hurry_up: 1.0,
            envelope_rate: RATE,
        }
    }

    fn generator(spec: &LfoSpec, host: &FunctionTable) -> LfoGenerator {
        let template = Arc::new(LfoTemplate::new(spec, host).unwrap());
        LfoGenerator::new(&template, &params(), LfoScaling::UNITY, host)
            .unwrap()
            .align(0)
    }

    #[test]
    fn square_additive() {
        let host = FunctionTable::new();
        let mut lfo = generator(&LfoSpec::steady(LfoWaveform::Square, 16.0, 0.5), &host);
        let values: Vec<f64> = (0..8).map(|_| lfo.update(1.0, 0.0, &host).unwrap()).collect();
        assert_eq!(values, [1.5, 1.5, 1.5, 1.5, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(lfo.phase(), 0.0);
    }

    #[test]
    fn modulation_rules() {
        let host = FunctionTable::new();
        let mut spec = LfoSpec::steady(LfoWaveform::Constant, 1.0, 0.25);
        let lfo = generator(&spec, &host);
        assert_eq!(lfo.initial_value(2.0), 2.25);

        spec.modulation = LfoModulation::Multiplicative;
        assert_eq!(generator(&spec, &host).initial_value(2.0), 0.5);

        spec.modulation = LfoModulation::InverseMultiplicative;
        assert_eq!(generator(&spec, &host).initial_value(2.0), 1.5);

        spec.modulation = LfoModulation::Additive;
        spec.adding = LfoAdding::HalfSteps;
        spec.amplitude = EnvelopeSpec::constant(12.0);
        assert_eq!(generator(&spec, &host).initial_value(220.0), 440.0);
    }

    #[test]
    fn positive_polarity_range() {
        let host = FunctionTable::new();
        let mut spec = LfoSpec::steady(LfoWaveform::Sine, 3.0, 1.0);
        spec.polarity = LfoPolarity::Positive;
        let mut lfo = generator(&spec, &host);
        for _ in 0..500 {
            let v = lfo.update(0.0, 0.0, &host).unwrap();
            assert!((0.0..=1.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn sample_and_hold_changes_only_on_wrap() {
        let host = FunctionTable::new();
        let mut lfo = generator(&LfoSpec::steady(LfoWaveform::SampleAndHold, 16.0, 1.0), &host);
        assert!(lfo.is_sample_and_hold());
        let first: Vec<f64> = (0..8).map(|_| lfo.update(0.0, 0.0, &host).unwrap()).collect();
        let second: Vec<f64> = (0..8).map(|_| lfo.update(0.0, 0.0, &host).unwrap()).collect();
        assert!(first.iter().all(|&v| v == first[0]));
        assert!(second.iter().all(|&v| v == second[0]));
        assert_ne!(first[0], second[0]);
        assert!(first[0].abs() <= 1.0 && second[0].abs() <= 1.0);
    }

    #[test]
    fn amplitude_envelope_fades_in() {
        let host = FunctionTable::new();
        let spec = LfoSpec {
            waveform: LfoWaveform::Constant,
            amplitude: EnvelopeSpec::with_phases(0.0, vec![EnvelopePhase::linear(4.0 / RATE, 1.0)]),
            ..LfoSpec::default()
        };
        let mut lfo = generator(&spec, &host);
        let values: Vec<f64> = (0..5).map(|_| lfo.update(0.0, 0.0, &host).unwrap()).collect();
        assert_eq!(values, [0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn list_composes_in_order() {
        let host = FunctionTable::new();
        let add = Arc::new(
            LfoTemplate::new(&LfoSpec::steady(LfoWaveform::Constant, 1.0, 1.0), &host).unwrap(),
        );
        let mut scale_spec = LfoSpec::steady(LfoWaveform::Constant, 1.0, 2.0);
        scale_spec.modulation = LfoModulation::Multiplicative;
        let scale = Arc::new(LfoTemplate::new(&scale_spec, &host).unwrap());
        let mut list = LfoList::new(&[add, scale], &params(), LfoScaling::UNITY, &host)
            .unwrap()
            .align(0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.initial_value(1.0), 4.0);
        assert_eq!(list.update(1.0, 0.0, &host).unwrap(), 4.0);
    }

    #[test]
    fn scaling_applies_to_depth_and_rate() {
        let host = FunctionTable::new();
        let template = Arc::new(
            LfoTemplate::new(&LfoSpec::steady(LfoWaveform::RampUp, 16.0, 1.0), &host).unwrap(),
        );
        let scaling = LfoScaling {
            amplitude: 0.5,
            rate: 2.0,
        };
        let mut lfo = LfoGenerator::new(&template, &params(), scaling, &host)
            .unwrap()
            .align(0);
        assert_eq!(lfo.update(0.0, 0.0, &host).unwrap(), -0.5);
        assert_eq!(lfo.phase(), 0.25);
    }

    #[test]
    fn phase_waits_for_origin() {
        let host = FunctionTable::new();
        let mut spec = LfoSpec::steady(LfoWaveform::RampUp, 16.0, 1.0);
        spec.amplitude = EnvelopeSpec {
            origin: 1,
            ..EnvelopeSpec::with_phases(1.0, vec![EnvelopePhase::linear(2.0 / RATE, 1.0)])
        };
        let template = Arc::new(LfoTemplate::new(&spec, &host).unwrap());
        let staged = LfoGenerator::new(&template, &params(), LfoScaling::UNITY, &host).unwrap();
        assert_eq!(staged.pre_origin_ticks(), 2);
        let mut lfo = staged.align(5);
        for _ in 0..3 {
            lfo.update(0.0, 0.0, &host).unwrap();
            assert_eq!(lfo.phase(), 0.0);
        }
        lfo.update(0.0, 0.0, &host).unwrap();
        assert_eq!(lfo.phase(), 0.125);
    }
}
