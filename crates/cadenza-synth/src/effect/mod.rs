//! Ordered effect chains for oscillators and tracks.
//!
//! An effect chain runs its stages in declaration order over a block, in
//! place. The same chain type serves two roles:
//!
//! - **Oscillator**: one chain per note, its controls driven by envelopes
//!   and LFOs that start with the note and receive its releases.
//! - **Track**: one chain per track, its controls re-evaluated each tick as
//!   formulas over the track's eight effect accents. Wrapped by
//!   [`TrackEffectGenerator`] for command scheduling and auto-quiescence.

mod ideal_lowpass;
mod track;

pub use ideal_lowpass::{IdealLowpass, IdealLowpassSpec};
pub use track::{QuiescenceSpec, TrackEffectGenerator};

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::accent::AccentVec;
use crate::context::SynthParams;
use crate::envelope::EnvelopeParams;
use crate::error::Result;
use crate::filter::{FilterArray, FilterArrayTemplate, FilterSpec};
use crate::formula::FormulaHost;
use crate::origin::{OriginAligned, Staged};
use crate::pluggable::{
    PluggableBinding, PluggableEffect, PluggableInputs, PluggableRegistry, PluggableTemplate,
};

/// Where an effect sits, which decides what drives its controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EffectRole {
    /// Per note, inside an oscillator bank.
    Oscillator,
    /// Per track, after every voice is mixed.
    Track,
}

/// One stage of an effect chain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EffectSpec {
    /// Parallel filter array.
    Filters(Vec<FilterSpec>),
    /// Windowed-sinc FIR lowpass.
    IdealLowpass(IdealLowpassSpec),
    /// Registry-provided processor.
    Pluggable(PluggableBinding),
}

impl EffectSpec {
    /// Formula names referenced by this stage's controls.
    ///
    /// Functions named inside a pluggable configuration are checked by the
    /// processor template instead.
    pub fn formula_names(&self) -> Vec<&str> {
        match self {
            Self::Filters(specs) => specs.iter().flat_map(FilterSpec::formula_names).collect(),
            Self::IdealLowpass(_) => Vec::new(),
            Self::Pluggable(binding) => binding.formula_names().collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum StageTemplate {
    Filters(FilterArrayTemplate),
    IdealLowpass(IdealLowpassSpec),
    Pluggable(PluggableTemplate),
}

/// Resolved effect chain.
#[derive(Debug, Clone)]
pub struct EffectChainTemplate {
    role: EffectRole,
    stages: Vec<StageTemplate>,
}

impl EffectChainTemplate {
    /// Resolves every stage for `role`.
    pub fn new(
        specs: &[EffectSpec],
        role: EffectRole,
        registry: &PluggableRegistry,
        host: &dyn FormulaHost,
    ) -> Result<Self> {
        let stages = specs
            .iter()
            .map(|spec| {
                Ok(match spec {
                    EffectSpec::Filters(filters) => {
                        StageTemplate::Filters(FilterArrayTemplate::new(filters, role, host)?)
                    }
                    EffectSpec::IdealLowpass(lowpass) => {
                        lowpass.validate()?;
                        StageTemplate::IdealLowpass(*lowpass)
                    }
                    EffectSpec::Pluggable(binding) => {
                        StageTemplate::Pluggable(PluggableTemplate::new(binding, role, registry, host)?)
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { role, stages })
    }

    /// Role the chain was resolved for.
    pub fn role(&self) -> EffectRole {
        self.role
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[derive(Debug)]
enum Stage {
    Filters(FilterArray),
    IdealLowpass(IdealLowpass),
    Pluggable(PluggableEffect),
}

/// Runtime effect chain.
#[derive(Debug)]
pub struct EffectChain {
    stages: Vec<Stage>,
}

impl EffectChain {
    /// Oscillator-role chain for one note. Alignment is forwarded to the
    /// stages when the returned value is aligned.
    pub fn new_oscillator(
        template: &EffectChainTemplate,
        params: &EnvelopeParams<'_>,
        synth: &SynthParams,
    ) -> Result<Staged<Self>> {
        let host = synth.host();
        let stages = template
            .stages
            .iter()
            .map(|stage| {
                Ok(match stage {
                    StageTemplate::Filters(t) => Stage::Filters(
                        FilterArray::new_oscillator(t, params, host, synth.sample_rate())?.into_child(),
                    ),
                    StageTemplate::IdealLowpass(spec) => {
                        Stage::IdealLowpass(IdealLowpass::new(spec, synth.sample_rate()))
                    }
                    StageTemplate::Pluggable(t) => {
                        Stage::Pluggable(PluggableEffect::new_oscillator(t, params, synth)?.into_child())
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Staged::new(Self { stages }))
    }

    /// Track-role chain, its controls evaluated against `effect_accents`.
    pub fn new_track(
        template: &EffectChainTemplate,
        effect_accents: &AccentVec,
        synth: &SynthParams,
    ) -> Result<Self> {
        let host = synth.host();
        let stages = template
            .stages
            .iter()
            .map(|stage| {
                Ok(match stage {
                    StageTemplate::Filters(t) => Stage::Filters(FilterArray::new_track(
                        t,
                        effect_accents,
                        host,
                        synth.sample_rate(),
                    )?),
                    StageTemplate::IdealLowpass(spec) => {
                        Stage::IdealLowpass(IdealLowpass::new(spec, synth.sample_rate()))
                    }
                    StageTemplate::Pluggable(t) => {
                        Stage::Pluggable(PluggableEffect::new_track(t, effect_accents, synth)?)
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { stages })
    }

    /// Advances envelope-driven controls one tick (oscillator role).
    pub fn osc_update(&mut self, pitch_hz: f64, loudness: f64, host: &dyn FormulaHost) -> Result<()> {
        let inputs = PluggableInputs {
            pitch_hz,
            loudness,
            accents: &AccentVec::ZERO,
        };
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.osc_update(pitch_hz, host)?,
                Stage::IdealLowpass(_) => {}
                Stage::Pluggable(p) => p.update(&inputs, host)?,
            }
        }
        Ok(())
    }

    /// Re-evaluates formula controls (track role).
    pub fn track_update(&mut self, effect_accents: &AccentVec, host: &dyn FormulaHost) -> Result<()> {
        let inputs = PluggableInputs {
            pitch_hz: 0.0,
            loudness: 1.0,
            accents: effect_accents,
        };
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.track_update(effect_accents, host)?,
                Stage::IdealLowpass(_) => {}
                Stage::Pluggable(p) => p.update(&inputs, host)?,
            }
        }
        Ok(())
    }

    /// Runs every stage over the block, in order.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.apply(left, right, synth)?,
                Stage::IdealLowpass(l) => l.apply(left, right),
                Stage::Pluggable(p) => p.apply(left, right, synth)?,
            }
        }
        Ok(())
    }

    /// Releases sustain point `index` on every envelope-driven control.
    pub fn key_up_sustain(&mut self, index: usize) {
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.key_up_sustain(index),
                Stage::IdealLowpass(_) => {}
                Stage::Pluggable(p) => p.key_up_sustain(index),
            }
        }
    }

    /// Retriggers every envelope-driven control.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.retrigger_from_origin(params, host)?,
                Stage::IdealLowpass(_) => {}
                Stage::Pluggable(p) => p.retrigger_from_origin(params, host)?,
            }
        }
        Ok(())
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl OriginAligned for EffectChain {
    fn pre_origin_ticks(&self) -> u32 {
        self.stages
            .iter()
            .map(|stage| match stage {
                Stage::Filters(f) => f.pre_origin_ticks(),
                Stage::IdealLowpass(_) => 0,
                Stage::Pluggable(p) => p.pre_origin_ticks(),
            })
            .max()
            .unwrap_or(0)
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        for stage in &mut self.stages {
            match stage {
                Stage::Filters(f) => f.fix_origin(max_pre_origin),
                Stage::IdealLowpass(_) => {}
                Stage::Pluggable(p) => p.fix_origin(max_pre_origin),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SynthSettings;
    use crate::control::ControlSpec;
    use crate::filter::FilterKind;
    use crate::formula::FunctionTable;
    use crate::pluggable::{ConfigValue, PluggableConfig};
    use std::sync::Arc;

    fn synth(host: FunctionTable) -> SynthParams {
        let settings = SynthSettings {
            sample_rate: 8000.0,
            envelope_rate: 100.0,
            ..SynthSettings::default()
        };
        SynthParams::new(settings, Arc::new(host)).unwrap()
    }

    fn gain_stage(output: ControlSpec) -> EffectSpec {
        EffectSpec::Filters(vec![FilterSpec {
            output,
            ..FilterSpec::new(FilterKind::Null)
        }])
    }

    #[test]
    fn stages_run_in_order() {
        let synth = synth(FunctionTable::new());
        let registry = PluggableRegistry::new();
        let mut clip = PluggableConfig::new();
        clip.push("drive", ConfigValue::Number(2.0));
        let specs = [
            gain_stage(ControlSpec::Constant(4.0)),
            EffectSpec::Pluggable(PluggableBinding::new("soft_clip", clip)),
        ];
        let template = EffectChainTemplate::new(&specs, EffectRole::Track, &registry, synth.host()).unwrap();
        assert_eq!(template.len(), 2);
        let mut chain = EffectChain::new_track(&template, &AccentVec::ZERO, &synth).unwrap();
        let mut left = vec![0.5f32; 8];
        let mut right = vec![0.0f32; 8];
        chain.apply(&mut left, &mut right, &synth).unwrap();
        // 4x gain then saturation: tanh(2 * 2) / tanh(2)
        let expected = libm::tanhf(4.0) / libm::tanhf(2.0);
        assert!((left[0] - expected).abs() < 1e-5);
        assert!(right.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn track_chain_follows_effect_accents() {
        let mut host = FunctionTable::new();
        host.register_scalar("first_accent", crate::accent::NUM_ACCENTS, |a| a[0]);
        let synth = synth(host);
        let specs = [gain_stage(ControlSpec::Formula("first_accent".into()))];
        let template =
            EffectChainTemplate::new(&specs, EffectRole::Track, &PluggableRegistry::new(), synth.host())
                .unwrap();
        let mut accents = AccentVec::ZERO;
        accents[0] = 0.25;
        let mut chain = EffectChain::new_track(&template, &accents, &synth).unwrap();
        accents[0] = 0.5;
        chain.track_update(&accents, synth.host()).unwrap();
        let mut left = vec![1.0f32; 4];
        let mut right = vec![1.0f32; 4];
        chain.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left[3], 0.5);
        assert!(left[0] > 0.25 && left[0] < 0.5);
    }

    #[test]
    fn ideal_lowpass_order_is_checked_at_template_time() {
        let synth = synth(FunctionTable::new());
        let specs = [EffectSpec::IdealLowpass(IdealLowpassSpec {
            cutoff: 1000.0,
            order: 8,
            min_sample_rate: 0.0,
        })];
        let err = EffectChainTemplate::new(&specs, EffectRole::Track, &PluggableRegistry::new(), synth.host())
            .unwrap_err();
        assert!(matches!(err, crate::error::SynthError::InvalidTemplate(_)));
    }

    #[test]
    fn formula_names_skip_pluggable_config() {
        let mut config = PluggableConfig::new();
        config.push_text("data", "transfer");
        let mut binding = PluggableBinding::new("user_effect", config);
        binding
            .params
            .insert("mix".into(), ControlSpec::Formula("mix_curve".into()));
        assert_eq!(EffectSpec::Pluggable(binding).formula_names(), ["mix_curve"]);
        let filters = gain_stage(ControlSpec::Formula("level".into()));
        assert_eq!(filters.formula_names(), ["level"]);
    }
}
