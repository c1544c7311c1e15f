//! Envelope-plus-LFO parameter sources.
//!
//! Every continuously controlled oscillator or filter parameter is a
//! [`ModulatedParam`]: an envelope whose output is fed through a list of
//! LFOs.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use crate::envelope::{EnvelopeParams, EnvelopeSpec, EnvelopeState, EnvelopeTemplate};
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::lfo::{LfoList, LfoScaling, LfoSpec, LfoTemplate};
use crate::origin::{OriginAligned, Staged};

/// An envelope and the LFOs applied to it.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModulatedSpec {
    /// Base envelope.
    pub envelope: EnvelopeSpec,
    /// LFOs applied in order.
    pub lfos: Vec<LfoSpec>,
}

impl ModulatedSpec {
    /// A constant value with no LFOs.
    pub fn constant(value: f64) -> Self {
        Self {
            envelope: EnvelopeSpec::constant(value),
            lfos: Vec::new(),
        }
    }

    /// An envelope with no LFOs.
    pub fn envelope(envelope: EnvelopeSpec) -> Self {
        Self {
            envelope,
            lfos: Vec::new(),
        }
    }

    /// Names of every formula referenced by the envelope and LFOs.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        self.envelope
            .formula_names()
            .chain(self.lfos.iter().flat_map(LfoSpec::formula_names))
    }
}

/// Resolved [`ModulatedSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatedTemplate {
    envelope: Arc<EnvelopeTemplate>,
    lfos: Vec<Arc<LfoTemplate>>,
}

impl ModulatedTemplate {
    /// Validates the envelope and every LFO.
    pub fn new(spec: &ModulatedSpec, host: &dyn FormulaHost) -> Result<Self> {
        Ok(Self {
            envelope: Arc::new(EnvelopeTemplate::new(&spec.envelope, host)?),
            lfos: spec
                .lfos
                .iter()
                .map(|lfo| LfoTemplate::new(lfo, host).map(Arc::new))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// The envelope template.
    pub fn envelope(&self) -> &Arc<EnvelopeTemplate> {
        &self.envelope
    }

    /// The LFO templates.
    pub fn lfos(&self) -> &[Arc<LfoTemplate>] {
        &self.lfos
    }
}

/// Per-note evaluation of a [`ModulatedTemplate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModulatedParam {
    envelope: EnvelopeState,
    lfos: LfoList,
}

impl ModulatedParam {
    /// Builds the envelope and LFO states.
    pub fn new(
        template: &ModulatedTemplate,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<Staged<Self>> {
        let envelope = EnvelopeState::new(&template.envelope, params, host)?.into_child();
        let lfos = LfoList::new(&template.lfos, params, LfoScaling::UNITY, host)?.into_child();
        Ok(Staged::new(Self { envelope, lfos }))
    }

    /// Advances one tick and returns the modulated value.
    pub fn update(&mut self, pitch_hz: f64, host: &dyn FormulaHost) -> Result<f64> {
        let base = self.envelope.update(pitch_hz, host)?;
        self.lfos.update(base, pitch_hz, host)
    }

    /// Value before the first tick.
    pub fn initial_value(&self) -> f64 {
        self.lfos.initial_value(self.envelope.value())
    }

    /// Releases sustain point `index` on the envelope and every LFO.
    pub fn key_up_sustain(&mut self, index: usize) {
        self.envelope.key_up_sustain(index);
        self.lfos.key_up_sustain(index);
    }

    /// Restarts the envelope and LFOs at their origins.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        self.envelope.retrigger_from_origin(params, host)?;
        self.lfos.retrigger_from_origin(params, host)
    }

    /// True once the envelope has finished.
    pub fn is_at_end(&self) -> bool {
        self.envelope.is_at_end()
    }

    /// Whether the last envelope value came from a decibel segment.
    pub fn is_exponential_segment(&self) -> bool {
        self.envelope.is_exponential_segment()
    }

    /// Whether any LFO is sample-and-hold.
    pub fn is_sample_and_hold(&self) -> bool {
        self.lfos.is_sample_and_hold()
    }

    /// The underlying envelope.
    pub fn envelope(&self) -> &EnvelopeState {
        &self.envelope
    }
}

impl OriginAligned for ModulatedParam {
    fn pre_origin_ticks(&self) -> u32 {
        self.envelope.pre_origin_ticks().max(self.lfos.pre_origin_ticks())
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        self.envelope.fix_origin(max_pre_origin);
        self.lfos.fix_origin(max_pre_origin);
    }
}
