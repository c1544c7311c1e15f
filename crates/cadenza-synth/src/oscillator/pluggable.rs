//! Registry processors driven as oscillator sources.

use super::OscCommon;
use crate::accent::AccentVec;
use crate::context::SynthParams;
use crate::envelope::EnvelopeParams;
use crate::error::Result;
use crate::formula::FormulaHost;
use crate::origin::OriginAligned;
use crate::pluggable::{PluggableEffect, PluggableInputs, PluggableTemplate};

/// A registry processor used as a sound source: it runs on a silent block
/// and its output is mixed with the oscillator's gains.
#[derive(Debug)]
pub struct PluggableOscillator {
    effect: PluggableEffect,
}

impl PluggableOscillator {
    pub(super) fn new(
        template: &PluggableTemplate,
        params: &EnvelopeParams<'_>,
        synth: &SynthParams,
    ) -> Result<Self> {
        let effect = PluggableEffect::new_oscillator(template, params, synth)?.into_child();
        Ok(Self { effect })
    }

    pub(super) fn update(&mut self, common: &OscCommon, host: &dyn FormulaHost) -> Result<()> {
        let inputs = PluggableInputs {
            pitch_hz: common.pitch_hz(),
            loudness: common.loudness(),
            accents: &AccentVec::ZERO,
        };
        self.effect.update(&inputs, host)
    }

    pub(super) fn generate(
        &mut self,
        common: &OscCommon,
        left: &mut [f32],
        right: &mut [f32],
        synth: &SynthParams,
    ) -> Result<()> {
        let len = left.len().min(right.len());
        let mut source_l = synth.acquire(len)?;
        let mut source_r = synth.acquire(len)?;
        self.effect.apply(&mut source_l, &mut source_r, synth)?;
        common.mix_stereo(&source_l, &source_r, left, right, synth.interpolate_intra_tick());
        Ok(())
    }

    pub(super) fn key_up_sustain(&mut self, index: usize) {
        self.effect.key_up_sustain(index);
    }

    pub(super) fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        self.effect.retrigger_from_origin(params, host)
    }

    pub(super) fn pre_origin_ticks(&self) -> u32 {
        self.effect.pre_origin_ticks()
    }

    pub(super) fn fix_origin(&mut self, max_pre_origin: u32) {
        self.effect.fix_origin(max_pre_origin);
    }

    /// Current processor parameter values.
    pub fn values(&self) -> &[f64] {
        self.effect.values()
    }
}
