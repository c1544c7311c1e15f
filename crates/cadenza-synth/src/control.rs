//! Per-tick control sources shared by filter slots and pluggable processors.
//!
//! A control is a constant, an envelope with LFOs (only available when a
//! note exists, so oscillator role), or a scalar formula over the track's
//! eight effect accents (track role).

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::accent::{AccentVec, NUM_ACCENTS};
use crate::effect::EffectRole;
use crate::envelope::EnvelopeParams;
use crate::error::{Result, SynthError};
use crate::formula::{FormulaHost, FuncId, Signature, eval_scalar, resolve};
use crate::modulation::{ModulatedParam, ModulatedSpec, ModulatedTemplate};

/// Source of one control value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ControlSpec {
    /// Fixed value.
    Constant(f64),
    /// Envelope plus LFOs (oscillator role).
    Modulated(ModulatedSpec),
    /// Formula over the eight effect accents (track role).
    Formula(String),
}

impl ControlSpec {
    /// Formula names referenced by this control.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        let (modulated, formula) = match self {
            Self::Constant(_) => (None, None),
            Self::Modulated(m) => (Some(m), None),
            Self::Formula(name) => (None, Some(name.as_str())),
        };
        modulated
            .into_iter()
            .flat_map(ModulatedSpec::formula_names)
            .chain(formula)
    }
}

/// Signature of track-role control formulas.
pub fn track_control_signature() -> Signature {
    Signature::scalar(NUM_ACCENTS)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlTemplate {
    Constant(f64),
    Modulated(ModulatedTemplate),
    Formula(FuncId),
}

impl ControlTemplate {
    pub(crate) fn new(spec: &ControlSpec, role: EffectRole, host: &dyn FormulaHost) -> Result<Self> {
        match (spec, role) {
            (ControlSpec::Constant(v), _) => Ok(Self::Constant(*v)),
            (ControlSpec::Modulated(m), EffectRole::Oscillator) => {
                Ok(Self::Modulated(ModulatedTemplate::new(m, host)?))
            }
            (ControlSpec::Formula(name), EffectRole::Track) => {
                Ok(Self::Formula(resolve(host, name, &track_control_signature())?))
            }
            (ControlSpec::Modulated(_), EffectRole::Track) => Err(SynthError::invalid_template(
                "envelope-driven controls need an oscillator",
            )),
            (ControlSpec::Formula(_), EffectRole::Oscillator) => Err(SynthError::invalid_template(
                "formula-driven controls belong on track effects",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ControlState {
    Constant(f64),
    Modulated(ModulatedParam),
    Formula(FuncId),
}

impl ControlState {
    /// Instantiates a control and returns it with its value before the first
    /// tick. Alignment of modulated controls is left to the owner.
    pub(crate) fn new(
        template: &ControlTemplate,
        note: Option<&EnvelopeParams<'_>>,
        accents: &AccentVec,
        host: &dyn FormulaHost,
    ) -> Result<(Self, f64)> {
        Ok(match template {
            ControlTemplate::Constant(v) => (Self::Constant(*v), *v),
            ControlTemplate::Formula(id) => {
                (Self::Formula(*id), eval_scalar(host, *id, accents.as_slice())?)
            }
            ControlTemplate::Modulated(t) => {
                let params = note.ok_or_else(|| {
                    SynthError::invalid_template("envelope-driven control without a note")
                })?;
                let m = ModulatedParam::new(t, params, host)?.into_child();
                let value = m.initial_value();
                (Self::Modulated(m), value)
            }
        })
    }

    pub(crate) fn update(
        &mut self,
        pitch_hz: f64,
        accents: &AccentVec,
        host: &dyn FormulaHost,
    ) -> Result<f64> {
        match self {
            Self::Constant(v) => Ok(*v),
            Self::Modulated(m) => m.update(pitch_hz, host),
            Self::Formula(id) => eval_scalar(host, *id, accents.as_slice()),
        }
    }

    pub(crate) fn modulated_mut(&mut self) -> Option<&mut ModulatedParam> {
        match self {
            Self::Modulated(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn modulated(&self) -> Option<&ModulatedParam> {
        match self {
            Self::Modulated(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FunctionTable;

    #[test]
    fn formula_names_cover_every_source() {
        assert_eq!(ControlSpec::Constant(1.0).formula_names().count(), 0);
        let formula = ControlSpec::Formula("cutoff_curve".into());
        assert_eq!(formula.formula_names().collect::<Vec<_>>(), ["cutoff_curve"]);
    }

    #[test]
    fn formula_controls_read_effect_accents() {
        let mut host = FunctionTable::new();
        host.register_scalar("second", NUM_ACCENTS, |a| a[1] * 10.0);
        let template = ControlTemplate::new(
            &ControlSpec::Formula("second".into()),
            EffectRole::Track,
            &host,
        )
        .unwrap();
        let mut accents = AccentVec::ZERO;
        accents[1] = 0.5;
        let (mut state, initial) = ControlState::new(&template, None, &accents, &host).unwrap();
        assert_eq!(initial, 5.0);
        accents[1] = 0.25;
        assert_eq!(state.update(0.0, &accents, &host).unwrap(), 2.5);
    }

    #[test]
    fn formula_signature_is_checked() {
        let mut host = FunctionTable::new();
        host.register_scalar("unary", 1, |a| a[0]);
        let err = ControlTemplate::new(&ControlSpec::Formula("unary".into()), EffectRole::Track, &host)
            .unwrap_err();
        assert!(matches!(err, SynthError::FunctionTypeMismatch { .. }));
    }
}
