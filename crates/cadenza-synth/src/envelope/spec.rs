//! Envelope definitions and their resolved templates.

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec::Vec};

use crate::accent::{AccentVec, NUM_ACCENTS};
use crate::error::{Result, SynthError};
use crate::formula::{FormulaHost, FuncId, Signature, resolve};

/// Number of independent sustain points per envelope.
pub const NUM_SUSTAIN_POINTS: usize = 3;

/// Interpolation domain of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Transition {
    /// Straight line in amplitude.
    #[default]
    LinearAmplitude,
    /// Straight line in signed decibels above the clamp threshold.
    LinearDecibels,
}

/// How a phase endpoint is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetKind {
    /// The endpoint is the target value, scaled by overall scaling and loudness.
    #[default]
    Absolute,
    /// The endpoint multiplies the value at the start of the phase.
    Scaling,
}

/// Behavior of a sustain point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SustainKind {
    /// Holds after the phase; an early release jumps past it.
    Skip,
    /// Holds after the phase; an early release only cancels the hold.
    NoSkip,
    /// Never holds; an early release jumps past it.
    ReleaseSkip,
}

/// A sustain point attached to the end of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SustainPoint {
    /// Phase after which the point sits.
    pub phase: usize,
    /// Behavior on arrival and on release.
    pub kind: SustainKind,
}

impl SustainPoint {
    /// True for kinds that hold the envelope on arrival.
    pub fn holds(&self) -> bool {
        matches!(self.kind, SustainKind::Skip | SustainKind::NoSkip)
    }
}

/// One segment of an envelope.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvelopePhase {
    /// Duration in seconds before accent and pitch scaling.
    pub duration: f64,
    /// Endpoint before accent scaling.
    pub endpoint: f64,
    /// Interpolation domain.
    pub transition: Transition,
    /// Endpoint interpretation.
    pub target: TargetKind,
    /// Accent weights scaling the duration by `2^(accents · weights)`.
    pub accent_rate: AccentVec,
    /// Accent weights scaling the endpoint by `2^(accents · weights)`.
    pub accent_amp: AccentVec,
    /// Octaves of duration change per octave of pitch above `pitch_normal_hz`.
    pub pitch_rate_rolloff: f64,
    /// Pitch at which rate rolloff is neutral.
    pub pitch_normal_hz: f64,
    /// Formula `(duration, accent1..accent8, pitch_hz) -> duration`.
    pub duration_formula: Option<String>,
    /// Formula `(endpoint, accent1..accent8, pitch_hz) -> endpoint`.
    pub endpoint_formula: Option<String>,
}

impl Default for EnvelopePhase {
    fn default() -> Self {
        Self {
            duration: 0.0,
            endpoint: 0.0,
            transition: Transition::LinearAmplitude,
            target: TargetKind::Absolute,
            accent_rate: AccentVec::ZERO,
            accent_amp: AccentVec::ZERO,
            pitch_rate_rolloff: 0.0,
            pitch_normal_hz: 261.625_565_300_598_6,
            duration_formula: None,
            endpoint_formula: None,
        }
    }
}

impl EnvelopePhase {
    /// A linear-amplitude phase reaching `endpoint` after `duration` seconds.
    pub fn linear(duration: f64, endpoint: f64) -> Self {
        Self {
            duration,
            endpoint,
            ..Self::default()
        }
    }

    /// A decibel-domain phase reaching `endpoint` after `duration` seconds.
    pub fn decibel(duration: f64, endpoint: f64) -> Self {
        Self {
            duration,
            endpoint,
            transition: Transition::LinearDecibels,
            ..Self::default()
        }
    }
}

/// Immutable envelope definition shared by every note of an instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvelopeSpec {
    /// Ordered phases.
    pub phases: Vec<EnvelopePhase>,
    /// Value before the first phase.
    pub initial_value: f64,
    /// Multiplier for the initial value and absolute endpoints.
    pub overall_scaling: f64,
    /// Phase index that coincides with the note's nominal start.
    pub origin: usize,
    /// Up to three sustain points, indexed by release number.
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_slots"))]
    pub sustain: [Option<SustainPoint>; NUM_SUSTAIN_POINTS],
    /// Decibels of output change per octave of pitch above `pitch_amp_normal_hz`.
    pub pitch_amp_rolloff_db: f64,
    /// Pitch at which amplitude rolloff is neutral.
    pub pitch_amp_normal_hz: f64,
    /// Formula `(value, pitch_hz) -> value` applied to every output.
    pub transform: Option<String>,
}

impl Default for EnvelopeSpec {
    fn default() -> Self {
        Self {
            phases: Vec::new(),
            initial_value: 0.0,
            overall_scaling: 1.0,
            origin: 0,
            sustain: [None; NUM_SUSTAIN_POINTS],
            pitch_amp_rolloff_db: 0.0,
            pitch_amp_normal_hz: 261.625_565_300_598_6,
            transform: None,
        }
    }
}

impl EnvelopeSpec {
    /// An envelope that outputs `value` forever.
    pub fn constant(value: f64) -> Self {
        Self {
            initial_value: value,
            ..Self::default()
        }
    }

    /// An envelope starting at `initial_value` and running `phases`.
    pub fn with_phases(initial_value: f64, phases: Vec<EnvelopePhase>) -> Self {
        Self {
            phases,
            initial_value,
            ..Self::default()
        }
    }

    /// Names of every formula this envelope references, in declaration order.
    pub fn formula_names(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .flat_map(|p| [p.duration_formula.as_deref(), p.endpoint_formula.as_deref()])
            .chain(core::iter::once(self.transform.as_deref()))
            .flatten()
    }
}

/// Signature of per-phase duration and endpoint formulas.
pub fn phase_formula_signature() -> Signature {
    Signature::scalar(NUM_ACCENTS + 2)
}

/// Signature of the output transform formula.
pub fn transform_signature() -> Signature {
    Signature::scalar(2)
}

/// Resolved formula handles for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct PhaseFormulas {
    pub duration: Option<FuncId>,
    pub endpoint: Option<FuncId>,
}

/// An [`EnvelopeSpec`] checked against its invariants with formulas resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeTemplate {
    spec: EnvelopeSpec,
    formulas: Vec<PhaseFormulas>,
    transform: Option<FuncId>,
}

impl EnvelopeTemplate {
    /// Validates `spec` and resolves its formulas through `host`.
    pub fn new(spec: &EnvelopeSpec, host: &dyn FormulaHost) -> Result<Self> {
        let count = spec.phases.len();
        if spec.origin > count {
            return Err(SynthError::invalid_template(format!(
                "envelope origin {} exceeds phase count {count}",
                spec.origin
            )));
        }
        for point in spec.sustain.iter().flatten() {
            if point.phase >= count {
                return Err(SynthError::invalid_template(format!(
                    "sustain point on phase {} but envelope has {count} phases",
                    point.phase
                )));
            }
        }

        let signature = phase_formula_signature();
        let formulas = spec
            .phases
            .iter()
            .map(|phase| {
                Ok(PhaseFormulas {
                    duration: phase
                        .duration_formula
                        .as_deref()
                        .map(|name| resolve(host, name, &signature))
                        .transpose()?,
                    endpoint: phase
                        .endpoint_formula
                        .as_deref()
                        .map(|name| resolve(host, name, &signature))
                        .transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let transform = spec
            .transform
            .as_deref()
            .map(|name| resolve(host, name, &transform_signature()))
            .transpose()?;

        Ok(Self {
            spec: spec.clone(),
            formulas,
            transform,
        })
    }

    /// The validated definition.
    pub fn spec(&self) -> &EnvelopeSpec {
        &self.spec
    }

    /// Number of phases.
    pub fn phase_count(&self) -> usize {
        self.spec.phases.len()
    }

    pub(crate) fn formulas(&self) -> &[PhaseFormulas] {
        &self.formulas
    }

    pub(crate) fn transform(&self) -> Option<FuncId> {
        self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FunctionTable;

    #[test]
    fn rejects_sustain_past_end() {
        let mut spec = EnvelopeSpec::with_phases(0.0, vec![EnvelopePhase::linear(0.1, 1.0)]);
        spec.sustain[0] = Some(SustainPoint {
            phase: 1,
            kind: SustainKind::Skip,
        });
        let err = EnvelopeTemplate::new(&spec, &FunctionTable::new()).unwrap_err();
        assert!(matches!(err, SynthError::InvalidTemplate(_)));
    }

    #[test]
    fn rejects_origin_past_end() {
        let spec = EnvelopeSpec {
            origin: 2,
            ..EnvelopeSpec::with_phases(0.0, vec![EnvelopePhase::linear(0.1, 1.0)])
        };
        assert!(EnvelopeTemplate::new(&spec, &FunctionTable::new()).is_err());
    }

    #[test]
    fn resolves_phase_formulas() {
        let mut host = FunctionTable::new();
        host.register_scalar("slower", NUM_ACCENTS + 2, |a| a[0] * 2.0);
        let mut phase = EnvelopePhase::linear(0.1, 1.0);
        phase.duration_formula = Some("slower".into());
        let spec = EnvelopeSpec::with_phases(0.0, vec![phase]);
        let template = EnvelopeTemplate::new(&spec, &host).unwrap();
        assert!(template.formulas()[0].duration.is_some());
        assert_eq!(spec.formula_names().collect::<Vec<_>>(), ["slower"]);
    }

    #[test]
    fn reports_wrong_formula_shape() {
        let mut host = FunctionTable::new();
        host.register_scalar("shape", 1, |a| a[0]);
        let spec = EnvelopeSpec {
            transform: Some("shape".into()),
            ..EnvelopeSpec::constant(1.0)
        };
        assert!(matches!(
            EnvelopeTemplate::new(&spec, &host),
            Err(SynthError::FunctionTypeMismatch { .. })
        ));
    }
}
