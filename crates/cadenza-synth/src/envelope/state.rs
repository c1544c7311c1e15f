//! Per-note envelope evaluation.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::{
    LinearTransition, RoundingCarry, db_to_linear_f64, exp_seg_endpoint_to_linear,
    exp_seg_endpoint_to_log,
};
use libm::{exp2, log2};

use super::spec::{EnvelopeTemplate, NUM_SUSTAIN_POINTS, SustainKind, TargetKind, Transition};
use crate::accent::{AccentVec, NUM_ACCENTS};
use crate::error::Result;
use crate::formula::{FormulaHost, eval_scalar};
use crate::origin::{OriginAligned, Staged};

/// Note-dependent inputs to envelope construction.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeParams<'a> {
    /// Frozen note accents.
    pub accents: &'a AccentVec,
    /// Track accents sampled at construction.
    pub live_accents: &'a AccentVec,
    /// Note pitch in Hz.
    pub pitch_hz: f64,
    /// Note loudness multiplier.
    pub loudness: f64,
    /// Duration divisor (2.0 runs every phase twice as fast).
    pub hurry_up: f64,
    /// Envelope ticks per second.
    pub envelope_rate: f64,
}

/// Which update rule the next tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Stepping a linear-amplitude segment.
    LinearAbsolute,
    /// Stepping a decibel-domain segment.
    LinearDecibel,
    /// Holding at a sustain point.
    Sustain,
    /// Past the final phase, holding the last value.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PhaseRecord {
    ticks: u32,
    endpoint: f64,
    transition: Transition,
    target: TargetKind,
}

/// Evaluation state of one envelope for one note.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeState {
    template: Arc<EnvelopeTemplate>,
    phases: Vec<PhaseRecord>,
    current: usize,
    mode: UpdateMode,
    transition: LinearTransition,
    target: f64,
    value: f64,
    initial_value: f64,
    armed: [bool; NUM_SUSTAIN_POINTS],
    exponential: bool,
    pre_origin: u32,
    start_countdown: u32,
}

impl EnvelopeState {
    /// Builds the state for one note.
    ///
    /// Phase durations and endpoints are computed once here: formulas see
    /// the note accents plus the live track accents, and durations are
    /// rounded to ticks with a carried residual so the total never drifts.
    pub fn new(
        template: &Arc<EnvelopeTemplate>,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<Staged<Self>> {
        let (phases, initial_value) = compute_phases(template, params, host)?;
        let origin = template.spec().origin;
        let pre_origin = phases[..origin]
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.ticks));
        let armed = template.spec().sustain.map(|p| p.is_some());

        let mut state = Self {
            template: Arc::clone(template),
            phases,
            current: 0,
            mode: UpdateMode::Finished,
            transition: LinearTransition::settled(initial_value),
            target: initial_value,
            value: initial_value,
            initial_value,
            armed,
            exponential: false,
            pre_origin,
            start_countdown: 0,
        };
        state.enter_phase(0, initial_value);
        Ok(Staged::new(state))
    }

    /// Advances one tick and returns the output value.
    pub fn update(&mut self, pitch_hz: f64, host: &dyn FormulaHost) -> Result<f64> {
        if self.start_countdown > 0 {
            self.start_countdown -= 1;
            return self.output(pitch_hz, host);
        }
        match self.mode {
            UpdateMode::LinearAbsolute => {
                self.exponential = false;
                self.value = self.transition.step();
                if self.transition.is_done() {
                    self.value = self.target;
                    self.complete_current();
                }
            }
            UpdateMode::LinearDecibel => {
                self.exponential = true;
                let log_value = self.transition.step();
                if self.transition.is_done() {
                    self.value = self.target;
                    self.complete_current();
                } else {
                    self.value = exp_seg_endpoint_to_linear(log_value);
                }
            }
            UpdateMode::Sustain | UpdateMode::Finished => {}
        }
        self.output(pitch_hz, host)
    }

    /// Releases sustain point `index` (0..3).
    ///
    /// Does nothing if the point is undefined, already released, or already
    /// passed. While holding at the point the envelope moves on to the next
    /// phase. Before the point, `NoSkip` only cancels the future hold while
    /// `Skip` and `ReleaseSkip` jump straight to the phase after it.
    pub fn key_up_sustain(&mut self, index: usize) {
        let Some(point) = self.template.spec().sustain.get(index).copied().flatten() else {
            return;
        };
        if !self.armed[index] || self.mode == UpdateMode::Finished || self.current > point.phase {
            return;
        }
        let holding_here = self.mode == UpdateMode::Sustain && self.current == point.phase;
        self.armed[index] = false;
        if holding_here {
            if !self.holds_at(point.phase) {
                self.enter_phase(point.phase + 1, self.value);
            }
            return;
        }
        if point.kind == SustainKind::NoSkip {
            return;
        }
        self.enter_phase(point.phase + 1, self.value);
    }

    /// Recomputes every phase for a tie continuation and restarts at the
    /// origin from the current value.
    pub fn retrigger_from_origin(
        &mut self,
        params: &EnvelopeParams<'_>,
        host: &dyn FormulaHost,
    ) -> Result<()> {
        let (phases, _) = compute_phases(&self.template, params, host)?;
        self.phases = phases;
        self.armed = self.template.spec().sustain.map(|p| p.is_some());
        self.start_countdown = 0;
        self.enter_phase(self.template.spec().origin, self.value);
        Ok(())
    }

    /// True once the final phase has completed.
    pub fn is_at_end(&self) -> bool {
        self.mode == UpdateMode::Finished
    }

    /// Whether the most recent value came from a decibel-domain segment.
    pub fn is_exponential_segment(&self) -> bool {
        self.exponential
    }

    /// Last raw value, before pitch scaling and transform.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Initial value after overall scaling and loudness.
    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    /// Index of the active phase (equal to the phase count once finished).
    pub fn current_phase(&self) -> usize {
        self.current
    }

    /// Active update rule.
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Rounded tick count of every phase.
    pub fn phase_ticks(&self) -> impl Iterator<Item = u32> + '_ {
        self.phases.iter().map(|p| p.ticks)
    }

    /// Ticks still to wait before the first phase starts moving.
    pub fn start_countdown(&self) -> u32 {
        self.start_countdown
    }

    fn output(&self, pitch_hz: f64, host: &dyn FormulaHost) -> Result<f64> {
        let spec = self.template.spec();
        let mut out = self.value;
        if spec.pitch_amp_rolloff_db != 0.0 && pitch_hz > 0.0 && spec.pitch_amp_normal_hz > 0.0 {
            let octaves = log2(pitch_hz / spec.pitch_amp_normal_hz);
            out *= db_to_linear_f64(spec.pitch_amp_rolloff_db * octaves);
        }
        if let Some(id) = self.template.transform() {
            out = eval_scalar(host, id, &[out, pitch_hz])?;
        }
        Ok(out)
    }

    fn holds_at(&self, phase: usize) -> bool {
        self.template
            .spec()
            .sustain
            .iter()
            .zip(self.armed)
            .any(|(point, armed)| armed && point.is_some_and(|p| p.phase == phase && p.holds()))
    }

    fn complete_current(&mut self) {
        if self.holds_at(self.current) {
            self.mode = UpdateMode::Sustain;
        } else {
            self.enter_phase(self.current + 1, self.value);
        }
    }

    fn enter_phase(&mut self, mut index: usize, mut from: f64) {
        loop {
            let Some(&record) = self.phases.get(index) else {
                self.current = self.phases.len();
                self.mode = UpdateMode::Finished;
                self.value = from;
                return;
            };
            let target = match record.target {
                TargetKind::Absolute => record.endpoint,
                TargetKind::Scaling => from * record.endpoint,
            };
            self.current = index;
            if record.ticks == 0 {
                self.value = target;
                self.exponential = record.transition == Transition::LinearDecibels;
                from = target;
                if self.holds_at(index) {
                    self.mode = UpdateMode::Sustain;
                    return;
                }
                index += 1;
                continue;
            }
            self.value = from;
            self.target = target;
            match record.transition {
                Transition::LinearAmplitude => {
                    self.transition = LinearTransition::new(from, target, record.ticks);
                    self.mode = UpdateMode::LinearAbsolute;
                }
                Transition::LinearDecibels => {
                    self.transition = LinearTransition::new(
                        exp_seg_endpoint_to_log(from),
                        exp_seg_endpoint_to_log(target),
                        record.ticks,
                    );
                    self.mode = UpdateMode::LinearDecibel;
                }
            }
            return;
        }
    }
}

impl OriginAligned for EnvelopeState {
    fn pre_origin_ticks(&self) -> u32 {
        self.pre_origin
    }

    fn fix_origin(&mut self, max_pre_origin: u32) {
        self.start_countdown = max_pre_origin.saturating_sub(self.pre_origin);
    }
}

fn formula_args(base: f64, accents: &AccentVec, pitch_hz: f64) -> [f64; NUM_ACCENTS + 2] {
    let mut args = [0.0; NUM_ACCENTS + 2];
    args[0] = base;
    args[1..=NUM_ACCENTS].copy_from_slice(accents.as_slice());
    args[NUM_ACCENTS + 1] = pitch_hz;
    args
}

fn compute_phases(
    template: &EnvelopeTemplate,
    params: &EnvelopeParams<'_>,
    host: &dyn FormulaHost,
) -> Result<(Vec<PhaseRecord>, f64)> {
    let spec = template.spec();
    let accents = params.accents.combined(params.live_accents);
    let scale = spec.overall_scaling * params.loudness;
    let hurry_up = params.hurry_up.max(1e-9);
    let mut carry = RoundingCarry::new();

    let mut phases = Vec::with_capacity(spec.phases.len());
    for (phase, formulas) in spec.phases.iter().zip(template.formulas()) {
        let mut duration = phase.duration;
        if let Some(id) = formulas.duration {
            duration = eval_scalar(host, id, &formula_args(duration, &accents, params.pitch_hz))?;
        }
        duration *= exp2(accents.dot(&phase.accent_rate));
        if phase.pitch_rate_rolloff != 0.0 && params.pitch_hz > 0.0 && phase.pitch_normal_hz > 0.0 {
            duration *= exp2(-phase.pitch_rate_rolloff * log2(params.pitch_hz / phase.pitch_normal_hz));
        }
        duration /= hurry_up;
        let ticks = carry
            .round((duration * params.envelope_rate).max(0.0))
            .clamp(0, i64::from(u32::MAX)) as u32;

        let mut endpoint = phase.endpoint;
        if let Some(id) = formulas.endpoint {
            endpoint = eval_scalar(host, id, &formula_args(endpoint, &accents, params.pitch_hz))?;
        }
        endpoint *= exp2(accents.dot(&phase.accent_amp));
        if phase.target == TargetKind::Absolute {
            endpoint *= scale;
        }

        phases.push(PhaseRecord {
            ticks,
            endpoint,
            transition: phase.transition,
            target: phase.target,
        });
    }
    Ok((phases, spec.initial_value * scale))
}
