//! Oscillator bank: every oscillator of an instrument playing one note.
//!
//! The bank owns the per-note sequencing around the oscillators: release
//! countdowns, portamento between tied notes, and the pitch LFO. Each
//! envelope tick the driver calls [`OscBankState::generate_envelopes`]
//! once, then [`OscBankState::apply`] to render the tick's block.
//!
//! Construction is two-stage. Every component reports how many ticks it
//! needs before the note's origin; the bank takes the maximum and delays
//! each component so they all reach their origin together. The returned
//! start offset tells the driver how many ticks early to begin.

#[cfg(not(feature = "std"))]
use alloc::{sync::Arc, vec::Vec};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::{LinearTransition, half_steps_to_hz, hz_to_half_steps};

use crate::context::SynthParams;
use crate::effect::{EffectChain, EffectChainTemplate, EffectRole, EffectSpec, QuiescenceSpec};
use crate::envelope::EnvelopeParams;
use crate::error::Result;
use crate::lfo::{LfoList, LfoScaling, LfoSpec, LfoTemplate};
use crate::note::{FrozenNote, NUM_RELEASES, ReleaseOrigin, ReleasePoint};
use crate::origin::{OriginAligned, Staged};
use crate::oscillator::{Oscillator, OscillatorSpec, OscillatorTemplate};
use crate::pluggable::PluggableRegistry;
use crate::wavetable::WaveLibrary;

/// Domain in which portamento glides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PortamentoMode {
    /// Linear in half steps (exponential in Hz).
    #[default]
    HalfSteps,
    /// Linear in Hz.
    Hertz,
}

/// A complete instrument definition.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InstrumentSpec {
    /// Oscillator slots.
    pub oscillators: Vec<OscillatorSpec>,
    /// LFOs applied to the note pitch, in Hz.
    pub pitch_lfo: Vec<LfoSpec>,
    /// Effects applied to the sum of the oscillators, per note.
    pub combined_effects: Vec<EffectSpec>,
    /// Effects applied to the track's mix.
    pub track_effects: Vec<EffectSpec>,
    /// Auto-quiescence for the track effects.
    pub quiescence: Option<QuiescenceSpec>,
    /// Portamento domain.
    pub portamento: PortamentoMode,
    /// Start the glide before the tied note rather than on it.
    pub portamento_before_note: bool,
}

/// Resolved [`InstrumentSpec`], shared by every note.
#[derive(Debug)]
pub struct OscBankTemplate {
    oscillators: Vec<OscillatorTemplate>,
    pitch_lfo: Vec<Arc<LfoTemplate>>,
    combined: Option<EffectChainTemplate>,
    track: EffectChainTemplate,
    quiescence: Option<QuiescenceSpec>,
    portamento: PortamentoMode,
    portamento_before_note: bool,
}

impl OscBankTemplate {
    /// Resolves every oscillator, LFO and effect of `spec`.
    pub fn new(
        spec: &InstrumentSpec,
        library: &WaveLibrary,
        registry: &PluggableRegistry,
        synth: &SynthParams,
    ) -> Result<Arc<Self>> {
        let host = synth.host();
        let oscillators = spec
            .oscillators
            .iter()
            .map(|o| OscillatorTemplate::new(o, library, registry, host))
            .collect::<Result<Vec<_>>>()?;
        let pitch_lfo = spec
            .pitch_lfo
            .iter()
            .map(|l| LfoTemplate::new(l, host).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let combined = if spec.combined_effects.is_empty() {
            None
        } else {
            Some(EffectChainTemplate::new(
                &spec.combined_effects,
                EffectRole::Oscillator,
                registry,
                host,
            )?)
        };
        let track = EffectChainTemplate::new(&spec.track_effects, EffectRole::Track, registry, host)?;
        Ok(Arc::new(Self {
            oscillators,
            pitch_lfo,
            combined,
            track,
            quiescence: spec.quiescence,
            portamento: spec.portamento,
            portamento_before_note: spec.portamento_before_note,
        }))
    }

    /// Track-role effect chain for the instrument's track.
    pub fn track_effects(&self) -> &EffectChainTemplate {
        &self.track
    }

    /// Quiescence settings for the track effects.
    pub fn quiescence(&self) -> Option<&QuiescenceSpec> {
        self.quiescence.as_ref()
    }

    /// Number of oscillator slots.
    pub fn len(&self) -> usize {
        self.oscillators.len()
    }

    /// True when the instrument has no oscillators.
    pub fn is_empty(&self) -> bool {
        self.oscillators.is_empty()
    }
}

/// Everything a bank needs to start a note.
#[derive(Debug, Clone, PartialEq)]
pub struct BankStart {
    /// The note, combined with the track state.
    pub note: FrozenNote,
    /// Envelope ticks per duration tick at the current tempo.
    pub ticks_per_duration_tick: f64,
    /// Frequency multiplier applied on top of the note pitch.
    pub pitch_adjust: f64,
}

impl BankStart {
    /// A start with no pitch adjustment.
    pub fn new(note: FrozenNote, ticks_per_duration_tick: f64) -> Self {
        Self {
            note,
            ticks_per_duration_tick,
            pitch_adjust: 1.0,
        }
    }

    fn pitch_hz(&self) -> f64 {
        self.note.pitch_hz * self.pitch_adjust
    }
}

#[derive(Debug)]
struct OscSlot {
    osc: Oscillator,
    effects: Option<EffectChain>,
}

#[derive(Debug, Clone, Copy)]
struct Glide {
    transition: LinearTransition,
    mode: PortamentoMode,
}

impl Glide {
    fn step(&mut self) -> f64 {
        let v = self.transition.step();
        match self.mode {
            PortamentoMode::HalfSteps => half_steps_to_hz(v),
            PortamentoMode::Hertz => v,
        }
    }
}

/// One note playing on an instrument.
#[derive(Debug)]
pub struct OscBankState {
    template: Arc<OscBankTemplate>,
    note: FrozenNote,
    slots: Vec<OscSlot>,
    pitch_lfo: LfoList,
    combined: Option<EffectChain>,
    releases: [Option<u32>; NUM_RELEASES],
    glide: Option<Glide>,
    base_hz: f64,
    pitch_hz: f64,
    max_pre_origin: u32,
}

impl OscBankState {
    /// Builds every component for `start` and aligns their origins.
    ///
    /// Returns the bank and the tick, relative to the note's nominal start,
    /// at which the driver must begin calling
    /// [`generate_envelopes`](Self::generate_envelopes). Negative means
    /// that many ticks early.
    pub fn new(
        template: &Arc<OscBankTemplate>,
        start: &BankStart,
        synth: &SynthParams,
    ) -> Result<(Self, i64)> {
        let host = synth.host();
        let note = &start.note;
        let params = note.envelope_params(synth.envelope_rate());
        let scaling = LfoScaling {
            amplitude: note.pitch_disp_depth,
            rate: note.pitch_disp_rate,
        };

        let unit = EnvelopeParams {
            loudness: 1.0,
            ..params
        };
        let pitch_lfo = LfoList::new(&template.pitch_lfo, &unit, scaling, host)?;
        let mut staged = Vec::with_capacity(template.oscillators.len());
        for osc in &template.oscillators {
            let effects = osc
                .effects()
                .map(|t| EffectChain::new_oscillator(t, &params, synth))
                .transpose()?;
            staged.push((osc.instantiate(note, synth)?, effects));
        }
        let combined = template
            .combined
            .as_ref()
            .map(|t| EffectChain::new_oscillator(t, &params, synth))
            .transpose()?;

        let max_pre_origin = staged
            .iter()
            .flat_map(|(o, e)| [Some(o.pre_origin_ticks()), e.as_ref().map(Staged::pre_origin_ticks)])
            .flatten()
            .chain(combined.as_ref().map(Staged::pre_origin_ticks))
            .chain([pitch_lfo.pre_origin_ticks()])
            .max()
            .unwrap_or(0);

        let slots = staged
            .into_iter()
            .map(|(osc, effects)| OscSlot {
                osc: osc.align(max_pre_origin),
                effects: effects.map(|e| e.align(max_pre_origin)),
            })
            .collect::<Vec<_>>();
        let pitch_lfo = pitch_lfo.align(max_pre_origin);
        let combined = combined.map(|c| c.align(max_pre_origin));

        let base_hz = start.pitch_hz();
        let releases = schedule_releases(note, start.ticks_per_duration_tick, max_pre_origin);
        let when = libm::round(note.early_late * synth.envelope_rate()) as i64 - i64::from(max_pre_origin);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "bank started: {} oscillators, max pre-origin {max_pre_origin} ticks, start at {when}",
            slots.len()
        );

        Ok((
            Self {
                template: Arc::clone(template),
                note: note.clone(),
                slots,
                pitch_lfo,
                combined,
                releases,
                glide: None,
                base_hz,
                pitch_hz: base_hz,
                max_pre_origin,
            },
            when,
        ))
    }

    /// Advances the bank one envelope tick.
    ///
    /// Release countdowns always advance, and a release that comes due is
    /// broadcast before anything else updates. With `release_timer_only`
    /// nothing else moves and the bank reports itself running. Returns
    /// whether any oscillator is still running.
    pub fn generate_envelopes(&mut self, release_timer_only: bool, synth: &SynthParams) -> Result<bool> {
        for index in 0..NUM_RELEASES {
            match self.releases[index] {
                Some(0) => {
                    self.releases[index] = None;
                    self.key_up_sustain(index);
                }
                Some(n) => self.releases[index] = Some(n - 1),
                None => {}
            }
        }
        if release_timer_only {
            return Ok(true);
        }

        let host = synth.host();
        if let Some(glide) = &mut self.glide {
            self.base_hz = glide.step();
            if glide.transition.is_done() {
                self.glide = None;
            }
        }
        self.pitch_hz = self.pitch_lfo.update(self.base_hz, self.base_hz, host)?;
        for slot in &mut self.slots {
            slot.osc.update_envelopes(self.pitch_hz, host)?;
            if let Some(effects) = &mut slot.effects {
                let common = slot.osc.common();
                effects.osc_update(common.pitch_hz(), common.loudness(), host)?;
            }
        }
        if let Some(combined) = &mut self.combined {
            combined.osc_update(self.pitch_hz, self.note.loudness, host)?;
        }
        Ok(!self.is_finished())
    }

    /// Renders one tick's block and adds it to `left`/`right`.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let Some(combined) = &mut self.combined else {
            return render_slots(&mut self.slots, left, right, synth);
        };
        let len = left.len().min(right.len());
        let mut mix_l = synth.acquire(len)?;
        let mut mix_r = synth.acquire(len)?;
        render_slots(&mut self.slots, &mut mix_l, &mut mix_r, synth)?;
        combined.apply(&mut mix_l, &mut mix_r, synth)?;
        accumulate(&mix_l, &mix_r, left, right);
        Ok(())
    }

    /// Continues into a tied note: retriggers every envelope at its origin,
    /// reschedules releases, and starts a portamento glide to the new pitch.
    ///
    /// Returns how many ticks before the new note the driver should make
    /// this call: the glide length when the instrument glides before the
    /// note, otherwise zero.
    pub fn restart_from_tie(&mut self, start: &BankStart, synth: &SynthParams) -> Result<u32> {
        let host = synth.host();
        let note = &start.note;
        let params = note.envelope_params(synth.envelope_rate());
        for slot in &mut self.slots {
            slot.osc.retrigger_from_origin(note, synth)?;
            if let Some(effects) = &mut slot.effects {
                effects.retrigger_from_origin(&params, host)?;
            }
        }
        self.pitch_lfo.retrigger_from_origin(
            &EnvelopeParams {
                loudness: 1.0,
                ..params
            },
            host,
        )?;
        if let Some(combined) = &mut self.combined {
            combined.retrigger_from_origin(&params, host)?;
        }

        let target = start.pitch_hz();
        let ticks = libm::round((note.portamento * start.ticks_per_duration_tick).max(0.0)) as u32;
        let mode = self.template.portamento;
        self.glide = (ticks > 0 && target != self.base_hz).then(|| {
            let transition = match mode {
                PortamentoMode::HalfSteps => {
                    LinearTransition::new(hz_to_half_steps(self.base_hz), hz_to_half_steps(target), ticks)
                }
                PortamentoMode::Hertz => LinearTransition::new(self.base_hz, target, ticks),
            };
            Glide { transition, mode }
        });
        if self.glide.is_none() {
            self.base_hz = target;
        }
        self.releases = schedule_releases(note, start.ticks_per_duration_tick, 0);
        self.note = note.clone();

        #[cfg(feature = "tracing")]
        tracing::debug!("tie restart: glide {ticks} ticks to {target:.2} Hz");

        Ok(if self.template.portamento_before_note { ticks } else { 0 })
    }

    /// Releases every sustain point now and cancels pending releases.
    pub fn force_release(&mut self) {
        self.releases = [None; NUM_RELEASES];
        for index in 0..NUM_RELEASES {
            self.key_up_sustain(index);
        }
    }

    /// True once every oscillator has finished.
    pub fn is_finished(&self) -> bool {
        self.slots.iter().all(|s| s.osc.is_finished())
    }

    /// The oscillators, in slot order.
    pub fn oscillators(&self) -> impl Iterator<Item = &Oscillator> {
        self.slots.iter().map(|s| &s.osc)
    }

    /// Pitch after portamento and the pitch LFO.
    pub fn pitch_hz(&self) -> f64 {
        self.pitch_hz
    }

    /// Largest lead-in among the bank's components.
    pub fn max_pre_origin(&self) -> u32 {
        self.max_pre_origin
    }

    /// Ticks left before each release fires, if scheduled.
    pub fn pending_releases(&self) -> [Option<u32>; NUM_RELEASES] {
        self.releases
    }

    /// The note being played.
    pub fn note(&self) -> &FrozenNote {
        &self.note
    }

    fn key_up_sustain(&mut self, index: usize) {
        #[cfg(feature = "tracing")]
        tracing::debug!("release {} broadcast", index + 1);
        for slot in &mut self.slots {
            slot.osc.key_up_sustain(index);
            if let Some(effects) = &mut slot.effects {
                effects.key_up_sustain(index);
            }
        }
        self.pitch_lfo.key_up_sustain(index);
        if let Some(combined) = &mut self.combined {
            combined.key_up_sustain(index);
        }
    }
}

fn render_slots(
    slots: &mut [OscSlot],
    left: &mut [f32],
    right: &mut [f32],
    synth: &SynthParams,
) -> Result<()> {
    for slot in slots {
        let Some(effects) = &mut slot.effects else {
            slot.osc.generate(left, right, synth)?;
            continue;
        };
        let len = left.len().min(right.len());
        let mut osc_l = synth.acquire(len)?;
        let mut osc_r = synth.acquire(len)?;
        slot.osc.generate(&mut osc_l, &mut osc_r, synth)?;
        effects.apply(&mut osc_l, &mut osc_r, synth)?;
        accumulate(&osc_l, &osc_r, left, right);
    }
    Ok(())
}

fn accumulate(in_left: &[f32], in_right: &[f32], left: &mut [f32], right: &mut [f32]) {
    for (out, x) in left.iter_mut().zip(in_left) {
        *out += x;
    }
    for (out, x) in right.iter_mut().zip(in_right) {
        *out += x;
    }
}

/// Countdown for each release; tied notes never schedule from-end releases.
fn schedule_releases(
    note: &FrozenNote,
    ticks_per_duration_tick: f64,
    lead_in: u32,
) -> [Option<u32>; NUM_RELEASES] {
    note.releases.map(|release| {
        let ReleasePoint { origin, offset } = release?;
        let base = match origin {
            ReleaseOrigin::FromStart => 0.0,
            ReleaseOrigin::FromEnd if note.tie => return None,
            ReleaseOrigin::FromEnd => note.duration,
        };
        let ticks = libm::round((base + offset) * ticks_per_duration_tick).max(0.0) as u32;
        Some(lead_in.saturating_add(ticks))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SynthSettings;
    use crate::envelope::{EnvelopePhase, EnvelopeSpec, SustainKind, SustainPoint};
    use crate::filter::{FilterKind, FilterSpec};
    use crate::formula::FunctionTable;
    use crate::lfo::{LfoAdding, LfoWaveform};
    use crate::modulation::ModulatedSpec;
    use crate::note::{NoteEvent, fix_note_parameters};
    use crate::oscillator::{AlgorithmicShape, OscillatorSource};
    use crate::params::IncrParamUpdater;
    use crate::wavetable::{MultiWaveTable, WaveTable};

    fn synth() -> SynthParams {
        let settings = SynthSettings {
            sample_rate: 8000.0,
            envelope_rate: 100.0,
            smooth_outputs: false,
            ..SynthSettings::default()
        };
        SynthParams::new(settings, Arc::new(FunctionTable::new())).unwrap()
    }

    fn library() -> WaveLibrary {
        let mut library = WaveLibrary::new();
        library.insert_wave_table(
            "dc",
            MultiWaveTable::single(WaveTable::single(vec![1.0; 4]).unwrap()),
        );
        library
    }

    /// Attack to 1, hold at a sustain point, then release to 0 over 0.1 s.
    fn sustained() -> ModulatedSpec {
        let mut env = EnvelopeSpec::with_phases(
            0.0,
            vec![EnvelopePhase::linear(0.02, 1.0), EnvelopePhase::linear(0.1, 0.0)],
        );
        env.sustain[0] = Some(SustainPoint {
            phase: 0,
            kind: SustainKind::Skip,
        });
        ModulatedSpec::envelope(env)
    }

    fn dc_osc(loudness: ModulatedSpec) -> OscillatorSpec {
        OscillatorSpec {
            loudness,
            ..OscillatorSpec::new(OscillatorSource::WaveTable { table: "dc".into() })
        }
    }

    fn start(event: &NoteEvent) -> BankStart {
        BankStart::new(fix_note_parameters(event, &IncrParamUpdater::new()), 10.0)
    }

    fn bank(spec: &InstrumentSpec, synth: &SynthParams, event: &NoteEvent) -> (OscBankState, i64) {
        let template = OscBankTemplate::new(spec, &library(), &PluggableRegistry::new(), synth).unwrap();
        OscBankState::new(&template, &start(event), synth).unwrap()
    }

    #[test]
    fn from_end_release_fires_at_note_end() {
        let synth = synth();
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained())],
            ..InstrumentSpec::default()
        };
        let mut event = NoteEvent::new(60.0, 3.0);
        event.releases[0] = Some(ReleasePoint::AT_END);
        let (mut bank, when) = bank(&spec, &synth, &event);
        assert_eq!(when, 0);
        assert_eq!(bank.pending_releases()[0], Some(30));

        // attack (2) then hold until the release fires on tick 31
        for _ in 0..30 {
            assert!(bank.generate_envelopes(false, &synth).unwrap());
        }
        let held = bank.oscillators().next().unwrap().common().loudness();
        assert_eq!(held, 1.0);
        // the 10-tick release ends on tick 40
        for _ in 0..9 {
            assert!(bank.generate_envelopes(false, &synth).unwrap());
        }
        assert!(!bank.generate_envelopes(false, &synth).unwrap());
        assert!(bank.is_finished());
    }

    #[test]
    fn ties_suppress_from_end_releases() {
        let synth = synth();
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained())],
            ..InstrumentSpec::default()
        };
        let mut event = NoteEvent::new(60.0, 3.0);
        event.tie = true;
        event.releases[0] = Some(ReleasePoint::AT_END);
        event.releases[1] = Some(ReleasePoint {
            origin: ReleaseOrigin::FromStart,
            offset: 0.5,
        });
        let (bank, _) = bank(&spec, &synth, &event);
        assert_eq!(bank.pending_releases(), [None, Some(5), None]);
    }

    #[test]
    fn release_timer_only_keeps_the_bank_running() {
        let synth = synth();
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(ModulatedSpec::constant(1.0))],
            ..InstrumentSpec::default()
        };
        let mut event = NoteEvent::new(60.0, 1.0);
        event.releases[0] = Some(ReleasePoint::AT_END);
        let (mut bank, _) = bank(&spec, &synth, &event);
        assert!(bank.is_finished());
        assert!(bank.generate_envelopes(true, &synth).unwrap());
        assert_eq!(bank.pending_releases()[0], Some(9));
        assert!(!bank.generate_envelopes(false, &synth).unwrap());
    }

    #[test]
    fn pre_origin_delays_the_start() {
        let synth = synth();
        let mut env = EnvelopeSpec::with_phases(
            0.0,
            vec![EnvelopePhase::linear(0.05, 1.0), EnvelopePhase::linear(1.0, 1.0)],
        );
        env.origin = 1;
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(ModulatedSpec::envelope(env)), dc_osc(sustained())],
            ..InstrumentSpec::default()
        };
        let mut event = NoteEvent::new(60.0, 1.0);
        event.early_late = 0.02;
        event.releases[0] = Some(ReleasePoint::AT_END);
        let (bank, when) = bank(&spec, &synth, &event);
        assert_eq!(bank.max_pre_origin(), 5);
        assert_eq!(when, 2 - 5);
        assert_eq!(bank.pending_releases()[0], Some(15));
    }

    #[test]
    fn force_release_ends_sustain() {
        let synth = synth();
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained())],
            ..InstrumentSpec::default()
        };
        let (mut bank, _) = bank(&spec, &synth, &NoteEvent::new(60.0, 100.0));
        for _ in 0..5 {
            bank.generate_envelopes(false, &synth).unwrap();
        }
        bank.force_release();
        for _ in 0..10 {
            bank.generate_envelopes(false, &synth).unwrap();
        }
        assert!(bank.is_finished());
    }

    #[test]
    fn tie_glides_in_half_steps() {
        let synth = synth();
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained())],
            portamento_before_note: true,
            ..InstrumentSpec::default()
        };
        let (mut bank, _) = bank(&spec, &synth, &NoteEvent::new(57.0, 4.0));
        bank.generate_envelopes(false, &synth).unwrap();
        assert!((bank.pitch_hz() - 220.0).abs() < 1e-9);

        let mut next = NoteEvent::new(69.0, 4.0);
        next.portamento = 0.4;
        let lead = bank.restart_from_tie(&start(&next), &synth).unwrap();
        assert_eq!(lead, 4);
        let mut pitches = Vec::new();
        for _ in 0..4 {
            bank.generate_envelopes(false, &synth).unwrap();
            pitches.push(bank.pitch_hz());
        }
        // an octave in four steps: a quarter octave each
        let ratio = libm::exp2(0.25);
        assert!((pitches[0] - 220.0 * ratio).abs() < 1e-6);
        assert!((pitches[3] - 440.0).abs() < 1e-9);
    }

    #[test]
    fn pitch_lfo_scales_with_displacement_depth() {
        let synth = synth();
        let mut lfo = LfoSpec::steady(LfoWaveform::Constant, 1.0, 12.0);
        lfo.adding = LfoAdding::HalfSteps;
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained())],
            pitch_lfo: vec![lfo],
            ..InstrumentSpec::default()
        };
        let mut event = NoteEvent::new(57.0, 4.0);
        event.pitch_disp_depth = 0.5;
        let (mut bank, _) = bank(&spec, &synth, &event);
        bank.generate_envelopes(false, &synth).unwrap();
        // half of an octave of displacement
        assert!((bank.pitch_hz() - 220.0 * libm::sqrt(2.0)).abs() < 1e-9);
    }

    #[test]
    fn combined_effects_process_the_oscillator_sum() {
        let synth = synth();
        let mut gain = FilterSpec::new(FilterKind::Null);
        gain.output = crate::control::ControlSpec::Constant(0.5);
        let spec = InstrumentSpec {
            oscillators: vec![dc_osc(sustained()), dc_osc(sustained())],
            combined_effects: vec![EffectSpec::Filters(vec![gain])],
            ..InstrumentSpec::default()
        };
        let (mut bank, _) = bank(&spec, &synth, &NoteEvent::new(60.0, 4.0));
        for _ in 0..3 {
            bank.generate_envelopes(false, &synth).unwrap();
        }
        let mut left = vec![0.0f32; 80];
        let mut right = vec![0.0f32; 80];
        bank.apply(&mut left, &mut right, &synth).unwrap();
        // two oscillators at 0.5 per channel, halved by the chain
        assert!(left.iter().all(|&x| (x - 0.5).abs() < 1e-6));
        assert_eq!(left, right);
    }

    #[test]
    fn per_oscillator_effects_only_touch_their_oscillator() {
        let synth = synth();
        let mut silenced = dc_osc(sustained());
        let mut gain = FilterSpec::new(FilterKind::Null);
        gain.output = crate::control::ControlSpec::Constant(0.0);
        silenced.effects = vec![EffectSpec::Filters(vec![gain])];
        let square = OscillatorSpec {
            loudness: sustained(),
            ..OscillatorSpec::new(OscillatorSource::Algorithmic {
                shape: AlgorithmicShape::Square,
            })
        };
        let spec = InstrumentSpec {
            oscillators: vec![silenced, dc_osc(sustained()), square],
            ..InstrumentSpec::default()
        };
        let (mut bank, _) = bank(&spec, &synth, &NoteEvent::new(0.0, 4.0));
        for _ in 0..3 {
            bank.generate_envelopes(false, &synth).unwrap();
        }
        let mut left = vec![0.0f32; 8];
        let mut right = vec![0.0f32; 8];
        bank.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&x| (x - 1.0).abs() < 1e-6));
    }
}
