//! Plays a project's score through the engine, one envelope tick at a time.
//!
//! Notes are frozen against the track state at their nominal onset, but a
//! bank may need to start early to cover its pre-origin ticks. The score is
//! therefore laid out in two passes: [`Performance::new`] replays the track
//! commands to freeze every note and fix its real start tick, and
//! [`Performance::render_tick`] then runs the timeline, shifted by a
//! pre-roll so that no start lands before tick zero.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Context;
use cadenza_config::{Project, ScoreEventKind};
use cadenza_synth::note::NUM_RELEASES;
use cadenza_synth::{
    BankStart, BlockClock, Command, FormulaHost, IncrParamUpdater, OscBankState, OscBankTemplate,
    PluggableRegistry, SynthParams, TrackEffectGenerator, WaveLibrary, fix_note_parameters,
};

enum Action {
    Command(Command),
    Start { voice: usize, bank: Box<OscBankState> },
    Restart { voice: usize, start: BankStart },
}

struct Voice {
    id: usize,
    bank: OscBankState,
}

/// Running peak, RMS and clip count over every rendered sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelMeter {
    peak: f32,
    sum_squares: f64,
    samples: u64,
    clipped: u64,
}

impl LevelMeter {
    fn observe(&mut self, block: &[f32]) {
        for &x in block {
            let level = x.abs();
            self.peak = self.peak.max(level);
            self.sum_squares += f64::from(x) * f64::from(x);
            if level > 1.0 {
                self.clipped += 1;
            }
        }
        self.samples += block.len() as u64;
    }

    /// Largest absolute sample.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Root mean square over every sample.
    pub fn rms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            (self.sum_squares / self.samples as f64).sqrt()
        }
    }

    /// Samples observed.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Samples beyond full scale.
    pub fn clipped(&self) -> u64 {
        self.clipped
    }
}

/// A score laid out against one instrument and track.
pub struct Performance {
    synth: SynthParams,
    template: Arc<OscBankTemplate>,
    track: IncrParamUpdater,
    generator: TrackEffectGenerator,
    clock: BlockClock,
    oversampling: usize,
    timeline: VecDeque<(u64, Action)>,
    last_entry: u64,
    voices: Vec<Voice>,
    tick: u64,
    quiet_since: Option<u64>,
    tail_ticks: u64,
    notes: usize,
    left: Vec<f32>,
    right: Vec<f32>,
    out_left: Vec<f32>,
    out_right: Vec<f32>,
    meters: [LevelMeter; 2],
}

impl Performance {
    /// Builds every note of `project` and lays out the timeline.
    ///
    /// After the last voice finishes, rendering continues for at most
    /// `tail_seconds` while the track effects ring out.
    pub fn new(
        project: &Project,
        library: &WaveLibrary,
        host: Arc<dyn FormulaHost>,
        registry: &PluggableRegistry,
        tail_seconds: f64,
    ) -> anyhow::Result<Self> {
        let synth = SynthParams::new(project.settings.clone(), host)?;
        let template = OscBankTemplate::new(&project.instrument, library, registry, &synth)
            .context("building instrument")?;
        let ticks_per_division = project.score.ticks_per_division(&project.settings);
        let glide_early = project.instrument.portamento_before_note;

        let mut shadow = IncrParamUpdater::new();
        let mut at = 0u64;
        let mut open_tie: Option<usize> = None;
        let mut voices = 0usize;
        let mut notes = 0usize;
        let mut laid_out: Vec<(i64, Action)> = Vec::new();
        for event in project.score.events(&project.settings)? {
            shadow.update(u32::try_from(event.tick - at).unwrap_or(u32::MAX));
            at = event.tick;
            let tick = event.tick as i64;
            match event.kind {
                ScoreEventKind::Command(command) => {
                    shadow.apply(&command);
                    laid_out.push((tick, Action::Command(command)));
                }
                ScoreEventKind::Note(mut note) => {
                    notes += 1;
                    let tie = note.tie;
                    if tie {
                        note.releases = [None; NUM_RELEASES];
                    }
                    let start = BankStart::new(fix_note_parameters(&note, &shadow), ticks_per_division);
                    let voice = if let Some(voice) = open_tie.take() {
                        let lead = if glide_early {
                            (note.portamento * ticks_per_division).round().max(0.0) as i64
                        } else {
                            0
                        };
                        laid_out.push((tick - lead, Action::Restart { voice, start }));
                        voice
                    } else {
                        let (bank, when) = OscBankState::new(&template, &start, &synth)
                            .with_context(|| format!("starting note {notes}"))?;
                        let voice = voices;
                        voices += 1;
                        laid_out.push((
                            tick + when,
                            Action::Start {
                                voice,
                                bank: Box::new(bank),
                            },
                        ));
                        voice
                    };
                    if tie {
                        open_tie = Some(voice);
                    }
                }
            }
        }

        let pre_roll = laid_out.iter().map(|(t, _)| -t).max().unwrap_or(0).max(0);
        laid_out.sort_by_key(|(t, _)| *t);
        let timeline: VecDeque<(u64, Action)> = laid_out
            .into_iter()
            .map(|(t, action)| ((t + pre_roll) as u64, action))
            .collect();
        let last_entry = timeline.back().map_or(0, |(t, _)| *t);
        tracing::info!(
            "{} notes on {} voices, {} timeline entries, pre-roll {} ticks",
            notes,
            voices,
            timeline.len(),
            pre_roll
        );

        let track = IncrParamUpdater::new();
        let generator =
            TrackEffectGenerator::new(template.track_effects(), template.quiescence(), &track, &synth)?;
        let max_block = synth.max_block_len();
        let oversampling = project.settings.oversampling.max(1) as usize;
        let tail_ticks = (tail_seconds.max(0.0) * synth.envelope_rate()).round() as u64;
        Ok(Self {
            clock: synth.block_clock(),
            synth,
            template,
            track,
            generator,
            oversampling,
            timeline,
            last_entry,
            voices: Vec::new(),
            tick: 0,
            quiet_since: None,
            tail_ticks,
            notes,
            left: vec![0.0; max_block],
            right: vec![0.0; max_block],
            out_left: vec![0.0; max_block / oversampling + 1],
            out_right: vec![0.0; max_block / oversampling + 1],
            meters: [LevelMeter::default(); 2],
        })
    }

    /// Ticks rendered so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of score notes.
    pub fn notes(&self) -> usize {
        self.notes
    }

    /// Tick of the last timeline entry, a lower bound on the length.
    pub fn last_entry_tick(&self) -> u64 {
        self.last_entry
    }

    /// Level statistics of the left and right output channels.
    pub fn meters(&self) -> &[LevelMeter; 2] {
        &self.meters
    }

    /// True once every entry has played, every voice has finished, and the
    /// track effects have gone quiet or used up the tail.
    pub fn is_done(&self) -> bool {
        if !self.timeline.is_empty() || !self.voices.is_empty() || self.generator.pending() > 0 {
            return false;
        }
        match self.quiet_since {
            Some(since) => self.generator.is_quiescent() || self.tick - since >= self.tail_ticks,
            None => false,
        }
    }

    /// Renders one envelope tick and returns the output block at the base
    /// sample rate.
    pub fn render_tick(&mut self) -> anyhow::Result<(&[f32], &[f32])> {
        if self.tick > 0 {
            self.track.update(1);
        }
        while self.timeline.front().is_some_and(|(due, _)| *due <= self.tick) {
            if let Some((_, action)) = self.timeline.pop_front() {
                self.dispatch(action)?;
            }
        }

        let len = self.clock.next_len();
        let (left, right) = (&mut self.left[..len], &mut self.right[..len]);
        left.fill(0.0);
        right.fill(0.0);
        let synth = &self.synth;
        let mut index = 0;
        while index < self.voices.len() {
            let voice = &mut self.voices[index];
            let running = voice
                .bank
                .generate_envelopes(false, synth)
                .with_context(|| format!("voice {} at tick {}", voice.id, self.tick))?;
            voice.bank.apply(left, right, synth)?;
            if running {
                index += 1;
            } else {
                tracing::debug!("voice {} finished at tick {}", voice.id, self.tick);
                self.voices.remove(index);
            }
        }

        self.generator.update_state(&mut self.track, synth)?;
        self.generator.apply(left, right, synth)?;

        let out_len = len / self.oversampling;
        let (out_left, out_right) = (&mut self.out_left[..out_len], &mut self.out_right[..out_len]);
        cadenza_core::downsample_average(left, out_left, self.oversampling);
        cadenza_core::downsample_average(right, out_right, self.oversampling);
        self.meters[0].observe(out_left);
        self.meters[1].observe(out_right);

        self.tick += 1;
        let idle = self.timeline.is_empty() && self.voices.is_empty();
        self.quiet_since = match (idle, self.quiet_since) {
            (true, None) => Some(self.tick),
            (true, since) => since,
            (false, _) => None,
        };
        Ok((&self.out_left[..out_len], &self.out_right[..out_len]))
    }

    fn dispatch(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Command(command) => {
                tracing::debug!("tick {}: {}", self.tick, command);
                self.generator.schedule(command, 0);
            }
            Action::Start { voice, bank } => {
                self.voices.push(Voice { id: voice, bank: *bank });
            }
            Action::Restart { voice, start } => {
                if let Some(v) = self.voices.iter_mut().find(|v| v.id == voice) {
                    v.bank.restart_from_tie(&start, &self.synth)?;
                } else {
                    tracing::warn!("tied voice {voice} ended before its continuation, restarting");
                    let (bank, _) = OscBankState::new(&self.template, &start, &self.synth)?;
                    self.voices.push(Voice { id: voice, bank });
                }
            }
        }
        Ok(())
    }
}
