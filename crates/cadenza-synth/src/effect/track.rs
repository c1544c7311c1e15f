//! Track effect generator: a track-role chain with a command queue and
//! auto-quiescence.
//!
//! The sequencer discovers commands ahead of time and queues them with a
//! delay in envelope ticks. [`TrackEffectGenerator::update_state`] applies
//! every command whose tick has arrived, in scheduling order, before the
//! chain's controls are refreshed for that tick.
//!
//! With quiescence enabled, the chain stops processing once its output has
//! stayed below the threshold for a full window, and starts again as soon
//! as the input rises above the threshold or a command is applied.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use cadenza_core::db_to_linear_f64;

use super::{EffectChain, EffectChainTemplate, EffectRole};
use crate::context::SynthParams;
use crate::error::{Result, SynthError};
use crate::params::{Command, IncrParamUpdater};

/// Auto-quiescence settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QuiescenceSpec {
    /// Level below which a sample counts as silent, in dB.
    pub threshold_db: f64,
    /// Continuous silence needed before processing stops, in seconds.
    pub window_seconds: f64,
}

impl Default for QuiescenceSpec {
    fn default() -> Self {
        Self {
            threshold_db: -90.0,
            window_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Active,
    Quiescent,
}

#[derive(Debug, Clone)]
struct Quiescence {
    threshold: f32,
    window: usize,
    quiet: usize,
    activity: Activity,
}

impl Quiescence {
    fn wake(&mut self) {
        if self.activity == Activity::Quiescent {
            #[cfg(feature = "tracing")]
            tracing::debug!("track effects resumed");
        }
        self.activity = Activity::Active;
        self.quiet = 0;
    }

    fn observe(&mut self, left: &[f32], right: &[f32]) {
        for (l, r) in left.iter().zip(right) {
            if l.abs() > self.threshold || r.abs() > self.threshold {
                self.quiet = 0;
            } else {
                self.quiet += 1;
            }
        }
        if self.quiet >= self.window {
            #[cfg(feature = "tracing")]
            tracing::debug!("track effects quiescent after {} silent samples", self.quiet);
            self.activity = Activity::Quiescent;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: u64,
    command: Command,
}

/// Track-role effect chain with deferred commands.
#[derive(Debug)]
pub struct TrackEffectGenerator {
    chain: EffectChain,
    queue: Vec<Scheduled>,
    tick: u64,
    quiescence: Option<Quiescence>,
}

impl TrackEffectGenerator {
    /// Builds the chain against the track's current effect accents.
    pub fn new(
        template: &EffectChainTemplate,
        quiescence: Option<&QuiescenceSpec>,
        track: &IncrParamUpdater,
        synth: &SynthParams,
    ) -> Result<Self> {
        if template.role() != EffectRole::Track {
            return Err(SynthError::invalid_template(
                "track effect generator needs a track-role chain",
            ));
        }
        let chain = EffectChain::new_track(template, &track.effect_accents(), synth)?;
        let quiescence = quiescence.map(|q| Quiescence {
            threshold: db_to_linear_f64(q.threshold_db) as f32,
            window: libm::round(q.window_seconds.max(0.0) * synth.sample_rate()) as usize,
            quiet: 0,
            activity: Activity::Active,
        });
        Ok(Self {
            chain,
            queue: Vec::new(),
            tick: 0,
            quiescence,
        })
    }

    /// Queues `command` to be applied `delay_ticks` ticks from now.
    ///
    /// Commands due on the same tick apply in the order they were queued.
    pub fn schedule(&mut self, command: Command, delay_ticks: u32) {
        let due = self.tick + u64::from(delay_ticks);
        let at = self.queue.partition_point(|s| s.due <= due);
        self.queue.insert(at, Scheduled { due, command });
    }

    /// Applies due commands to `track`, then refreshes the chain's controls
    /// and advances one tick.
    pub fn update_state(&mut self, track: &mut IncrParamUpdater, synth: &SynthParams) -> Result<()> {
        let due = self.queue.partition_point(|s| s.due <= self.tick);
        if due > 0 {
            for scheduled in self.queue.drain(..due) {
                track.apply(&scheduled.command);
            }
            if let Some(q) = &mut self.quiescence {
                q.wake();
            }
        }
        self.chain.track_update(&track.effect_accents(), synth.host())?;
        self.tick += 1;
        Ok(())
    }

    /// Processes one mixed block in place, unless quiescent and the input
    /// is silent.
    pub fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let Some(q) = &mut self.quiescence else {
            return self.chain.apply(left, right, synth);
        };
        if q.activity == Activity::Quiescent {
            let threshold = q.threshold;
            if !left.iter().chain(right.iter()).any(|x| x.abs() > threshold) {
                return Ok(());
            }
            q.wake();
        }
        self.chain.apply(left, right, synth)?;
        q.observe(left, right);
        Ok(())
    }

    /// True while processing is suspended.
    pub fn is_quiescent(&self) -> bool {
        self.quiescence
            .as_ref()
            .is_some_and(|q| q.activity == Activity::Quiescent)
    }

    /// Number of queued commands.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Ticks processed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The effect chain.
    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accent::NUM_ACCENTS;
    use crate::context::SynthSettings;
    use crate::control::ControlSpec;
    use crate::effect::EffectSpec;
    use crate::filter::{FilterKind, FilterSpec};
    use crate::formula::FunctionTable;
    use crate::params::TrackParam;
    use crate::pluggable::PluggableRegistry;
    use std::sync::Arc;

    fn synth() -> SynthParams {
        let mut host = FunctionTable::new();
        host.register_scalar("level", NUM_ACCENTS, |a| 1.0 + a[0]);
        let settings = SynthSettings {
            sample_rate: 8000.0,
            envelope_rate: 100.0,
            smooth_outputs: false,
            ..SynthSettings::default()
        };
        SynthParams::new(settings, Arc::new(host)).unwrap()
    }

    fn generator(synth: &SynthParams, quiescence: Option<&QuiescenceSpec>) -> TrackEffectGenerator {
        let specs = [EffectSpec::Filters(vec![FilterSpec {
            output: ControlSpec::Formula("level".into()),
            ..FilterSpec::new(FilterKind::Null)
        }])];
        let template =
            EffectChainTemplate::new(&specs, EffectRole::Track, &PluggableRegistry::new(), synth.host())
                .unwrap();
        TrackEffectGenerator::new(&template, quiescence, &IncrParamUpdater::new(), synth).unwrap()
    }

    #[test]
    fn due_commands_apply_in_queue_order() {
        let synth = synth();
        let mut track = IncrParamUpdater::new();
        let mut generator = generator(&synth, None);
        generator.schedule(Command::parse("set volume 0.3").unwrap(), 2);
        generator.schedule(Command::parse("set volume 0.7").unwrap(), 2);
        generator.schedule(Command::parse("set detune 1").unwrap(), 0);
        assert_eq!(generator.pending(), 3);

        generator.update_state(&mut track, &synth).unwrap();
        assert_eq!(track.value(TrackParam::Detune), 1.0);
        assert_eq!(generator.pending(), 2);
        generator.update_state(&mut track, &synth).unwrap();
        assert_eq!(generator.pending(), 2);
        generator.update_state(&mut track, &synth).unwrap();
        assert_eq!(generator.pending(), 0);
        assert_eq!(track.value(TrackParam::Volume), 0.7);
        assert_eq!(generator.tick(), 3);
    }

    #[test]
    fn controls_see_commands_applied_this_tick() {
        let synth = synth();
        let mut track = IncrParamUpdater::new();
        let mut generator = generator(&synth, None);
        generator.schedule(Command::parse("set effectaccent1 1").unwrap(), 0);
        generator.update_state(&mut track, &synth).unwrap();
        let mut left = vec![0.5f32; 4];
        let mut right = vec![0.5f32; 4];
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left, [1.0; 4]);
    }

    #[test]
    fn quiescence_gates_processing() {
        let synth = synth();
        let mut track = IncrParamUpdater::new();
        // 10 ms window at 8 kHz is 80 samples
        let spec = QuiescenceSpec {
            threshold_db: -60.0,
            window_seconds: 0.01,
        };
        let mut generator = generator(&synth, Some(&spec));
        generator.schedule(Command::parse("set effectaccent1 1").unwrap(), 0);
        generator.update_state(&mut track, &synth).unwrap();

        let mut left = vec![0.25f32; 40];
        let mut right = vec![0.0f32; 40];
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left[0], 0.5);
        assert!(!generator.is_quiescent());

        for _ in 0..2 {
            let mut left = vec![0.0f32; 40];
            let mut right = vec![0.0f32; 40];
            generator.apply(&mut left, &mut right, &synth).unwrap();
        }
        assert!(generator.is_quiescent());

        // below threshold: untouched
        let mut left = vec![0.0004f32; 40];
        let mut right = vec![0.0f32; 40];
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left[0], 0.0004);
        assert!(generator.is_quiescent());

        let mut left = vec![0.25f32; 40];
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left[0], 0.5);
        assert!(!generator.is_quiescent());
    }

    #[test]
    fn commands_wake_a_quiescent_chain() {
        let synth = synth();
        let mut track = IncrParamUpdater::new();
        let spec = QuiescenceSpec {
            threshold_db: -60.0,
            window_seconds: 0.001,
        };
        let mut generator = generator(&synth, Some(&spec));
        let mut left = vec![0.0f32; 16];
        let mut right = vec![0.0f32; 16];
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert!(generator.is_quiescent());
        generator.schedule(Command::parse("adjust effectaccent2 0.5").unwrap(), 0);
        generator.update_state(&mut track, &synth).unwrap();
        assert!(!generator.is_quiescent());
    }

    #[test]
    fn oscillator_chain_is_rejected() {
        let synth = synth();
        let template =
            EffectChainTemplate::new(&[], EffectRole::Oscillator, &PluggableRegistry::new(), synth.host())
                .unwrap();
        let err = TrackEffectGenerator::new(&template, None, &IncrParamUpdater::new(), &synth).unwrap_err();
        assert!(matches!(err, SynthError::InvalidTemplate(_)));
    }
}
