//! Notes and track commands placed on a timeline.
//!
//! Score times are in *divisions*: the duration unit notes are written in.
//! `divisions_per_beat` and the engine tempo fix how many envelope ticks a
//! division lasts.

use serde::{Deserialize, Serialize};

use cadenza_synth::{Command, NoteEvent, SynthSettings};

use crate::error::ConfigError;

fn default_divisions() -> f64 {
    1.0
}

/// A note with its start time.
///
/// The note fields sit beside `at` in the same table:
///
/// ```toml
/// [[score.notes]]
/// at = 2.0
/// pitch = 64.0
/// duration = 1.5
/// loudness = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNote {
    /// Start in divisions.
    pub at: f64,
    /// The note.
    #[serde(flatten)]
    pub event: NoteEvent,
}

/// A track command with its time, in the text form [`Command::parse`]
/// accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCommand {
    /// Time in divisions.
    pub at: f64,
    /// Command text, e.g. `"sweepto volume 0.5 200"`.
    pub command: String,
}

/// What happens at a score event.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreEventKind {
    /// A track command.
    Command(Command),
    /// A note onset.
    Note(NoteEvent),
}

/// A score entry resolved to its envelope tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEvent {
    /// Envelope tick of the event.
    pub tick: u64,
    /// The event.
    pub kind: ScoreEventKind,
}

/// Notes and commands of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Divisions per beat of `tempo_bpm`.
    #[serde(default = "default_divisions")]
    pub divisions_per_beat: f64,
    /// Notes, in any order.
    #[serde(default)]
    pub notes: Vec<ScoreNote>,
    /// Track commands, in any order.
    #[serde(default)]
    pub commands: Vec<ScoreCommand>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            divisions_per_beat: default_divisions(),
            notes: Vec::new(),
            commands: Vec::new(),
        }
    }
}

impl Score {
    /// Adds a note at `at` divisions.
    pub fn with_note(mut self, at: f64, event: NoteEvent) -> Self {
        self.notes.push(ScoreNote { at, event });
        self
    }

    /// Adds a command at `at` divisions.
    pub fn with_command(mut self, at: f64, command: impl Into<String>) -> Self {
        self.commands.push(ScoreCommand {
            at,
            command: command.into(),
        });
        self
    }

    /// Envelope ticks per division at the settings' tempo.
    pub fn ticks_per_division(&self, settings: &SynthSettings) -> f64 {
        settings.envelope_rate * 60.0 / (settings.tempo_bpm * self.divisions_per_beat)
    }

    /// End of the last note, in divisions.
    pub fn length(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.at + n.event.duration)
            .fold(0.0, f64::max)
    }

    /// Checks times, durations and command text.
    pub fn validate(&self, settings: &SynthSettings) -> Result<(), ConfigError> {
        self.events(settings).map(|_| ())
    }

    /// Resolves every entry to its tick, sorted by time.
    ///
    /// On the same tick, commands come before notes so the notes see the
    /// updated track state; otherwise entries keep their listed order.
    pub fn events(&self, settings: &SynthSettings) -> Result<Vec<ScoreEvent>, ConfigError> {
        if !(self.divisions_per_beat > 0.0 && self.divisions_per_beat.is_finite()) {
            return Err(ConfigError::InvalidSetting {
                key: "divisions_per_beat".to_string(),
                reason: format!("must be positive, got {}", self.divisions_per_beat),
            });
        }
        if !(settings.tempo_bpm > 0.0 && settings.tempo_bpm.is_finite()) {
            return Err(ConfigError::InvalidSetting {
                key: "tempo_bpm".to_string(),
                reason: format!("must be positive, got {}", settings.tempo_bpm),
            });
        }
        let ticks = self.ticks_per_division(settings);
        let tick_of = |index: usize, at: f64| -> Result<u64, ConfigError> {
            if at >= 0.0 && at.is_finite() {
                Ok(libm::round(at * ticks) as u64)
            } else {
                Err(ConfigError::InvalidScore {
                    index,
                    reason: format!("start must be a non-negative time, got {at}"),
                })
            }
        };

        let mut events = Vec::with_capacity(self.notes.len() + self.commands.len());
        for (index, entry) in self.commands.iter().enumerate() {
            let command = Command::parse(&entry.command)?;
            events.push(ScoreEvent {
                tick: tick_of(index, entry.at)?,
                kind: ScoreEventKind::Command(command),
            });
        }
        for (index, note) in self.notes.iter().enumerate() {
            if !(note.event.duration >= 0.0 && note.event.duration.is_finite()) {
                return Err(ConfigError::InvalidScore {
                    index,
                    reason: format!("duration must be non-negative, got {}", note.event.duration),
                });
            }
            events.push(ScoreEvent {
                tick: tick_of(index, note.at)?,
                kind: ScoreEventKind::Note(note.event.clone()),
            });
        }
        events.sort_by_key(|e| (e.tick, matches!(e.kind, ScoreEventKind::Note(_))));
        Ok(events)
    }
}
