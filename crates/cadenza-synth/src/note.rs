//! Note events and the frozen per-note snapshot.

use cadenza_core::half_steps_to_hz;

use crate::accent::AccentVec;
use crate::envelope::EnvelopeParams;
use crate::params::{IncrParamUpdater, TrackParam};

/// Number of independently scheduled releases per note.
pub const NUM_RELEASES: usize = 3;

/// Reference point of a release time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReleaseOrigin {
    /// Measured from the note's start.
    FromStart,
    /// Measured from the note's nominal end.
    #[default]
    FromEnd,
}

/// When one sustain point is released.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReleasePoint {
    /// Reference point.
    pub origin: ReleaseOrigin,
    /// Offset from the reference in duration ticks (may be negative).
    pub offset: f64,
}

impl ReleasePoint {
    /// A release at the note's end.
    pub const AT_END: Self = Self {
        origin: ReleaseOrigin::FromEnd,
        offset: 0.0,
    };
}

/// A note as issued by the sequencer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoteEvent {
    /// Pitch in half steps (69 = A440).
    pub pitch: f64,
    /// Nominal length in duration ticks.
    pub duration: f64,
    /// Loudness multiplier.
    pub loudness: f64,
    /// Expressive accents.
    pub accents: AccentVec,
    /// Added to the track's stereo position.
    pub stereo_adjust: f64,
    /// Multiplies the track's hurry-up.
    pub hurry_up: f64,
    /// Pitch offset in half steps added to the track's detune.
    pub detune: f64,
    /// Start offset in seconds added to the track's early/late.
    pub early_late: f64,
    /// Release schedule; `None` never releases that sustain point.
    #[cfg_attr(feature = "serde", serde(with = "crate::serde_slots"))]
    pub releases: [Option<ReleasePoint>; NUM_RELEASES],
    /// Portamento length in duration ticks, used when this note continues a
    /// tie.
    pub portamento: f64,
    /// Multiplies the track's pitch displacement depth.
    pub pitch_disp_depth: f64,
    /// Multiplies the track's pitch displacement rate.
    pub pitch_disp_rate: f64,
    /// Pitch for choosing among multi-sampled tables, when it differs from
    /// the sounding pitch.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub multisample_pitch: Option<f64>,
    /// The note continues into the next one.
    pub tie: bool,
}

impl Default for NoteEvent {
    fn default() -> Self {
        Self {
            pitch: 60.0,
            duration: 1.0,
            loudness: 1.0,
            accents: AccentVec::ZERO,
            stereo_adjust: 0.0,
            hurry_up: 1.0,
            detune: 0.0,
            early_late: 0.0,
            releases: [Some(ReleasePoint::AT_END); NUM_RELEASES],
            portamento: 0.0,
            pitch_disp_depth: 1.0,
            pitch_disp_rate: 1.0,
            multisample_pitch: None,
            tie: false,
        }
    }
}

impl NoteEvent {
    /// A note at `pitch` half steps lasting `duration` duration ticks.
    pub fn new(pitch: f64, duration: f64) -> Self {
        Self {
            pitch,
            duration,
            ..Self::default()
        }
    }
}

/// A note combined with the track's state at its onset.
///
/// Once frozen, track sweeps no longer affect the note, except for the live
/// accents which envelopes sample again on retrigger.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenNote {
    /// Sounding pitch in half steps after transpose and detune.
    pub pitch: f64,
    /// Sounding pitch in Hz.
    pub pitch_hz: f64,
    /// Pitch in Hz used to pick multi-sampled tables.
    pub multisample_hz: f64,
    /// Length in duration ticks after duration adjust.
    pub duration: f64,
    /// Loudness after track volume.
    pub loudness: f64,
    /// The note's own accents.
    pub accents: AccentVec,
    /// Track accents sampled at onset.
    pub live_accents: AccentVec,
    /// Stereo position in `[-1, 1]`.
    pub stereo: f64,
    /// Envelope speed multiplier.
    pub hurry_up: f64,
    /// Start offset in seconds.
    pub early_late: f64,
    /// Release schedule.
    pub releases: [Option<ReleasePoint>; NUM_RELEASES],
    /// Portamento length in duration ticks.
    pub portamento: f64,
    /// Pitch LFO depth multiplier.
    pub pitch_disp_depth: f64,
    /// Pitch LFO rate multiplier.
    pub pitch_disp_rate: f64,
    /// Continues into the next note.
    pub tie: bool,
}

impl FrozenNote {
    /// Envelope construction parameters for this note.
    pub fn envelope_params(&self, envelope_rate: f64) -> EnvelopeParams<'_> {
        EnvelopeParams {
            accents: &self.accents,
            live_accents: &self.live_accents,
            pitch_hz: self.pitch_hz,
            loudness: self.loudness,
            hurry_up: self.hurry_up,
            envelope_rate,
        }
    }
}

/// Combines `note` with the current track scalars.
pub fn fix_note_parameters(note: &NoteEvent, track: &IncrParamUpdater) -> FrozenNote {
    let transpose = track.value(TrackParam::Transpose);
    let pitch = note.pitch + transpose + note.detune + track.value(TrackParam::Detune);
    let multisample = note.multisample_pitch.map_or(pitch, |p| p + transpose);
    FrozenNote {
        pitch,
        pitch_hz: half_steps_to_hz(pitch),
        multisample_hz: half_steps_to_hz(multisample),
        duration: note.duration * track.value(TrackParam::DurationAdjust),
        loudness: note.loudness * track.value(TrackParam::Volume),
        accents: note.accents,
        live_accents: track.accents(),
        stereo: (note.stereo_adjust + track.value(TrackParam::StereoPosition)).clamp(-1.0, 1.0),
        hurry_up: note.hurry_up * track.value(TrackParam::HurryUp),
        early_late: note.early_late + track.value(TrackParam::EarlyLate),
        releases: note.releases,
        portamento: note.portamento,
        pitch_disp_depth: note.pitch_disp_depth * track.value(TrackParam::PitchDisplacementDepth),
        pitch_disp_rate: note.pitch_disp_rate * track.value(TrackParam::PitchDisplacementRate),
        tie: note.tie,
    }
}
