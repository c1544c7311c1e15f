//! Project file format and operations.

use std::path::Path;

use serde::{Deserialize, Serialize};

use cadenza_synth::{
    FormulaHost, InstrumentSpec, PluggableRegistry, SynthSettings, WaveLibrary,
    check_unreferenced_things,
};

use crate::error::ConfigError;
use crate::score::Score;
use crate::wave::{SampleDef, WaveTableDef, build_library};

/// A complete renderable project: engine settings, the wave tables and
/// samples the instrument plays, the instrument itself, and a score.
///
/// # TOML Format
///
/// ```toml
/// name = "Pad"
/// description = "Slow two-oscillator pad"
///
/// [settings]
/// sample_rate = 48000.0
/// envelope_rate = 480.0
/// tempo_bpm = 90.0
///
/// [[wave_tables]]
/// name = "soft"
/// [[wave_tables.ranges]]
/// frames = [{ harmonics = [1.0, 0.3, 0.1], length = 512 }]
///
/// [[instrument.oscillators]]
/// source = { type = "wave_table", table = "soft" }
/// [instrument.oscillators.loudness.envelope]
/// phases = [
///     { duration = 0.5, endpoint = 1.0 },
///     { duration = 1.0, endpoint = 0.0 },
/// ]
/// sustain = [{ release = 1, phase = 0, kind = "skip" }]
///
/// [[score.notes]]
/// at = 0.0
/// pitch = 57.0
/// duration = 4.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Name of the project.
    pub name: String,

    /// Optional description of the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Engine settings.
    #[serde(default)]
    pub settings: SynthSettings,

    /// Named wave tables.
    #[serde(default)]
    pub wave_tables: Vec<WaveTableDef>,

    /// Named samples.
    #[serde(default)]
    pub samples: Vec<SampleDef>,

    /// The instrument every score note plays.
    #[serde(default)]
    pub instrument: InstrumentSpec,

    /// Notes and track commands.
    #[serde(default)]
    pub score: Score,
}

impl Project {
    /// Create a new empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            settings: SynthSettings::default(),
            wave_tables: Vec::new(),
            samples: Vec::new(),
            instrument: InstrumentSpec::default(),
            score: Score::default(),
        }
    }

    /// Create a project with a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the engine settings.
    pub fn with_settings(mut self, settings: SynthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a wave table.
    pub fn with_wave_table(mut self, table: WaveTableDef) -> Self {
        self.wave_tables.push(table);
        self
    }

    /// Add a sample.
    pub fn with_sample(mut self, sample: SampleDef) -> Self {
        self.samples.push(sample);
        self
    }

    /// Replace the instrument.
    pub fn with_instrument(mut self, instrument: InstrumentSpec) -> Self {
        self.instrument = instrument;
        self
    }

    /// Replace the score.
    pub fn with_score(mut self, score: Score) -> Self {
        self.score = score;
        self
    }

    /// Load a project from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let project: Project = toml::from_str(&content)?;
        Ok(project)
    }

    /// Load a project from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the project to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the project to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Renders the wave tables and samples into a library.
    pub fn library(&self) -> Result<WaveLibrary, ConfigError> {
        build_library(&self.wave_tables, &self.samples)
    }

    /// Checks everything a render needs before any audio is produced: the
    /// settings, every name the instrument references, and the score.
    ///
    /// Returns the built library so callers need not render it twice.
    pub fn validate(
        &self,
        host: &dyn FormulaHost,
        registry: &PluggableRegistry,
    ) -> Result<WaveLibrary, ConfigError> {
        self.settings.validate()?;
        let library = self.library()?;
        check_unreferenced_things(&self.instrument, &library, host, registry)?;
        self.score.validate(&self.settings)?;
        Ok(library)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_functions;
    use crate::wave::FrameDef;
    use cadenza_synth::{
        EnvelopePhase, EnvelopeSpec, ModulatedSpec, NoteEvent, OscillatorSource, OscillatorSpec,
        SustainKind, SustainPoint, SynthError,
    };

    fn sustained_pad() -> InstrumentSpec {
        let mut envelope = EnvelopeSpec::with_phases(
            0.0,
            vec![EnvelopePhase::linear(0.5, 1.0), EnvelopePhase::linear(1.0, 0.0)],
        );
        envelope.sustain[0] = Some(SustainPoint {
            phase: 0,
            kind: SustainKind::Skip,
        });
        InstrumentSpec {
            oscillators: vec![OscillatorSpec {
                loudness: ModulatedSpec::envelope(envelope),
                ..OscillatorSpec::new(OscillatorSource::WaveTable { table: "soft".into() })
            }],
            ..InstrumentSpec::default()
        }
    }

    fn project() -> Project {
        Project::new("Pad")
            .with_description("Slow pad")
            .with_wave_table(WaveTableDef::single(
                "soft",
                FrameDef::Harmonics {
                    harmonics: vec![1.0, 0.3],
                    length: 64,
                },
            ))
            .with_instrument(sustained_pad())
            .with_score(Score::default().with_note(0.0, NoteEvent::new(57.0, 4.0)))
    }

    #[test]
    fn test_project_new() {
        let project = Project::new("Test");
        assert_eq!(project.name, "Test");
        assert!(project.description.is_none());
        assert_eq!(project.settings, SynthSettings::default());
        assert!(project.instrument.oscillators.is_empty());
    }

    #[test]
    fn test_project_toml_roundtrip() {
        let project = project();
        let toml = project.to_toml().unwrap();
        assert!(toml.contains("release = 1"), "sustain points listed by release:\n{toml}");
        let back = Project::from_toml(&toml).unwrap();
        assert_eq!(back, project);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let project = Project::from_toml(
            r#"
            name = "Minimal"

            [[instrument.oscillators]]
            source = { type = "algorithmic", shape = "sine" }
            "#,
        )
        .unwrap();
        assert_eq!(project.settings, SynthSettings::default());
        let osc = &project.instrument.oscillators[0];
        assert_eq!(osc.pitch_ratio, 1.0);
        assert_eq!(osc.loudness, ModulatedSpec::constant(1.0));
        assert_eq!(project.score.divisions_per_beat, 1.0);
    }

    #[test]
    fn test_score_notes_keep_note_defaults() {
        let project = Project::from_toml(
            r#"
            name = "Notes"

            [[score.notes]]
            at = 1.0
            pitch = 64.0
            duration = 0.5
            "#,
        )
        .unwrap();
        let note = &project.score.notes[0];
        assert_eq!(note.at, 1.0);
        assert_eq!(note.event.pitch, 64.0);
        assert_eq!(note.event.loudness, 1.0);
        assert_eq!(note.event.releases, NoteEvent::default().releases);
    }

    #[test]
    fn test_validate_reports_missing_table() {
        let mut project = project();
        project.wave_tables.clear();
        let err = project
            .validate(&builtin_functions(), &PluggableRegistry::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Synth(SynthError::UndefinedWaveTable(ref name)) if name == "soft"
        ));
    }

    #[test]
    fn test_validate_returns_library() {
        let library = project()
            .validate(&builtin_functions(), &PluggableRegistry::new())
            .unwrap();
        assert!(library.has_wave_table("soft"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Project::from_toml("name = "),
            Err(ConfigError::TomlParse(_))
        ));
    }
}
