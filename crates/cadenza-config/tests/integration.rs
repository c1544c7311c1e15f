//! Integration tests for cadenza-config.
//!
//! These tests load projects from disk and drive the engine with what they
//! describe.

use std::sync::Arc;

use cadenza_config::{
    ConfigError, FrameDef, Project, SampleDef, Score, ScoreEventKind, WaveTableDef,
    builtin_functions,
};
use cadenza_synth::{
    BankStart, ControlSpec, EffectSpec, EnvelopeSpec, FilterKind, FilterSpec, IncrParamUpdater,
    ModulatedSpec, OscBankState, OscBankTemplate, OscillatorSource, OscillatorSpec,
    PluggableBinding, PluggableConfig, PluggableRegistry, SynthParams, TrackEffectGenerator,
    fix_note_parameters,
};
use tempfile::TempDir;

const PAD: &str = r#"
name = "Pad"
description = "Two detuned tables through a track gain"

[settings]
sample_rate = 8000.0
envelope_rate = 100.0
tempo_bpm = 60.0

[[wave_tables]]
name = "soft"
[[wave_tables.ranges]]
max_hz = 1000.0
frames = [{ harmonics = [1.0, 0.5, 0.25], length = 128 }]
[[wave_tables.ranges]]
frames = [{ samples = [0.0, 1.0, 0.0, -1.0] }]

[[samples]]
name = "click"
data = [1.0, 0.5, 0.25, 0.0]
sample_rate = 8000.0
root_hz = 440.0

[[instrument.oscillators]]
source = { type = "wave_table", table = "soft" }
stereo_bias = -0.5
[instrument.oscillators.loudness.envelope]
phases = [
    { duration = 0.1, endpoint = 1.0 },
    { duration = 0.2, endpoint = 0.0 },
]
sustain = [{ release = 1, phase = 0, kind = "skip" }]

[[instrument.oscillators]]
source = { type = "sampled", sample = "click" }
pitch_ratio = 1.005

[[instrument.track_effects]]
[instrument.track_effects.pluggable]
processor = "user_effect"
config = { data = ["stereo_gain"], unsmoothed = ["gain"] }
params = { gain = { formula = "effect_accent1" } }

[score]
divisions_per_beat = 2.0

[[score.notes]]
at = 0.0
pitch = 57.0
duration = 1.0

[[score.commands]]
at = 0.0
command = "set effectaccent1 0.5"
"#;

/// Test loading a project file and building every engine object from it.
#[test]
fn test_project_file_builds_the_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pad.toml");
    std::fs::write(&path, PAD).unwrap();

    let project = Project::load(&path).expect("should load pad project");
    assert_eq!(project.name, "Pad");
    assert_eq!(project.instrument.oscillators.len(), 2);
    assert!(project.instrument.oscillators[0].loudness.envelope.sustain[0].is_some());

    let host = builtin_functions();
    let registry = PluggableRegistry::new();
    let library = project.validate(&host, &registry).unwrap();
    assert_eq!(library.wave_table("soft").unwrap().len(), 2);

    let synth = SynthParams::new(project.settings.clone(), Arc::new(host)).unwrap();
    let template = OscBankTemplate::new(&project.instrument, &library, &registry, &synth).unwrap();

    let events = project.score.events(&project.settings).unwrap();
    assert_eq!(events.len(), 2);
    let mut track = IncrParamUpdater::new();
    let ScoreEventKind::Command(command) = &events[0].kind else {
        panic!("command should come first");
    };
    track.apply(command);
    let ScoreEventKind::Note(note) = &events[1].kind else {
        panic!("note should follow");
    };

    let ticks = project.score.ticks_per_division(&project.settings);
    assert_eq!(ticks, 50.0);
    let start = BankStart::new(fix_note_parameters(note, &track), ticks);
    let (mut bank, when) = OscBankState::new(&template, &start, &synth).unwrap();
    assert_eq!(when, 0);

    let mut generator = TrackEffectGenerator::new(
        template.track_effects(),
        template.quiescence(),
        &track,
        &synth,
    )
    .unwrap();

    let block = synth.block_clock().next_len();
    let mut loudest = 0.0f32;
    for _ in 0..40 {
        bank.generate_envelopes(false, &synth).unwrap();
        let mut left = vec![0.0f32; block];
        let mut right = vec![0.0f32; block];
        bank.apply(&mut left, &mut right, &synth).unwrap();
        generator.update_state(&mut track, &synth).unwrap();
        generator.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().chain(right.iter()).all(|x| x.is_finite()));
        loudest = loudest.max(left.iter().fold(0.0f32, |m, x| m.max(x.abs())));
    }
    // two oscillators at unit loudness, biased left, halved by the track gain
    assert!(loudest > 0.0 && loudest <= 1.0, "loudest {loudest}");
}

/// Test that a saved project reloads unchanged.
#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("dir").join("pad.toml");

    let original = Project::from_toml(PAD).unwrap();
    original.save(&path).expect("should create parent dirs and save");
    assert!(path.exists());

    let loaded = Project::load(&path).unwrap();
    assert_eq!(loaded, original);
}

/// Test that a programmatic project with every effect kind survives TOML.
#[test]
fn test_programmatic_project_roundtrip() {
    let mut config = PluggableConfig::new();
    config.push_text("data", "stereo_gain").push_text("unsmoothed", "gain");
    let mut gain = PluggableBinding::new("user_effect", config);
    gain.params
        .insert("gain".into(), ControlSpec::Formula("effect_accent2".into()));

    let project = Project::new("Everything")
        .with_wave_table(WaveTableDef::single(
            "tri",
            FrameDef::Samples {
                samples: vec![0.0, 1.0, 0.0, -1.0],
            },
        ))
        .with_sample(SampleDef {
            name: "loop".into(),
            data: vec![0.0, 0.5, 1.0, 0.5],
            sample_rate: 44100.0,
            root_hz: 220.0,
            loop_start: Some(1),
            loop_end: Some(3),
        })
        .with_instrument(cadenza_synth::InstrumentSpec {
            oscillators: vec![OscillatorSpec {
                effects: vec![EffectSpec::Filters(vec![FilterSpec {
                    cutoff: ControlSpec::Modulated(ModulatedSpec::envelope(EnvelopeSpec::constant(
                        2000.0,
                    ))),
                    ..FilterSpec::new(FilterKind::Lowpass)
                }])],
                ..OscillatorSpec::new(OscillatorSource::WaveTable { table: "tri".into() })
            }],
            track_effects: vec![EffectSpec::Pluggable(gain)],
            ..cadenza_synth::InstrumentSpec::default()
        })
        .with_score(
            Score::default()
                .with_note(0.0, cadenza_synth::NoteEvent::new(60.0, 2.0))
                .with_command(1.0, "sweepto effectaccent2 1 100"),
        );

    let toml = project.to_toml().unwrap();
    let back = Project::from_toml(&toml).unwrap();
    assert_eq!(back, project);
    back.validate(&builtin_functions(), &PluggableRegistry::new())
        .unwrap();
}

/// Test loading a missing file reports the path.
#[test]
fn test_missing_file_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = Project::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
    assert!(err.to_string().contains("absent.toml"));
}
