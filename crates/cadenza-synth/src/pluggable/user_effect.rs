//! `user_effect`: a processor whose transfer function is a user formula.
//!
//! The configuration names a data function (called once per block) and an
//! optional init function (called once at creation), plus the parameters
//! and persistent state arrays both functions receive.
//!
//! | key | values | meaning |
//! |-----|--------|---------|
//! | `data` | 1 name | transfer function |
//! | `init` | 0..1 name | one-time setup function |
//! | `param` | names | dynamic parameters, ramped per sample |
//! | `unsmoothed` | names | dynamic parameters, one value per block |
//! | `static` | names | parameters fixed at creation |
//! | `state_float` / `state_double` / `state_int` | lengths | persistent arrays |
//! | `oversampling` | flag | run at the oversampled rate (default off) |
//! | `pitch_param` / `loudness_param` | 0..1 name | dynamic parameter fed the oscillator's pitch / loudness |
//!
//! The data function may take both channels at once or one channel per
//! call; whichever signature it has decides:
//!
//! ```text
//! stereo: (left[], right[], sample_rate, count, dynamics.., statics.., states..) -> bool
//! mono:   (data[], sample_rate, count, dynamics.., statics.., states..) -> bool
//! init:   (elapsed_seconds, tempo, sample_rate, max_count, statics.., states..) -> bool
//! ```
//!
//! Smoothed dynamics arrive as float arrays, everything else as doubles.
//! Mono functions get an independent state set per channel. A `false`
//! return aborts the tick. Non-finite output samples are replaced with
//! silence before the block leaves the processor.

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    format,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
#[cfg(feature = "std")]
use std::sync::Arc;

use cadenza_core::{RampMode, Upsampler, downsample_average, fill_ramp};

use super::{
    ConfigKeyDef, ConfigValueType, PluggableConfig, PluggableParamDef, PluggableParamKind,
    PluggableProcessor, PluggableProcessorFactory, PluggableProcessorTemplate,
};
use crate::context::SynthParams;
use crate::effect::EffectRole;
use crate::error::{Result, SynthError};
use crate::formula::{
    Arg, DataType, EvalError, EvalErrorCode, FormulaHost, FuncId, Signature, eval_user_effect,
    resolve, resolve_any,
};

const NAME: &str = "user_effect";
const MAX_NAMES: usize = 64;

const fn key(name: &'static str, value_type: ConfigValueType, min: usize, max: usize) -> ConfigKeyDef {
    ConfigKeyDef {
        name,
        value_type,
        min_count: min,
        max_count: max,
    }
}

const KEYS: &[ConfigKeyDef] = &[
    key("init", ConfigValueType::Text, 0, 1),
    key("data", ConfigValueType::Text, 1, 1),
    key("param", ConfigValueType::Text, 0, MAX_NAMES),
    key("unsmoothed", ConfigValueType::Text, 0, MAX_NAMES),
    key("static", ConfigValueType::Text, 0, MAX_NAMES),
    key("state_float", ConfigValueType::Number, 0, MAX_NAMES),
    key("state_double", ConfigValueType::Number, 0, MAX_NAMES),
    key("state_int", ConfigValueType::Number, 0, MAX_NAMES),
    key("oversampling", ConfigValueType::Flag, 0, 1),
    key("pitch_param", ConfigValueType::Text, 0, 1),
    key("loudness_param", ConfigValueType::Text, 0, 1),
];

/// Factory for `"user_effect"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserEffectFactory;

impl PluggableProcessorFactory for UserEffectFactory {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Block processor defined by user formulas"
    }

    fn config_keys(&self) -> &'static [ConfigKeyDef] {
        KEYS
    }

    fn create_template(
        &self,
        config: &PluggableConfig,
        _role: EffectRole,
    ) -> Result<Arc<dyn PluggableProcessorTemplate>> {
        UserEffectTemplate::from_config(config).map(|t| Arc::new(t) as Arc<dyn PluggableProcessorTemplate>)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StateLayout {
    floats: Vec<usize>,
    doubles: Vec<usize>,
    ints: Vec<usize>,
}

impl StateLayout {
    fn types(&self) -> impl Iterator<Item = DataType> + '_ {
        let floats = self.floats.iter().map(|_| DataType::FloatArray);
        let doubles = self.doubles.iter().map(|_| DataType::DoubleArray);
        let ints = self.ints.iter().map(|_| DataType::IntegerArray);
        floats.chain(doubles).chain(ints)
    }

    fn allocate(&self) -> StateSet {
        StateSet {
            floats: self.floats.iter().map(|&n| vec![0.0; n]).collect(),
            doubles: self.doubles.iter().map(|&n| vec![0.0; n]).collect(),
            ints: self.ints.iter().map(|&n| vec![0; n]).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct StateSet {
    floats: Vec<Vec<f32>>,
    doubles: Vec<Vec<f64>>,
    ints: Vec<Vec<i32>>,
}

impl StateSet {
    fn push_args<'a>(&'a mut self, args: &mut Vec<Arg<'a>>) {
        args.extend(self.floats.iter_mut().map(|v| Arg::FloatArray(v)));
        args.extend(self.doubles.iter_mut().map(|v| Arg::DoubleArray(v)));
        args.extend(self.ints.iter_mut().map(|v| Arg::IntegerArray(v)));
    }
}

#[derive(Debug, Clone, PartialEq)]
struct UserEffectTemplate {
    data: String,
    init: Option<String>,
    defs: Vec<PluggableParamDef>,
    state: StateLayout,
    oversampled: bool,
    stereo: Signature,
    mono: Signature,
    init_signature: Signature,
}

impl UserEffectTemplate {
    fn from_config(config: &PluggableConfig) -> Result<Self> {
        let data = config
            .text("data")
            .ok_or_else(|| SynthError::invalid_config(NAME, "missing 'data' function"))?
            .to_string();

        let mut defs: Vec<PluggableParamDef> = Vec::new();
        let groups = [
            ("param", PluggableParamKind::Dynamic, true),
            ("unsmoothed", PluggableParamKind::Dynamic, false),
            ("static", PluggableParamKind::Static, false),
        ];
        for (key, kind, smoothed) in groups {
            for name in config.texts(key) {
                if defs.iter().any(|d| d.name == name) {
                    return Err(SynthError::invalid_config(
                        NAME,
                        format!("parameter '{name}' declared twice"),
                    ));
                }
                defs.push(PluggableParamDef {
                    kind,
                    smoothed,
                    ..PluggableParamDef::dynamic(name, 0.0)
                });
            }
        }
        for (key, is_pitch) in [("pitch_param", true), ("loudness_param", false)] {
            let Some(name) = config.text(key) else { continue };
            let def = defs
                .iter_mut()
                .find(|d| d.name == name && d.kind == PluggableParamKind::Dynamic)
                .ok_or_else(|| {
                    SynthError::invalid_config(NAME, format!("'{key}' names no dynamic parameter '{name}'"))
                })?;
            if is_pitch {
                def.is_pitch = true;
            } else {
                def.is_loudness = true;
            }
        }

        let lengths = |key: &str| -> Result<Vec<usize>> {
            config
                .get(key)
                .iter()
                .filter_map(|v| v.as_number())
                .map(|n| {
                    if n >= 1.0 && n.fract() == 0.0 {
                        Ok(n as usize)
                    } else {
                        Err(SynthError::invalid_config(
                            NAME,
                            format!("'{key}' length must be a positive integer, got {n}"),
                        ))
                    }
                })
                .collect()
        };
        let state = StateLayout {
            floats: lengths("state_float")?,
            doubles: lengths("state_double")?,
            ints: lengths("state_int")?,
        };

        let dynamics: Vec<DataType> = defs
            .iter()
            .map(|d| match (d.kind, d.smoothed) {
                (PluggableParamKind::Dynamic, true) => DataType::FloatArray,
                _ => DataType::Double,
            })
            .collect();
        let statics = defs
            .iter()
            .filter(|d| d.kind == PluggableParamKind::Static)
            .map(|_| DataType::Double);
        let signature = |head: &[DataType], tail: &[DataType]| {
            let params: Vec<DataType> = head.iter().chain(tail).copied().collect();
            Signature::new(params, DataType::Boolean)
        };
        let tail: Vec<DataType> = dynamics.into_iter().chain(state.types()).collect();
        let init_tail: Vec<DataType> = statics.chain(state.types()).collect();
        use DataType::{Double, FloatArray, Integer};

        Ok(Self {
            stereo: signature(&[FloatArray, FloatArray, Double, Integer], &tail),
            mono: signature(&[FloatArray, Double, Integer], &tail),
            init_signature: signature(&[Double, Double, Double, Integer], &init_tail),
            data,
            init: config.text("init").map(str::to_string),
            defs,
            state,
            oversampled: config.flag("oversampling").unwrap_or(false),
        })
    }

    fn resolve_data(&self, host: &dyn FormulaHost) -> Result<(FuncId, Channels)> {
        let candidates = [self.stereo.clone(), self.mono.clone()];
        let (id, index) = resolve_any(host, &self.data, &candidates)?;
        Ok((id, if index == 0 { Channels::Stereo } else { Channels::Mono }))
    }

    fn resolve_init(&self, host: &dyn FormulaHost) -> Result<Option<FuncId>> {
        self.init
            .as_deref()
            .map(|name| resolve(host, name, &self.init_signature))
            .transpose()
    }
}

impl PluggableProcessorTemplate for UserEffectTemplate {
    fn param_defs(&self) -> &[PluggableParamDef] {
        &self.defs
    }

    fn check_unreferenced_objects(&self, host: &dyn FormulaHost) -> Result<()> {
        self.resolve_init(host)?;
        self.resolve_data(host).map(|_| ())
    }

    fn create(&self, synth: &SynthParams, static_values: &[f64]) -> Result<Box<dyn PluggableProcessor>> {
        let host = synth.host();
        let (data, channels) = self.resolve_data(host)?;
        let os = synth.oversampling();
        let downsample = os > 1 && !self.oversampled;
        let (rate, max_count) = if downsample {
            (synth.base_sample_rate(), synth.max_block_len() / os)
        } else {
            (synth.sample_rate(), synth.max_block_len())
        };
        let sets = match channels {
            Channels::Stereo => 1,
            Channels::Mono => 2,
        };
        let mut states: Vec<StateSet> = (0..sets).map(|_| self.state.allocate()).collect();

        let mut values = vec![0.0; self.defs.len()];
        for (v, s) in values.iter_mut().zip(static_values) {
            *v = *s;
        }

        if let Some(init) = self.resolve_init(host)? {
            let statics: Vec<f64> = self
                .defs
                .iter()
                .zip(&values)
                .filter(|(d, _)| d.kind == PluggableParamKind::Static)
                .map(|(_, v)| *v)
                .collect();
            for state in &mut states {
                let mut args = vec![
                    Arg::Double(synth.elapsed_seconds()),
                    Arg::Double(synth.tempo()),
                    Arg::Double(rate),
                    Arg::Integer(max_count as i32),
                ];
                args.extend(statics.iter().map(|&v| Arg::Double(v)));
                state.push_args(&mut args);
                check_status(host, init, &mut args)?;
            }
        }

        let ramps = self
            .defs
            .iter()
            .filter(|d| d.kind == PluggableParamKind::Dynamic && d.smoothed)
            .map(|_| vec![0.0f32; max_count])
            .collect();
        #[cfg(feature = "tracing")]
        tracing::debug!("user_effect '{}': {channels:?}, {} params, rate {rate}", self.data, self.defs.len());

        Ok(Box::new(UserEffect {
            data,
            channels,
            slots: self.defs.iter().map(|d| (d.kind, d.smoothed)).collect(),
            previous: values.clone(),
            current: values,
            ramps,
            states,
            downsample,
            rate,
            upsamplers: [Upsampler::new(), Upsampler::new()],
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channels {
    Stereo,
    Mono,
}

#[derive(Debug)]
struct UserEffect {
    data: FuncId,
    channels: Channels,
    slots: Vec<(PluggableParamKind, bool)>,
    previous: Vec<f64>,
    current: Vec<f64>,
    ramps: Vec<Vec<f32>>,
    states: Vec<StateSet>,
    downsample: bool,
    rate: f64,
    upsamplers: [Upsampler; 2],
}

impl UserEffect {
    fn stage_ramps(&mut self, count: usize) {
        for ramp in &mut self.ramps {
            if ramp.len() < count {
                ramp.resize(count, 0.0);
            }
        }
        let smoothed = self
            .slots
            .iter()
            .zip(self.previous.iter().zip(&self.current))
            .filter(|((kind, smoothed), _)| *kind == PluggableParamKind::Dynamic && *smoothed);
        for (ramp, (_, (&from, &to))) in self.ramps.iter_mut().zip(smoothed) {
            fill_ramp(&mut ramp[..count], from, to, RampMode::Additive);
        }
    }

    fn run(&mut self, left: &mut [f32], right: &mut [f32], host: &dyn FormulaHost) -> Result<()> {
        let count = left.len().min(right.len());
        let data = self.data;
        match self.channels {
            Channels::Stereo => {
                self.stage_ramps(count);
                let mut args = vec![
                    Arg::FloatArray(&mut left[..count]),
                    Arg::FloatArray(&mut right[..count]),
                ];
                self.push_tail(&mut args, count, 0);
                check_status(host, data, &mut args)
            }
            Channels::Mono => {
                for (set, channel) in [left, right].into_iter().enumerate() {
                    self.stage_ramps(count);
                    let mut args = vec![Arg::FloatArray(&mut channel[..count])];
                    self.push_tail(&mut args, count, set);
                    check_status(host, data, &mut args)?;
                }
                Ok(())
            }
        }
    }

    fn push_tail<'a>(&'a mut self, args: &mut Vec<Arg<'a>>, count: usize, set: usize) {
        let Self {
            slots,
            current,
            ramps,
            states,
            rate,
            ..
        } = self;
        args.push(Arg::Double(*rate));
        args.push(Arg::Integer(count as i32));
        let mut ramps = ramps.iter_mut();
        let mut statics = Vec::new();
        for (&(kind, smoothed), &value) in slots.iter().zip(current.iter()) {
            match kind {
                PluggableParamKind::Dynamic if smoothed => {
                    if let Some(ramp) = ramps.next() {
                        args.push(Arg::FloatArray(&mut ramp[..count]));
                    }
                }
                PluggableParamKind::Dynamic => args.push(Arg::Double(value)),
                PluggableParamKind::Static => statics.push(Arg::Double(value)),
            }
        }
        args.append(&mut statics);
        if let Some(state) = states.get_mut(set) {
            state.push_args(args);
        }
    }
}

impl PluggableProcessor for UserEffect {
    fn update_params(&mut self, values: &[f64]) {
        for ((current, &value), &(kind, _)) in self.current.iter_mut().zip(values).zip(&self.slots) {
            if kind == PluggableParamKind::Dynamic {
                *current = value;
            }
        }
    }

    fn apply(&mut self, left: &mut [f32], right: &mut [f32], synth: &SynthParams) -> Result<()> {
        let len = left.len().min(right.len());
        let (left, right) = (&mut left[..len], &mut right[..len]);
        if self.downsample {
            let os = synth.oversampling();
            let count = len.div_ceil(os);
            let mut low_left = synth.acquire(count)?;
            let mut low_right = synth.acquire(count)?;
            downsample_average(left, &mut low_left, os);
            downsample_average(right, &mut low_right, os);
            self.run(&mut low_left, &mut low_right, synth.host())?;
            let [up_left, up_right] = &mut self.upsamplers;
            up_left.process(&low_left, left, os);
            up_right.process(&low_right, right, os);
        } else {
            self.run(left, right, synth.host())?;
        }
        scrub_non_finite(left);
        scrub_non_finite(right);
        self.previous.copy_from_slice(&self.current);
        Ok(())
    }
}

fn check_status(host: &dyn FormulaHost, id: FuncId, args: &mut [Arg<'_>]) -> Result<()> {
    if eval_user_effect(host, id, args)?.as_bool() {
        return Ok(());
    }
    Err(SynthError::UserEffectEval {
        function: host.name(id).unwrap_or("<unnamed>").to_string(),
        source: EvalError::new(EvalErrorCode::Aborted, "function reported failure"),
    })
}

/// Replaces NaN and infinite samples with silence.
fn scrub_non_finite(buf: &mut [f32]) {
    for x in buf.iter_mut().filter(|x| !x.is_finite()) {
        *x = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SynthSettings;
    use crate::formula::{FunctionTable, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    fn synth_with(host: FunctionTable, oversampling: u32) -> SynthParams {
        let settings = SynthSettings {
            sample_rate: 4800.0,
            envelope_rate: 100.0,
            oversampling,
            ..SynthSettings::default()
        };
        SynthParams::new(settings, Arc::new(host)).unwrap()
    }

    fn data_config(data: &str) -> PluggableConfig {
        let mut config = PluggableConfig::new();
        config.push_text("data", data);
        config
    }

    fn stereo_sig(extra: &[DataType]) -> Signature {
        let mut params = vec![DataType::FloatArray, DataType::FloatArray, DataType::Double, DataType::Integer];
        params.extend_from_slice(extra);
        Signature::new(params, DataType::Boolean)
    }

    fn processor(config: &PluggableConfig, synth: &SynthParams, values: &[f64]) -> Box<dyn PluggableProcessor> {
        let template = UserEffectFactory.create_template(config, EffectRole::Track).unwrap();
        template.check_unreferenced_objects(synth.host()).unwrap();
        let mut p = template.create(synth, values).unwrap();
        p.update_params(values);
        p
    }

    #[test]
    fn scrubs_non_finite_output() {
        let mut host = FunctionTable::new();
        host.register("poison", stereo_sig(&[]), |args| {
            if let Arg::FloatArray(left) = &mut args[0] {
                left[0] = f32::NAN;
                left[1] = f32::INFINITY;
            }
            if let Arg::FloatArray(right) = &mut args[1] {
                right[0] = f32::NEG_INFINITY;
            }
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 1);
        let mut p = processor(&data_config("poison"), &synth, &[]);
        let mut left = vec![0.5f32; 4];
        let mut right = vec![0.5f32; 4];
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left, [0.0, 0.0, 0.5, 0.5]);
        assert_eq!(right, [0.0, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn mismatched_data_function() {
        let mut host = FunctionTable::new();
        host.register_scalar("wrong", 2, |a| a[0]);
        let template = UserEffectFactory
            .create_template(&data_config("wrong"), EffectRole::Track)
            .unwrap();
        let err = template.check_unreferenced_objects(&host).unwrap_err();
        assert!(matches!(err, SynthError::FunctionTypeMismatchMultiple { candidates: 2, .. }));
        let err = template
            .check_unreferenced_objects(&FunctionTable::new())
            .unwrap_err();
        assert_eq!(err, SynthError::UndefinedFunction("wrong".into()));
    }

    #[test]
    fn mono_function_runs_per_channel_with_own_state() {
        let mut host = FunctionTable::new();
        let sig = Signature::new(
            vec![
                DataType::FloatArray,
                DataType::Double,
                DataType::Integer,
                DataType::Double,
                DataType::IntegerArray,
            ],
            DataType::Boolean,
        );
        host.register("gain", sig, |args| {
            let gain = args[3].as_f64().unwrap_or(0.0) as f32;
            let mut calls = 0;
            if let Arg::IntegerArray(state) = &mut args[4] {
                state[0] += 1;
                calls = state[0];
            }
            if let Arg::FloatArray(data) = &mut args[0] {
                for x in data.iter_mut() {
                    *x *= gain * calls as f32;
                }
            }
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 1);
        let mut config = data_config("gain");
        config
            .push_text("unsmoothed", "gain")
            .push("state_int", crate::pluggable::ConfigValue::Number(1.0));
        let mut p = processor(&config, &synth, &[0.5]);
        for expected in [0.5f32, 1.0] {
            let mut left = vec![1.0f32; 3];
            let mut right = vec![2.0f32; 3];
            p.apply(&mut left, &mut right, &synth).unwrap();
            assert!(left.iter().all(|&x| x == expected));
            assert!(right.iter().all(|&x| x == 2.0 * expected));
        }
    }

    #[test]
    fn smoothed_params_ramp_across_the_block() {
        let mut host = FunctionTable::new();
        host.register("copy_param", stereo_sig(&[DataType::FloatArray]), |args| {
            let mut ramp = [0.0f32; 4];
            if let Arg::FloatArray(p) = &args[4] {
                ramp.copy_from_slice(&p[..4]);
            }
            if let Arg::FloatArray(left) = &mut args[0] {
                left.copy_from_slice(&ramp);
            }
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 1);
        let mut config = data_config("copy_param");
        config.push_text("param", "level");
        let mut p = processor(&config, &synth, &[0.0]);
        p.update_params(&[1.0]);
        let mut left = vec![0.0f32; 4];
        let mut right = vec![0.0f32; 4];
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left, [0.25, 0.5, 0.75, 1.0]);
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left, [1.0; 4]);
    }

    #[test]
    fn downsamples_when_oversampling_is_off() {
        let mut host = FunctionTable::new();
        let seen = Rc::new(Cell::new((0i32, 0.0f64)));
        let record = Rc::clone(&seen);
        host.register("observe", stereo_sig(&[]), move |args| {
            let count = match args[3] {
                Arg::Integer(n) => n,
                _ => -1,
            };
            record.set((count, args[2].as_f64().unwrap_or(0.0)));
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 2);
        let mut p = processor(&data_config("observe"), &synth, &[]);
        let mut left = vec![1.0f32; 8];
        let mut right = vec![1.0f32; 8];
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(seen.get(), (4, 4800.0));
        assert_eq!(left[7], 1.0);
    }

    #[test]
    fn smoothed_params_follow_blocks_longer_than_a_tick() {
        let mut host = FunctionTable::new();
        host.register("copy_param", stereo_sig(&[DataType::FloatArray]), |args| {
            let ramp = match &args[4] {
                Arg::FloatArray(p) => p.to_vec(),
                _ => Vec::new(),
            };
            if let Arg::FloatArray(left) = &mut args[0] {
                left.copy_from_slice(&ramp);
            }
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 1);
        assert!(synth.max_block_len() < 64);
        let mut config = data_config("copy_param");
        config.push_text("param", "level");
        let mut p = processor(&config, &synth, &[0.0]);
        p.update_params(&[1.0]);
        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 64];
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(left[31], 0.5);
        assert_eq!(left[63], 1.0);
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert!(left.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn downsampling_covers_a_partial_final_group() {
        let mut host = FunctionTable::new();
        let seen = Rc::new(Cell::new(0i32));
        let record = Rc::clone(&seen);
        host.register("half", stereo_sig(&[]), move |args| {
            if let Arg::Integer(n) = args[3] {
                record.set(n);
            }
            for arg in &mut args[..2] {
                if let Arg::FloatArray(data) = arg {
                    data.fill(0.5);
                }
            }
            Ok(Value::Boolean(true))
        });
        let synth = synth_with(host, 2);
        let mut p = processor(&data_config("half"), &synth, &[]);
        let mut left = vec![1.0f32; 9];
        let mut right = vec![1.0f32; 9];
        p.apply(&mut left, &mut right, &synth).unwrap();
        assert_eq!(seen.get(), 5);
        assert_eq!(left[0], 0.25);
        assert_eq!(left[8], 0.5);
        assert_eq!(right[8], 0.5);
    }

    #[test]
    fn init_sees_statics_and_false_aborts() {
        let mut host = FunctionTable::new();
        let init_sig = Signature::new(
            vec![
                DataType::Double,
                DataType::Double,
                DataType::Double,
                DataType::Integer,
                DataType::Double,
            ],
            DataType::Boolean,
        );
        host.register("setup", init_sig, |args| {
            Ok(Value::Boolean(args[4].as_f64() == Some(3.0)))
        });
        host.register("pass", stereo_sig(&[DataType::Double]), |_| Ok(Value::Boolean(true)));
        let synth = synth_with(host, 1);
        let mut config = data_config("pass");
        config.push_text("init", "setup").push_text("static", "size");
        let template = UserEffectFactory.create_template(&config, EffectRole::Track).unwrap();
        assert!(template.create(&synth, &[3.0]).is_ok());
        let err = template.create(&synth, &[2.0]).unwrap_err();
        assert!(matches!(err, SynthError::UserEffectEval { .. }));
    }

    #[test]
    fn pitch_param_must_be_dynamic() {
        let mut config = data_config("f");
        config.push_text("static", "freq").push_text("pitch_param", "freq");
        assert!(UserEffectFactory.create_template(&config, EffectRole::Oscillator).is_err());

        let mut config = data_config("f");
        config.push_text("unsmoothed", "freq").push_text("pitch_param", "freq");
        let template = UserEffectFactory.create_template(&config, EffectRole::Oscillator).unwrap();
        assert!(template.param_defs()[0].is_pitch);
    }
}
