//! Native formulas every project can reference by name.
//!
//! | name | shape | use |
//! |------|-------|-----|
//! | `effect_accent1` .. `effect_accent8` | `(a1..a8) -> a_n` | track control following one effect accent |
//! | `accent_stretch` | `(base, a1..a8, pitch) -> base * 2^a1` | envelope phase duration or endpoint |
//! | `key_follow` | `(base, a1..a8, pitch) -> base * middle_c / pitch` | envelope phase duration shrinking with pitch |
//! | `db_to_gain` | `(value, pitch) -> 10^(value / 20)` | envelope transform |
//! | `stereo_gain` | `user_effect` data function, one unsmoothed `gain` | scales both channels |

use cadenza_synth::formula::{Arg, EvalError, EvalErrorCode};
use cadenza_synth::{DataType, FunctionTable, NUM_ACCENTS, Signature, Value};

const MIDDLE_C_HZ: f64 = 261.625_565_300_598_6;

/// Names registered by [`builtin_functions`].
pub const BUILTIN_NAMES: &[&str] = &[
    "effect_accent1",
    "effect_accent2",
    "effect_accent3",
    "effect_accent4",
    "effect_accent5",
    "effect_accent6",
    "effect_accent7",
    "effect_accent8",
    "accent_stretch",
    "key_follow",
    "db_to_gain",
    "stereo_gain",
];

/// A function table holding the built-in formulas.
///
/// Callers may register more functions on the returned table; a later
/// registration under a built-in name replaces it.
pub fn builtin_functions() -> FunctionTable {
    let mut table = FunctionTable::new();
    for (i, name) in BUILTIN_NAMES.iter().take(NUM_ACCENTS).enumerate() {
        table.register_scalar(name, NUM_ACCENTS, move |a| a[i]);
    }
    table.register_scalar("accent_stretch", NUM_ACCENTS + 2, |a| a[0] * libm::exp2(a[1]));
    table.register_scalar("key_follow", NUM_ACCENTS + 2, |a| {
        let pitch = a[NUM_ACCENTS + 1];
        if pitch > 0.0 { a[0] * MIDDLE_C_HZ / pitch } else { a[0] }
    });
    table.register_scalar("db_to_gain", 2, |a| libm::pow(10.0, a[0] / 20.0));
    table.register("stereo_gain", stereo_gain_signature(), stereo_gain);
    table
}

fn stereo_gain_signature() -> Signature {
    use DataType::{Boolean, Double, FloatArray, Integer};
    Signature::new(vec![FloatArray, FloatArray, Double, Integer, Double], Boolean)
}

fn stereo_gain(args: &mut [Arg<'_>]) -> Result<Value, EvalError> {
    let mismatch = || EvalError::new(EvalErrorCode::ArgumentMismatch, "stereo_gain argument");
    let (Some(&Arg::Integer(count)), Some(&Arg::Double(gain))) = (args.get(3), args.get(4)) else {
        return Err(mismatch());
    };
    let count = usize::try_from(count).map_err(|_| mismatch())?;
    let gain = gain as f32;
    for arg in args.iter_mut().take(2) {
        let Arg::FloatArray(data) = arg else {
            return Err(mismatch());
        };
        let Some(data) = data.get_mut(..count) else {
            return Err(EvalError::new(EvalErrorCode::ArrayIndexOutOfRange, "stereo_gain count"));
        };
        for x in data {
            *x *= gain;
        }
    }
    Ok(Value::Boolean(true))
}
