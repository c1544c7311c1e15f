//! Contract between the engine and the embedded formula evaluator.
//!
//! Envelope phases, LFOs, track-effect controls and pluggable processors can
//! all name functions supplied by an external language runtime. The engine
//! only needs four things from that runtime, captured by [`FormulaHost`]:
//! resolve a name to a handle, report the handle's signature, report its name
//! for diagnostics, and evaluate it with positional arguments producing
//! exactly one value.
//!
//! [`FunctionTable`] is a native host backed by Rust closures. It is what the
//! tests, the CLI and embedded users without a language runtime plug in.

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use core::fmt;
use thiserror::Error;

use crate::error::{Result, SynthError};

/// Type of one argument or return slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataType {
    /// `bool`
    Boolean,
    /// `i32`
    Integer,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// Mutable `[f32]`
    FloatArray,
    /// Mutable `[f64]`
    DoubleArray,
    /// Mutable `[i32]`
    IntegerArray,
}

impl DataType {
    /// Lowercase name used in signatures.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Double => "double",
            Self::FloatArray => "floatarray",
            Self::DoubleArray => "doublearray",
            Self::IntegerArray => "integerarray",
        }
    }
}

/// Parameter list and return type of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Positional parameter types.
    pub params: Vec<DataType>,
    /// Return type.
    pub returns: DataType,
}

impl Signature {
    /// Creates a signature.
    pub fn new(params: impl Into<Vec<DataType>>, returns: DataType) -> Self {
        Self {
            params: params.into(),
            returns,
        }
    }

    /// `arity` doubles returning a double.
    pub fn scalar(arity: usize) -> Self {
        Self::new(vec_of(DataType::Double, arity), DataType::Double)
    }
}

fn vec_of(ty: DataType, n: usize) -> Vec<DataType> {
    core::iter::repeat_n(ty, n).collect()
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.name())?;
        }
        write!(f, ") -> {}", self.returns.name())
    }
}

/// Opaque handle to a resolved function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// One positional argument.
///
/// Arrays are passed by mutable reference so the callee can write results
/// and persistent state in place.
#[derive(Debug)]
pub enum Arg<'a> {
    /// Boolean scalar.
    Boolean(bool),
    /// Integer scalar.
    Integer(i32),
    /// Single-precision scalar.
    Float(f32),
    /// Double-precision scalar.
    Double(f64),
    /// Single-precision array.
    FloatArray(&'a mut [f32]),
    /// Double-precision array.
    DoubleArray(&'a mut [f64]),
    /// Integer array.
    IntegerArray(&'a mut [i32]),
}

impl Arg<'_> {
    /// Type of this argument.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::FloatArray(_) => DataType::FloatArray,
            Self::DoubleArray(_) => DataType::DoubleArray,
            Self::IntegerArray(_) => DataType::IntegerArray,
        }
    }

    /// Scalar value widened to `f64`; `None` for arrays.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
            Self::Integer(i) => Some(f64::from(i)),
            Self::Float(x) => Some(f64::from(x)),
            Self::Double(x) => Some(x),
            _ => None,
        }
    }
}

/// Scalar returned by a function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Boolean result.
    Boolean(bool),
    /// Integer result.
    Integer(i32),
    /// Single-precision result.
    Float(f32),
    /// Double-precision result.
    Double(f64),
}

impl Value {
    /// Type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
        }
    }

    /// Value widened to `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Boolean(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Integer(i) => f64::from(i),
            Self::Float(x) => f64::from(x),
            Self::Double(x) => x,
        }
    }

    /// Truthiness: non-zero numbers are true.
    pub fn as_bool(&self) -> bool {
        match *self {
            Self::Boolean(b) => b,
            other => other.as_f64() != 0.0,
        }
    }
}

/// Evaluator failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalErrorCode {
    /// Division by zero.
    DivideByZero,
    /// Array access outside its bounds.
    ArrayIndexOutOfRange,
    /// Arguments not matching the function's parameter list.
    ArgumentMismatch,
    /// Handle not known to the host.
    UnknownFunction,
    /// Evaluation stopped by the function itself.
    Aborted,
    /// Anything else.
    Other,
}

impl fmt::Display for EvalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DivideByZero => "divide by zero",
            Self::ArrayIndexOutOfRange => "array index out of range",
            Self::ArgumentMismatch => "argument mismatch",
            Self::UnknownFunction => "unknown function",
            Self::Aborted => "aborted",
            Self::Other => "evaluation error",
        })
    }
}

/// Structured failure reported by a [`FormulaHost`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct EvalError {
    /// Category.
    pub code: EvalErrorCode,
    /// Free-form detail.
    pub message: String,
}

impl EvalError {
    /// Creates an evaluator error.
    pub fn new(code: EvalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Narrow interface to the formula evaluator.
///
/// Implementations must be deterministic and must not reach back into engine
/// state except through the array arguments they are handed.
pub trait FormulaHost {
    /// Resolves a function name.
    fn lookup(&self, name: &str) -> Option<FuncId>;

    /// Signature of a resolved function.
    fn signature(&self, id: FuncId) -> Option<&Signature>;

    /// Name of a resolved function.
    fn name(&self, id: FuncId) -> Option<&str>;

    /// Evaluates `id` with positional `args`, producing exactly one value.
    fn eval(&self, id: FuncId, args: &mut [Arg<'_>]) -> core::result::Result<Value, EvalError>;
}

/// Resolves `name` and requires its signature to equal `expected`.
pub fn resolve(host: &dyn FormulaHost, name: &str, expected: &Signature) -> Result<FuncId> {
    let id = host
        .lookup(name)
        .ok_or_else(|| SynthError::UndefinedFunction(name.to_string()))?;
    let found = host
        .signature(id)
        .ok_or_else(|| SynthError::UndefinedFunction(name.to_string()))?;
    if found != expected {
        return Err(SynthError::FunctionTypeMismatch {
            name: name.to_string(),
            expected: expected.clone(),
            found: found.clone(),
        });
    }
    Ok(id)
}

/// Resolves `name` against several accepted signatures.
///
/// Returns the handle and the index of the first matching candidate.
pub fn resolve_any(
    host: &dyn FormulaHost,
    name: &str,
    candidates: &[Signature],
) -> Result<(FuncId, usize)> {
    let id = host
        .lookup(name)
        .ok_or_else(|| SynthError::UndefinedFunction(name.to_string()))?;
    let found = host
        .signature(id)
        .ok_or_else(|| SynthError::UndefinedFunction(name.to_string()))?;
    candidates
        .iter()
        .position(|c| c == found)
        .map(|index| (id, index))
        .ok_or_else(|| SynthError::FunctionTypeMismatchMultiple {
            name: name.to_string(),
            candidates: candidates.len(),
            found: found.clone(),
        })
}

fn function_name(host: &dyn FormulaHost, id: FuncId) -> String {
    host.name(id).unwrap_or("<unnamed>").to_string()
}

/// Evaluates a scalar formula of doubles, mapping failures to
/// [`SynthError::UserFormulaEval`].
pub fn eval_scalar(host: &dyn FormulaHost, id: FuncId, values: &[f64]) -> Result<f64> {
    let mut args: Vec<Arg<'_>> = values.iter().map(|&v| Arg::Double(v)).collect();
    host.eval(id, &mut args)
        .map(|v| v.as_f64())
        .map_err(|source| SynthError::UserFormulaEval {
            function: function_name(host, id),
            source,
        })
}

/// Evaluates a pluggable processor function, mapping failures to
/// [`SynthError::UserEffectEval`].
pub fn eval_user_effect(host: &dyn FormulaHost, id: FuncId, args: &mut [Arg<'_>]) -> Result<Value> {
    host.eval(id, args).map_err(|source| SynthError::UserEffectEval {
        function: function_name(host, id),
        source,
    })
}

/// Boxed native function body.
pub type NativeFn = Box<dyn Fn(&mut [Arg<'_>]) -> core::result::Result<Value, EvalError>>;

struct NativeEntry {
    name: String,
    signature: Signature,
    body: NativeFn,
}

/// [`FormulaHost`] backed by Rust closures.
///
/// ```rust
/// use cadenza_synth::formula::{FormulaHost, FunctionTable, eval_scalar};
///
/// let mut table = FunctionTable::new();
/// table.register_scalar("double_it", 1, |x| x[0] * 2.0);
/// let id = table.lookup("double_it").unwrap();
/// assert_eq!(eval_scalar(&table, id, &[21.0]).unwrap(), 42.0);
/// ```
#[derive(Default)]
pub struct FunctionTable {
    entries: Vec<NativeEntry>,
    by_name: BTreeMap<String, FuncId>,
}

impl FunctionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a function with an arbitrary signature.
    pub fn register(
        &mut self,
        name: &str,
        signature: Signature,
        body: impl Fn(&mut [Arg<'_>]) -> core::result::Result<Value, EvalError> + 'static,
    ) -> FuncId {
        let entry = NativeEntry {
            name: name.to_string(),
            signature,
            body: Box::new(body),
        };
        if let Some(&id) = self.by_name.get(name) {
            self.entries[id.0 as usize] = entry;
            return id;
        }
        let id = FuncId(self.entries.len() as u32);
        self.entries.push(entry);
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Registers a function of `arity` doubles returning a double.
    pub fn register_scalar(
        &mut self,
        name: &str,
        arity: usize,
        body: impl Fn(&[f64]) -> f64 + 'static,
    ) -> FuncId {
        self.register(name, Signature::scalar(arity), move |args| {
            let mut values = [0.0f64; 16];
            let mut spill = Vec::new();
            let slice: &mut [f64] = if args.len() <= values.len() {
                &mut values[..args.len()]
            } else {
                spill.resize(args.len(), 0.0);
                &mut spill
            };
            for (slot, arg) in slice.iter_mut().zip(args.iter()) {
                *slot = arg.as_f64().ok_or_else(|| {
                    EvalError::new(EvalErrorCode::ArgumentMismatch, "expected scalar argument")
                })?;
            }
            Ok(Value::Double(body(slice)))
        })
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no function is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl FormulaHost for FunctionTable {
    fn lookup(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    fn signature(&self, id: FuncId) -> Option<&Signature> {
        self.entries.get(id.0 as usize).map(|e| &e.signature)
    }

    fn name(&self, id: FuncId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    fn eval(&self, id: FuncId, args: &mut [Arg<'_>]) -> core::result::Result<Value, EvalError> {
        let entry = self.entries.get(id.0 as usize).ok_or_else(|| {
            EvalError::new(EvalErrorCode::UnknownFunction, "no function with this handle")
        })?;
        if args.len() != entry.signature.params.len()
            || args
                .iter()
                .zip(&entry.signature.params)
                .any(|(a, &ty)| a.data_type() != ty)
        {
            return Err(EvalError::new(
                EvalErrorCode::ArgumentMismatch,
                "arguments do not match the signature",
            ));
        }
        (entry.body)(args)
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}
