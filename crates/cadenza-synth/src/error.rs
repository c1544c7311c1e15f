//! Error types for the synthesis engine.
//!
//! Every fallible engine operation returns [`Result`]. The first failure
//! short-circuits the whole call chain with `?`; a tick that fails leaves no
//! partially applied state for the caller to rely on.

#[cfg(not(feature = "std"))]
use alloc::string::{String, ToString};

use thiserror::Error;

use crate::formula::{EvalError, Signature};

/// Engine result type.
pub type Result<T> = core::result::Result<T, SynthError>;

/// Errors raised while building or running a synthesis graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// A sample name that the wave library does not define
    #[error("undefined sample '{0}'")]
    UndefinedSample(String),

    /// A wave table name that the wave library does not define
    #[error("undefined wave table '{0}'")]
    UndefinedWaveTable(String),

    /// A function name the formula host cannot resolve
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    /// A function whose signature differs from the one required
    #[error("function '{name}' has signature {found}, expected {expected}")]
    FunctionTypeMismatch {
        /// Function name.
        name: String,
        /// Signature the call site requires.
        expected: Signature,
        /// Signature the host reports.
        found: Signature,
    },

    /// A function matching none of several accepted signatures
    #[error("function '{name}' has signature {found}, which matches none of the {candidates} accepted forms")]
    FunctionTypeMismatchMultiple {
        /// Function name.
        name: String,
        /// Number of accepted signatures.
        candidates: usize,
        /// Signature the host reports.
        found: Signature,
    },

    /// A pluggable processor's transfer or init function failed
    #[error("user effect function '{function}' failed: {source}")]
    UserEffectEval {
        /// Function name.
        function: String,
        /// Evaluator failure.
        #[source]
        source: EvalError,
    },

    /// An envelope, LFO, or control formula failed
    #[error("formula '{function}' failed: {source}")]
    UserFormulaEval {
        /// Function name.
        function: String,
        /// Evaluator failure.
        #[source]
        source: EvalError,
    },

    /// A template violating a structural invariant
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A pluggable processor name the registry does not know
    #[error("unknown processor '{0}'")]
    UnknownProcessor(String),

    /// A pluggable processor configuration rejected by its factory
    #[error("invalid configuration for processor '{processor}': {reason}")]
    InvalidProcessorConfig {
        /// Processor name.
        processor: String,
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A score command that could not be parsed
    #[error("invalid command '{0}'")]
    InvalidCommand(String),

    /// Every scratch region is already borrowed
    #[error("scratch pool exhausted")]
    ScratchExhausted,
}

/// Coarse classification of a [`SynthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthErrorSubCode {
    /// Undefined sample.
    UndefinedSample,
    /// Undefined wave table.
    UndefinedWaveTable,
    /// Undefined function.
    UndefinedFunction,
    /// Signature mismatch against one expected form.
    FunctionTypeMismatch,
    /// Signature mismatch against several accepted forms.
    FunctionTypeMismatchMultiple,
    /// User effect evaluation failure.
    UserEffectEval,
    /// Formula evaluation failure.
    UserFormulaEval,
    /// Structural template problem.
    InvalidTemplate,
    /// Unknown pluggable processor.
    UnknownProcessor,
    /// Rejected pluggable configuration.
    InvalidProcessorConfig,
    /// Unparseable score command.
    InvalidCommand,
    /// Scratch pool exhausted.
    ScratchExhausted,
}

impl SynthError {
    /// Classifies the error.
    pub fn sub_code(&self) -> SynthErrorSubCode {
        match self {
            Self::UndefinedSample(_) => SynthErrorSubCode::UndefinedSample,
            Self::UndefinedWaveTable(_) => SynthErrorSubCode::UndefinedWaveTable,
            Self::UndefinedFunction(_) => SynthErrorSubCode::UndefinedFunction,
            Self::FunctionTypeMismatch { .. } => SynthErrorSubCode::FunctionTypeMismatch,
            Self::FunctionTypeMismatchMultiple { .. } => {
                SynthErrorSubCode::FunctionTypeMismatchMultiple
            }
            Self::UserEffectEval { .. } => SynthErrorSubCode::UserEffectEval,
            Self::UserFormulaEval { .. } => SynthErrorSubCode::UserFormulaEval,
            Self::InvalidTemplate(_) => SynthErrorSubCode::InvalidTemplate,
            Self::UnknownProcessor(_) => SynthErrorSubCode::UnknownProcessor,
            Self::InvalidProcessorConfig { .. } => SynthErrorSubCode::InvalidProcessorConfig,
            Self::InvalidCommand(_) => SynthErrorSubCode::InvalidCommand,
            Self::ScratchExhausted => SynthErrorSubCode::ScratchExhausted,
        }
    }

    /// Evaluator failure carried by this error, if any.
    pub fn eval_error(&self) -> Option<&EvalError> {
        match self {
            Self::UserEffectEval { source, .. } | Self::UserFormulaEval { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Create an invalid template error.
    pub fn invalid_template(reason: impl Into<String>) -> Self {
        Self::InvalidTemplate(reason.into())
    }

    /// Create an invalid processor configuration error.
    pub fn invalid_config(processor: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProcessorConfig {
            processor: processor.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{DataType, EvalErrorCode};
    use core::error::Error as _;

    #[test]
    fn test_undefined_display() {
        let err = SynthError::UndefinedWaveTable("bells".to_string());
        assert_eq!(err.to_string(), "undefined wave table 'bells'");
        assert_eq!(err.sub_code(), SynthErrorSubCode::UndefinedWaveTable);
    }

    #[test]
    fn test_mismatch_display() {
        let err = SynthError::FunctionTypeMismatch {
            name: "shape".to_string(),
            expected: Signature::new([DataType::Double], DataType::Double),
            found: Signature::new([DataType::Integer], DataType::Double),
        };
        assert_eq!(
            err.to_string(),
            "function 'shape' has signature (integer) -> double, expected (double) -> double"
        );
    }

    #[test]
    fn test_eval_error_is_source() {
        let err = SynthError::UserEffectEval {
            function: "crush".to_string(),
            source: EvalError::new(EvalErrorCode::DivideByZero, "x / 0"),
        };
        assert!(err.source().is_some());
        assert_eq!(err.eval_error().map(|e| e.code), Some(EvalErrorCode::DivideByZero));
        assert_eq!(err.sub_code(), SynthErrorSubCode::UserEffectEval);
    }

    #[test]
    fn test_factories() {
        assert_eq!(
            SynthError::invalid_config("user_effect", "missing data").to_string(),
            "invalid configuration for processor 'user_effect': missing data"
        );
        assert!(SynthError::invalid_template("bad origin").eval_error().is_none());
    }
}
