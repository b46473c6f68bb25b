// ABOUTME: Error types: soft evaluation diagnostics and the fatal out-of-memory condition

use thiserror::Error;

/// Soft diagnostics. These are printed as `[error] ...` on standard output;
/// the offending form yields NIL and evaluation continues. They are values
/// handed to `Interp::fail`, never propagated as `Err`.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    /// Builtin called with an argument count outside its arity spec.
    #[error("{name}: Got {got} args, expected {expected} at {form}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
        form: String,
    },

    /// User function applied to the wrong number of argument expressions.
    #[error("{name}: Arguments mismatch: {args}")]
    ArgumentsMismatch { name: String, args: String },

    /// Catch-all diagnostic attributed to a named form.
    #[error("{name}: {message}")]
    Form { name: String, message: String },

    /// Diagnostic with no form prefix.
    #[error("{0}")]
    Message(String),

    #[error("return: No active return point {form}")]
    NoReturnPoint { form: String },
}

impl EvalError {
    pub fn form(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Form {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        EvalError::Message(message.into())
    }
}

/// The allocator scanned past the end of the arena. This is the one fatal
/// error: it propagates through the reader and evaluator up to `main`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Memory exhausted.\nIncrease --cells or lower --gc-trigger.")]
pub struct OutOfMemory;
