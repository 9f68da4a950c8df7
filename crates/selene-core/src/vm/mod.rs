//! Interpreter instances and bytecode execution
//!
//! Each [`Interpreter`] is an isolated execution context with its own heap,
//! globals, registry, host stack and event queue. Nothing inside one is ever
//! shared with another; values cross over only by copy.

mod context;
mod interpreter;

pub use context::{Interpreter, InterpreterId, InterpreterOptions};

use crate::value::Value;

/// Errors raised while running script code
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
    /// A script error carrying its error value
    ///
    /// Use [`Interpreter::describe_error`] for a readable message.
    #[error("script error")]
    Raised(Value),

    /// Execution was interrupted because the owning thread was killed
    #[error("execution interrupted")]
    Interrupted,

    /// Malformed bytecode or a broken heap reference
    #[error("fault: {0}")]
    Fault(String),
}

impl VmError {
    /// Whether `pcall` may catch this error
    pub fn is_catchable(&self) -> bool {
        !matches!(self, VmError::Interrupted)
    }
}
