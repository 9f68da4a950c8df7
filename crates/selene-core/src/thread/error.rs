//! Thread error types

use crate::transfer::TransferError;
use crate::value::Value;
use thiserror::Error;

/// Errors returned by thread operations
#[derive(Debug, Clone, Error)]
pub enum ThreadError {
    /// The thread is DEAD
    #[error("thread has stopped")]
    Dead,

    /// A thread tried to call or wait on itself
    #[error("a thread cannot call or wait on itself")]
    SelfCall,

    /// Arguments could not be transferred into the thread
    #[error(transparent)]
    Transfer(TransferError),

    /// Results could not be transferred back to the caller
    #[error("cannot return results: {0}")]
    ResultTransfer(TransferError),

    /// The called function raised an error
    #[error(transparent)]
    Call(CallError),

    /// The thread never started
    #[error("thread failed to start: {0}")]
    Bootstrap(BootstrapError),
}

/// Why a spawned thread never became callable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The entry function or its arguments could not be transferred
    #[error("cannot transfer entry: {0}")]
    Transfer(TransferError),

    /// The entry function raised an error
    #[error("entry failed: {0}")]
    Entry(String),

    /// The OS refused to start a thread
    #[error("cannot start OS thread: {0}")]
    Spawn(String),
}

/// A script error raised inside a called thread
///
/// `value` is a copy of the error value living in the caller's interpreter.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallError {
    /// Error value, copied into the caller
    pub value: Value,
    /// Readable rendering of the error
    pub message: String,
}
