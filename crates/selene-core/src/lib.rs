//! Selene Core Runtime
//!
//! This crate provides the concurrency core of the Selene scripting runtime:
//! - Isolated interpreters with a small base library
//! - Deep copy and move of values between interpreters
//! - Threads pairing one OS thread with one interpreter
//! - Per-thread event queues driven by pluggable event loops
//! - TOML runtime configuration and log output setup

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builtins;
pub mod config;
pub mod event;
pub mod heap;
pub mod logging;
pub mod object;
pub mod sync;
pub mod thread;
pub mod transfer;
pub mod value;
pub mod vm;

pub use config::{ConfigError, LoggingOptions, RuntimeConfig, ThreadOptions};
pub use event::{
    Dispatcher, Event, EventLoop, EventQueue, LoopOptions, LoopStatus, SubscriptionId,
};
pub use object::{Closure, Table, TableKey, Userdata};
pub use sync::{InterruptHandle, Session, SuspendGuard, Wakeup};
pub use thread::{
    BootstrapError, CallError, ExitStatus, LifecycleState, Thread, ThreadBuilder, ThreadError,
    ThreadId, WeakThread,
};
pub use transfer::{
    copy_slice, copy_values, move_values, CopyCache, TransferError, TransferErrorKind,
    TransferOperation, TransferPolicy, ValueKind,
};
pub use value::{Function, NativeFn, NativeFunction, ObjRef, Value};
pub use vm::{Interpreter, InterpreterId, InterpreterOptions, VmError};
