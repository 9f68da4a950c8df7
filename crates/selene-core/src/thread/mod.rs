//! Threads: interpreters running on their own OS threads
//!
//! A [`Thread`] owns one [`Interpreter`](crate::Interpreter), guarded by a
//! mutex, and the OS thread that drives it. The driver runs the entry
//! function, then the thread's [`EventLoop`](crate::event::EventLoop) until
//! it quits. Other threads reach in with [`Thread::call`], which copies the
//! function and arguments in and the results back out.

mod builder;
mod driver;
mod error;
mod handle;
pub(crate) mod library;
pub mod registry;
mod shared;
mod state;

pub use builder::ThreadBuilder;
pub use error::{BootstrapError, CallError, ThreadError};
pub use handle::{Thread, WeakThread};
pub use library::{push_handle, to_thread, HANDLE_TYPE};
pub use state::{ExitStatus, LifecycleState, ThreadId};

pub(crate) use shared::ThreadCore;
