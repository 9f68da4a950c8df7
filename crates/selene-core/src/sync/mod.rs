//! Synchronization primitives shared by threads and their event loops
//!
//! - [`InterruptHandle`]: cooperative kill flag polled by the interpreter
//! - [`Wakeup`]: lost-wakeup-free signal for idle event loops
//! - [`Session`] / [`SuspendGuard`]: locked access to a thread's interpreter
//!   that can be released around blocking waits

mod guard;
mod interrupt;
mod wakeup;

pub use guard::{Session, SuspendGuard};
pub use interrupt::InterruptHandle;
pub use wakeup::Wakeup;
