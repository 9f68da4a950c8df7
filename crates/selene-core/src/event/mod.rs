//! Cooperative event loop
//!
//! Every interpreter carries an [`EventQueue`] of named handlers, timers and
//! pending events. A thread's driver repeatedly calls [`EventLoop::step`]
//! until it returns [`LoopStatus::Quit`]; the default implementation is the
//! [`Dispatcher`].

mod dispatcher;
pub(crate) mod library;
mod queue;

pub use dispatcher::Dispatcher;
pub use queue::{Event, EventQueue, SubscriptionId};

use crate::sync::Session;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one loop step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Keep stepping
    Continue,
    /// Stop the loop; the thread completes
    Quit,
}

/// One interpreter's cooperative loop
///
/// `step` runs with the interpreter locked. Implementations must release the
/// lock through [`Session::suspend`] before any blocking wait.
pub trait EventLoop: Send {
    /// Run one iteration
    fn step(&mut self, session: &mut Session<'_>) -> LoopStatus;
}

/// Dispatcher tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopOptions {
    /// Longest idle wait before the loop re-checks its queue
    pub idle_slice_ms: u64,
    /// Events dispatched per step before yielding
    pub max_events_per_step: usize,
}

impl LoopOptions {
    /// Idle slice as a duration
    pub fn idle_slice(&self) -> Duration {
        Duration::from_millis(self.idle_slice_ms)
    }
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            idle_slice_ms: 50,
            max_events_per_step: 64,
        }
    }
}
