//! Thread identifiers and lifecycle states

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a Thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    /// Create a new unique thread ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ThreadId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a Thread
///
/// ```text
/// INIT ──bootstrap──► ACTIVE ◄──► IDLE
///   │                   │          │
///   └───────────────────┴──────────┴──► DEAD
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// OS thread started, entry not finished yet
    Init = 0,
    /// Running its loop or a call
    Active = 1,
    /// Loop waiting with the interpreter unlocked
    Idle = 2,
    /// Terminal
    Dead = 3,
}

impl LifecycleState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Init,
            1 => LifecycleState::Active,
            2 => LifecycleState::Idle,
            _ => LifecycleState::Dead,
        }
    }

    /// Whether the thread accepts calls without waiting for bootstrap
    pub fn is_callable(self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::Idle)
    }

    /// Name used by the script `thread.status`
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Init => "init",
            LifecycleState::Active => "active",
            LifecycleState::Idle => "idle",
            LifecycleState::Dead => "dead",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a Thread reached DEAD
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// Not dead yet
    Running = 0,
    /// Loop finished normally; final values can be read by `wait`
    Completed = 1,
    /// Bootstrap failed or the driver panicked
    Failed = 2,
    /// Killed
    Killed = 3,
}

impl ExitStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ExitStatus::Running,
            1 => ExitStatus::Completed,
            2 => ExitStatus::Failed,
            _ => ExitStatus::Killed,
        }
    }
}
