//! Interrupt flag shared between a thread handle and its interpreter

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative interrupt flag
///
/// Once raised it stays raised; the interpreter polls it at calls and
/// backward jumps and unwinds with [`crate::VmError::Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Create a lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
