//! Wake-up signal for idle event loops

use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// A sticky wake-up signal
///
/// `notify` sets a pending flag before signalling, so a notification that
/// arrives while nobody waits is observed by the next `wait_until`.
#[derive(Debug, Default)]
pub struct Wakeup {
    pending: Mutex<bool>,
    signal: Condvar,
}

impl Wakeup {
    /// Create a signal with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the waiter, or the next one to arrive
    pub fn notify(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.signal.notify_all();
    }

    /// Block until notified or `deadline` passes
    ///
    /// Returns true when woken by a notification. Consumes the pending flag.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut pending = self.pending.lock();
        while !*pending {
            if self.signal.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *pending, false)
    }
}
