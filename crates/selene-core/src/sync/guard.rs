//! Locked access to a thread's interpreter
//!
//! A [`Session`] is what a thread's driver holds while it runs script code.
//! Before an event loop blocks it calls [`Session::suspend`]; the returned
//! [`SuspendGuard`] keeps the mutex released (state IDLE) until it is
//! dropped, so other threads can `call` in meanwhile.

use crate::thread::{LifecycleState, ThreadCore};
use crate::vm::Interpreter;
use parking_lot::MutexGuard;
use std::time::Instant;

/// A thread's interpreter, locked by its driver
pub struct Session<'a> {
    core: &'a ThreadCore,
    guard: Option<MutexGuard<'a, Interpreter>>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(core: &'a ThreadCore, guard: MutexGuard<'a, Interpreter>) -> Self {
        Self {
            core,
            guard: Some(guard),
        }
    }

    /// The locked interpreter
    pub fn interpreter(&mut self) -> &mut Interpreter {
        match self.guard.as_deref_mut() {
            Some(interp) => interp,
            // `suspend` borrows the session for as long as the lock is
            // released.
            None => unreachable!("session used while suspended"),
        }
    }

    /// Whether the owning thread was killed
    pub fn is_interrupted(&self) -> bool {
        self.core.interrupt.is_interrupted()
    }

    /// Lifecycle state of the owning thread
    pub fn state(&self) -> LifecycleState {
        self.core.state()
    }

    /// Release the interpreter and mark the thread IDLE
    pub fn suspend(&mut self) -> SuspendGuard<'_, 'a> {
        self.core.transition(LifecycleState::Active, LifecycleState::Idle);
        self.guard = None;
        SuspendGuard { session: self }
    }
}

/// Released interpreter lock; relocks on drop
pub struct SuspendGuard<'s, 'a> {
    session: &'s mut Session<'a>,
}

impl SuspendGuard<'_, '_> {
    /// Sleep until `deadline` or a wake-up, whichever comes first
    ///
    /// Returns true when woken early.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        self.session.core.wakeup.wait_until(deadline)
    }
}

impl Drop for SuspendGuard<'_, '_> {
    fn drop(&mut self) {
        let core = self.session.core;
        self.session.guard = Some(core.interpreter.lock());
        core.transition(LifecycleState::Idle, LifecycleState::Active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadId;
    use crate::transfer::TransferPolicy;
    use std::time::Duration;

    fn active_core() -> ThreadCore {
        ThreadCore::new(
            ThreadId::new(),
            "guard-test".to_string(),
            Interpreter::new(),
            TransferPolicy::default(),
            LifecycleState::Active,
        )
    }

    #[test]
    fn test_suspend_releases_lock() {
        let core = active_core();
        let mut session = Session::new(&core, core.interpreter.lock());
        session.interpreter().set_global("x", crate::value::Value::Number(1.0));
        assert!(core.interpreter.try_lock().is_none());
        {
            let _suspended = session.suspend();
            assert_eq!(core.state(), LifecycleState::Idle);
            let other = core.interpreter.try_lock();
            assert!(other.is_some());
        }
        assert_eq!(core.state(), LifecycleState::Active);
        assert!(core.interpreter.try_lock().is_none());
        assert_eq!(session.interpreter().get_global("x"), crate::value::Value::Number(1.0));
    }

    #[test]
    fn test_wait_until_wakes_on_notify() {
        let core = active_core();
        let mut session = Session::new(&core, core.interpreter.lock());
        core.wakeup.notify();
        let suspended = session.suspend();
        assert!(suspended.wait_until(Instant::now() + Duration::from_secs(5)));
        drop(suspended);
        assert!(!session.is_interrupted());
    }

    #[test]
    fn test_dead_thread_stays_dead_after_resume() {
        let core = active_core();
        let mut session = Session::new(&core, core.interpreter.lock());
        {
            let _suspended = session.suspend();
            core.finish(crate::thread::ExitStatus::Killed);
        }
        assert_eq!(session.state(), LifecycleState::Dead);
    }
}
