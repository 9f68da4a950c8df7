//! State shared between a thread's handles and its driver

use super::error::BootstrapError;
use super::state::{ExitStatus, LifecycleState, ThreadId};
use crate::sync::{InterruptHandle, Wakeup};
use crate::transfer::TransferPolicy;
use crate::vm::Interpreter;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};

/// One interpreter plus everything needed to share it safely
///
/// The interpreter is only touched with `interpreter` locked. Lifecycle and
/// exit status are atomics so they can be read without the lock.
pub(crate) struct ThreadCore {
    pub(crate) id: ThreadId,
    pub(crate) name: String,
    pub(crate) interpreter: Mutex<Interpreter>,
    /// Signalled when the thread leaves INIT
    pub(crate) bootstrapped: Condvar,
    pub(crate) wakeup: Wakeup,
    pub(crate) interrupt: InterruptHandle,
    pub(crate) policy: TransferPolicy,
    state: AtomicU8,
    exit: AtomicU8,
    bootstrap_error: Mutex<Option<BootstrapError>>,
}

impl ThreadCore {
    pub(crate) fn new(
        id: ThreadId,
        name: String,
        interpreter: Interpreter,
        policy: TransferPolicy,
        state: LifecycleState,
    ) -> Self {
        let interrupt = interpreter.interrupt_handle();
        Self {
            id,
            name,
            interpreter: Mutex::new(interpreter),
            bootstrapped: Condvar::new(),
            wakeup: Wakeup::new(),
            interrupt,
            policy,
            state: AtomicU8::new(state as u8),
            exit: AtomicU8::new(ExitStatus::Running as u8),
            bootstrap_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.state() == LifecycleState::Dead
    }

    pub(crate) fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_u8(self.exit.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`; fails if the state changed meanwhile
    ///
    /// DEAD is only entered through `finish` and never left.
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        if from == LifecycleState::Dead || to == LifecycleState::Dead {
            return false;
        }
        let changed = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            tracing::debug!(
                thread = %self.id,
                name = %self.name,
                from = %from,
                to = %to,
                "thread state changed"
            );
        }
        changed
    }

    /// Enter DEAD, recording `status` unless another exit got there first
    ///
    /// Wakes everything that might be waiting on the thread. Returns true if
    /// this call decided the exit status.
    pub(crate) fn finish(&self, status: ExitStatus) -> bool {
        let decided = self
            .exit
            .compare_exchange(
                ExitStatus::Running as u8,
                status as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        let previous =
            LifecycleState::from_u8(self.state.swap(LifecycleState::Dead as u8, Ordering::AcqRel));
        if previous != LifecycleState::Dead {
            tracing::debug!(
                thread = %self.id,
                name = %self.name,
                status = ?self.exit_status(),
                "thread is dead"
            );
        }
        self.wakeup.notify();
        self.bootstrapped.notify_all();
        decided
    }

    pub(crate) fn set_bootstrap_error(&self, error: BootstrapError) {
        tracing::warn!(thread = %self.id, name = %self.name, %error, "thread bootstrap failed");
        *self.bootstrap_error.lock() = Some(error);
    }

    pub(crate) fn bootstrap_error(&self) -> Option<BootstrapError> {
        self.bootstrap_error.lock().clone()
    }
}

impl std::fmt::Debug for ThreadCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("exit", &self.exit_status())
            .finish_non_exhaustive()
    }
}
