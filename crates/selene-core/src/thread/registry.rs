//! Interpreter-local "current thread" binding
//!
//! Each interpreter owned by a Thread carries a non-owning reference back to
//! it, seeded when the Thread is created. Lookups never consult any
//! process-wide state.

use super::handle::{Thread, WeakThread};
use super::state::ThreadId;
use crate::vm::Interpreter;

struct ThreadBinding {
    id: ThreadId,
    thread: WeakThread,
}

/// Bind `interp` to the Thread that owns it
pub(crate) fn bind(interp: &mut Interpreter, thread: &Thread) {
    interp.set_app_data(ThreadBinding {
        id: thread.id(),
        thread: thread.downgrade(),
    });
}

/// Non-owning handle to the Thread owning `interp`
pub fn current(interp: &Interpreter) -> Option<WeakThread> {
    interp.app_data::<ThreadBinding>().map(|b| b.thread.clone())
}

/// ID of the Thread owning `interp`
pub fn current_id(interp: &Interpreter) -> Option<ThreadId> {
    interp.app_data::<ThreadBinding>().map(|b| b.id)
}

/// Whether `interp` is owned by a Thread
pub fn is_bound(interp: &Interpreter) -> bool {
    interp.app_data::<ThreadBinding>().is_some()
}
