//! Default event loop

use super::{EventLoop, LoopOptions, LoopStatus};
use crate::sync::Session;
use crate::value::Value;
use crate::vm::{Interpreter, VmError};
use std::time::Instant;

/// Fires timers, dispatches queued events and idles in between
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    options: LoopOptions,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(options: LoopOptions) -> Self {
        Self { options }
    }

    /// Fire due timers and dispatch pending events without blocking
    ///
    /// Returns false if the interpreter was interrupted.
    pub fn dispatch(&self, interp: &mut Interpreter) -> bool {
        for callback in interp.events_mut().take_due(Instant::now()) {
            if !invoke(interp, "timer", callback, Vec::new()) {
                return false;
            }
        }

        for _ in 0..self.options.max_events_per_step {
            let Some(event) = interp.events_mut().pop_event() else {
                break;
            };
            for handler in interp.events().handlers_for(&event.name) {
                if !invoke(interp, &event.name, handler, event.args.clone()) {
                    return false;
                }
            }
        }

        interp.maybe_collect();
        true
    }
}

impl EventLoop for Dispatcher {
    fn step(&mut self, session: &mut Session<'_>) -> LoopStatus {
        if session.is_interrupted() {
            return LoopStatus::Quit;
        }
        let interp = session.interpreter();
        if !self.dispatch(interp) {
            return LoopStatus::Quit;
        }

        let events = interp.events();
        if events.quit_requested() || !events.has_work() {
            return LoopStatus::Quit;
        }
        if events.has_pending() {
            return LoopStatus::Continue;
        }
        let slice_end = Instant::now() + self.options.idle_slice();
        let deadline = events
            .next_deadline()
            .map_or(slice_end, |due| due.min(slice_end));

        let suspended = session.suspend();
        suspended.wait_until(deadline);
        LoopStatus::Continue
    }
}

/// Run one callback; script errors are logged and swallowed
fn invoke(interp: &mut Interpreter, event: &str, callback: Value, args: Vec<Value>) -> bool {
    match interp.call(callback, args) {
        Ok(_) => true,
        Err(VmError::Interrupted) => false,
        Err(error) => {
            tracing::warn!(
                interpreter = interp.id().as_u64(),
                event,
                error = %interp.describe_error(&error),
                "event handler failed"
            );
            true
        }
    }
}
