//! OS thread body of a spawned Thread

use super::error::BootstrapError;
use super::shared::ThreadCore;
use super::state::{ExitStatus, LifecycleState};
use crate::event::{EventLoop, LoopStatus};
use crate::sync::Session;
use crate::value::Value;
use crate::vm::VmError;
use std::sync::Arc;

/// Marks the Thread DEAD however the driver exits, unwinding included
struct MarkDeadOnExit<'a>(&'a ThreadCore);

impl Drop for MarkDeadOnExit<'_> {
    fn drop(&mut self) {
        if !self.0.is_dead() {
            let status = if std::thread::panicking() {
                tracing::warn!(thread = %self.0.id, "thread driver panicked");
                ExitStatus::Failed
            } else {
                ExitStatus::Completed
            };
            self.0.finish(status);
        }
    }
}

/// Run the entry function, then the event loop, then die
///
/// The interpreter stays locked except while the loop is suspended. The
/// entry's return values are left on the host stack for `wait`.
pub(crate) fn run(core: Arc<ThreadCore>, mut event_loop: Box<dyn EventLoop>) {
    let core: &ThreadCore = &core;
    let _exit = MarkDeadOnExit(core);
    let mut session = Session::new(core, core.interpreter.lock());

    let started = {
        let interp = session.interpreter();
        let mut values = interp.take_stack(0);
        if values.is_empty() {
            Err(VmError::Fault("no entry function".to_string()))
        } else {
            let entry = values.remove(0);
            interp.call(entry, values)
        }
    };

    match started {
        Ok(results) => {
            let skip_loop = results.first() == Some(&Value::Boolean(false));
            session.interpreter().extend_stack(results);
            core.transition(LifecycleState::Init, LifecycleState::Active);
            core.bootstrapped.notify_all();

            if !skip_loop {
                while !core.is_dead() {
                    if event_loop.step(&mut session) == LoopStatus::Quit {
                        break;
                    }
                }
            }
            let status = if core.interrupt.is_interrupted() {
                ExitStatus::Killed
            } else {
                ExitStatus::Completed
            };
            core.finish(status);
        }
        Err(VmError::Interrupted) => {
            core.finish(ExitStatus::Killed);
        }
        Err(error) => {
            let message = session.interpreter().describe_error(&error);
            core.set_bootstrap_error(BootstrapError::Entry(message));
            core.finish(ExitStatus::Failed);
        }
    }
}
