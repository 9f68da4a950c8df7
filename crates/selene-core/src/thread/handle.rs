//! Thread handles

use super::error::{BootstrapError, CallError, ThreadError};
use super::registry;
use super::shared::ThreadCore;
use super::state::{ExitStatus, LifecycleState, ThreadId};
use crate::config::RuntimeConfig;
use crate::event::{EventLoop, LoopStatus};
use crate::sync::Session;
use crate::transfer::copy_slice;
use crate::value::Value;
use crate::vm::{Interpreter, VmError};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long a caller blocked on bootstrap sleeps before re-checking state
const BOOTSTRAP_RECHECK: Duration = Duration::from_millis(50);

pub(crate) struct Handle {
    pub(crate) core: Arc<ThreadCore>,
    pub(crate) join: Mutex<Option<JoinHandle<()>>>,
}

impl Handle {
    fn kill(&self) {
        self.core.interrupt.interrupt();
        if self.core.finish(ExitStatus::Killed) {
            tracing::debug!(thread = %self.core.id, name = %self.core.name, "thread killed");
        }
        // Detach; the driver unwinds at its next interrupt check.
        drop(self.join.lock().take());
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.core.is_dead() {
            self.kill();
        }
    }
}

/// Owning handle to a Thread
///
/// Clones share one Thread. When the last owning handle is dropped the
/// Thread is killed unless it is already DEAD.
#[derive(Clone)]
pub struct Thread {
    inner: Arc<Handle>,
}

/// Non-owning handle to a Thread
#[derive(Clone, Default)]
pub struct WeakThread {
    inner: Weak<Handle>,
}

impl WeakThread {
    /// Owning handle, if any owner is left
    pub fn upgrade(&self) -> Option<Thread> {
        self.inner.upgrade().map(|inner| Thread { inner })
    }
}

impl std::fmt::Debug for WeakThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(thread) => f.debug_tuple("WeakThread").field(&thread.id()).finish(),
            None => f.write_str("WeakThread(<gone>)"),
        }
    }
}

impl Thread {
    pub(crate) fn from_core(core: Arc<ThreadCore>) -> Self {
        Self {
            inner: Arc::new(Handle {
                core,
                join: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn core(&self) -> &Arc<ThreadCore> {
        &self.inner.core
    }

    pub(crate) fn set_join(&self, join: JoinHandle<()>) {
        *self.inner.join.lock() = Some(join);
    }

    /// Spawn a Thread running `entry(args...)` with default settings
    ///
    /// See [`super::ThreadBuilder::spawn`].
    pub fn spawn(caller: &Interpreter, entry: Value, args: &[Value]) -> Thread {
        super::ThreadBuilder::new().spawn(caller, entry, args)
    }

    /// Wrap the process's initial interpreter in an ACTIVE Thread
    ///
    /// The Thread has no OS thread of its own; drive it with
    /// [`Thread::lock`] and [`Thread::run_event_loop`].
    pub fn adopt(mut interpreter: Interpreter, config: Arc<RuntimeConfig>) -> Thread {
        let policy = config.transfer;
        interpreter.set_app_data(config);
        let core = Arc::new(ThreadCore::new(
            ThreadId::new(),
            "main".to_string(),
            interpreter,
            policy,
            LifecycleState::Active,
        ));
        let thread = Thread::from_core(core);
        registry::bind(&mut thread.core().interpreter.lock(), &thread);
        tracing::debug!(thread = %thread.id(), "interpreter adopted");
        thread
    }

    /// The Thread owning `interp`
    pub fn current(interp: &Interpreter) -> Option<Thread> {
        registry::current(interp)?.upgrade()
    }

    /// Thread ID
    pub fn id(&self) -> ThreadId {
        self.inner.core.id
    }

    /// OS thread name
    pub fn name(&self) -> &str {
        &self.inner.core.name
    }

    /// Lifecycle state
    pub fn status(&self) -> LifecycleState {
        self.inner.core.state()
    }

    /// How the Thread died, or `Running`
    pub fn exit_status(&self) -> ExitStatus {
        self.inner.core.exit_status()
    }

    /// Whether the Thread is DEAD
    pub fn is_dead(&self) -> bool {
        self.inner.core.is_dead()
    }

    /// Why the Thread never became callable
    pub fn bootstrap_error(&self) -> Option<BootstrapError> {
        self.inner.core.bootstrap_error()
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakThread {
        WeakThread {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same Thread
    pub fn ptr_eq(&self, other: &Thread) -> bool {
        Arc::ptr_eq(&self.inner.core, &other.inner.core)
    }

    fn is_owner_of(&self, interp: &Interpreter) -> bool {
        registry::current_id(interp) == Some(self.id())
    }

    /// Call `function(args...)` inside this Thread and copy the results back
    ///
    /// Blocks until the Thread finished bootstrapping and its interpreter is
    /// free. Script errors raised by the call come back as
    /// [`ThreadError::Call`] and leave the Thread usable.
    pub fn call(
        &self,
        caller: &mut Interpreter,
        function: Value,
        args: &[Value],
    ) -> Result<Vec<Value>, ThreadError> {
        let core = &self.inner.core;
        if core.is_dead() {
            return Err(ThreadError::Dead);
        }
        if self.is_owner_of(caller) {
            return Err(ThreadError::SelfCall);
        }

        let mut target = core.interpreter.lock();
        while core.state() == LifecycleState::Init {
            core.bootstrapped.wait_for(&mut target, BOOTSTRAP_RECHECK);
        }
        if core.is_dead() {
            return Err(ThreadError::Dead);
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(function);
        values.extend_from_slice(args);
        let mut values =
            copy_slice(caller, &mut target, &values, core.policy).map_err(ThreadError::Transfer)?;
        let function = values.remove(0);

        let outcome = target.call(function, values);
        let result = match outcome {
            Ok(results) => {
                copy_slice(&target, caller, &results, core.policy)
                    .map_err(ThreadError::ResultTransfer)
            }
            Err(VmError::Interrupted) => Err(ThreadError::Dead),
            Err(error) => {
                let message = target.describe_error(&error);
                let raised = match error {
                    VmError::Raised(value) => value,
                    _ => target.new_string(&message),
                };
                let value = match copy_slice(&target, caller, &[raised], core.policy) {
                    Ok(copied) => copied.into_iter().next().unwrap_or(Value::Nil),
                    Err(_) => caller.new_string(&message),
                };
                Err(ThreadError::Call(CallError { value, message }))
            }
        };
        drop(target);
        // Let an idle loop notice handlers, timers or quit requests the call
        // may have left behind.
        core.wakeup.notify();
        result
    }

    /// Join the Thread and copy its final return values into `caller`
    ///
    /// Only the first `wait` after a normal completion yields values; waiting
    /// on a killed or already waited Thread returns nothing.
    pub fn wait(&self, caller: &mut Interpreter) -> Result<Vec<Value>, ThreadError> {
        if self.is_owner_of(caller) {
            return Err(ThreadError::SelfCall);
        }
        let join = self.inner.join.lock().take();
        let Some(join) = join else {
            return Ok(Vec::new());
        };
        if join.join().is_err() {
            tracing::warn!(thread = %self.id(), "thread driver panicked");
        }

        let core = &self.inner.core;
        match core.exit_status() {
            ExitStatus::Completed => {
                let mut target = core.interpreter.lock();
                let results = target.take_stack(0);
                copy_slice(&target, caller, &results, core.policy)
                    .map_err(ThreadError::ResultTransfer)
            }
            _ => match core.bootstrap_error() {
                Some(error) => Err(ThreadError::Bootstrap(error)),
                None => Ok(Vec::new()),
            },
        }
    }

    /// Interrupt the Thread and mark it DEAD immediately
    ///
    /// Script code still running notices at its next call or backward jump
    /// and is never resumed. Partially updated state inside the Thread is
    /// abandoned.
    pub fn kill(&self) {
        self.inner.kill();
    }

    /// Queue event `name` with `args` on this Thread and wake its loop
    pub fn push_event(
        &self,
        caller: &Interpreter,
        name: &str,
        args: &[Value],
    ) -> Result<(), ThreadError> {
        let core = &self.inner.core;
        if core.is_dead() {
            return Err(ThreadError::Dead);
        }
        if self.is_owner_of(caller) {
            return Err(ThreadError::SelfCall);
        }
        {
            let mut target = core.interpreter.lock();
            if core.is_dead() {
                return Err(ThreadError::Dead);
            }
            let args =
                copy_slice(caller, &mut target, args, core.policy).map_err(ThreadError::Transfer)?;
            target.events_mut().push(name, args);
        }
        core.wakeup.notify();
        Ok(())
    }

    /// Lock the Thread's interpreter
    ///
    /// Blocks while the Thread runs script code. Meant for adopted Threads
    /// and for inspection; a DEAD Thread's interpreter must not run script
    /// code again.
    pub fn lock(&self) -> MutexGuard<'_, Interpreter> {
        self.inner.core.interpreter.lock()
    }

    /// Drive `event_loop` on this Thread's interpreter until it quits
    pub fn run_event_loop(&self, event_loop: &mut dyn EventLoop) -> Result<(), ThreadError> {
        let core = &self.inner.core;
        if core.is_dead() {
            return Err(ThreadError::Dead);
        }
        let mut session = Session::new(core, core.interpreter.lock());
        while !core.is_dead() {
            if event_loop.step(&mut session) == LoopStatus::Quit {
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}
