//! Thread construction

use super::driver;
use super::error::BootstrapError;
use super::handle::Thread;
use super::registry;
use super::shared::ThreadCore;
use super::state::{ExitStatus, LifecycleState, ThreadId};
use crate::config::{self, RuntimeConfig};
use crate::event::{Dispatcher, EventLoop};
use crate::transfer::copy_slice;
use crate::value::Value;
use crate::vm::Interpreter;
use std::sync::Arc;

/// Thread factory, which can be used in order to configure the properties of
/// a new Thread
///
/// # Examples
///
/// ```no_run
/// use selene_core::{Interpreter, ThreadBuilder, Value};
///
/// let caller = Interpreter::new();
/// let print = caller.get_global("print");
/// let thread = ThreadBuilder::new().name("worker").spawn(&caller, print, &[Value::Number(1.0)]);
/// assert_eq!(thread.name(), "worker");
/// ```
#[derive(Default)]
pub struct ThreadBuilder {
    name: Option<String>,
    config: Option<Arc<RuntimeConfig>>,
    event_loop: Option<Box<dyn EventLoop>>,
}

impl ThreadBuilder {
    /// Generates the base configuration for spawning a Thread
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the Thread and its OS thread
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Runtime configuration for the new interpreter
    ///
    /// Defaults to the caller's configuration.
    pub fn config(mut self, config: Arc<RuntimeConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Event loop the Thread runs after its entry returns
    ///
    /// Defaults to a [`Dispatcher`].
    pub fn event_loop(mut self, event_loop: Box<dyn EventLoop>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    /// Spawn a Thread running `entry(args...)` in a fresh interpreter
    ///
    /// `entry` and `args` are copied out of `caller` before the OS thread
    /// starts. If that copy fails no OS thread is started and the Thread is
    /// returned already DEAD, with the cause in
    /// [`Thread::bootstrap_error`].
    pub fn spawn(self, caller: &Interpreter, entry: Value, args: &[Value]) -> Thread {
        let config = self.config.unwrap_or_else(|| config::current(caller));
        let id = ThreadId::new();
        let name = self
            .name
            .unwrap_or_else(|| format!("{}-{}", config.threads.name_prefix, id));

        let mut interp = Interpreter::configured(Arc::clone(&config));
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(entry);
        values.extend_from_slice(args);
        let seeded = copy_slice(caller, &mut interp, &values, config.transfer)
            .map(|copies| interp.extend_stack(copies));

        let core = Arc::new(ThreadCore::new(
            id,
            name.clone(),
            interp,
            config.transfer,
            LifecycleState::Init,
        ));
        let thread = Thread::from_core(Arc::clone(&core));
        registry::bind(&mut core.interpreter.lock(), &thread);

        if let Err(error) = seeded {
            core.set_bootstrap_error(BootstrapError::Transfer(error));
            core.finish(ExitStatus::Failed);
            return thread;
        }

        let event_loop = self
            .event_loop
            .unwrap_or_else(|| Box::new(Dispatcher::new(config.event_loop.clone())));
        let mut builder = std::thread::Builder::new().name(name);
        if let Some(size) = config.threads.stack_size {
            builder = builder.stack_size(size);
        }
        let driver_core = Arc::clone(&core);
        match builder.spawn(move || driver::run(driver_core, event_loop)) {
            Ok(join) => {
                thread.set_join(join);
                tracing::debug!(thread = %id, "thread spawned");
            }
            Err(error) => {
                core.set_bootstrap_error(BootstrapError::Spawn(error.to_string()));
                core.finish(ExitStatus::Failed);
            }
        }
        thread
    }
}

impl std::fmt::Debug for ThreadBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadBuilder")
            .field("name", &self.name)
            .field("custom_loop", &self.event_loop.is_some())
            .finish_non_exhaustive()
    }
}
