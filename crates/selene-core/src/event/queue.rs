//! Per-interpreter event queue

use crate::value::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Identifier of a registered handler or timer
pub type SubscriptionId = u64;

/// A named event waiting to be dispatched
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name
    pub name: String,
    /// Arguments passed to every handler
    pub args: Vec<Value>,
}

#[derive(Debug)]
struct Handler {
    id: SubscriptionId,
    name: String,
    callback: Value,
}

#[derive(Debug)]
struct Timer {
    id: SubscriptionId,
    due: Instant,
    interval: Option<Duration>,
    callback: Value,
}

/// Handlers, timers and pending events of one interpreter
#[derive(Debug, Default)]
pub struct EventQueue {
    handlers: Vec<Handler>,
    timers: Vec<Timer>,
    pending: VecDeque<Event>,
    next_id: SubscriptionId,
    quit: bool,
}

impl EventQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        self.next_id
    }

    /// Register `callback` for events called `name`
    pub fn on(&mut self, name: impl Into<String>, callback: Value) -> SubscriptionId {
        let id = self.allocate_id();
        self.handlers.push(Handler {
            id,
            name: name.into(),
            callback,
        });
        id
    }

    /// Remove a handler
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.id != id);
        self.handlers.len() != before
    }

    /// Schedule `callback` after `delay`, repeating every `delay` if asked
    pub fn add_timer(&mut self, delay: Duration, repeat: bool, callback: Value) -> SubscriptionId {
        let id = self.allocate_id();
        self.timers.push(Timer {
            id,
            due: Instant::now() + delay,
            interval: repeat.then_some(delay),
            callback,
        });
        id
    }

    /// Cancel a timer
    pub fn cancel_timer(&mut self, id: SubscriptionId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Queue an event
    pub fn push(&mut self, name: impl Into<String>, args: Vec<Value>) {
        self.pending.push_back(Event {
            name: name.into(),
            args,
        });
    }

    /// Ask the loop to stop after the current step
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Whether quit was requested
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Whether anything could still produce work
    pub fn has_work(&self) -> bool {
        !self.handlers.is_empty() || !self.timers.is_empty() || !self.pending.is_empty()
    }

    /// Whether events are waiting for dispatch
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Earliest timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Take the callbacks of every timer due at `now`, in deadline order
    ///
    /// Repeating timers are re-armed, one-shot timers removed.
    pub fn take_due(&mut self, now: Instant) -> Vec<Value> {
        let mut due: Vec<(Instant, SubscriptionId, Value)> = Vec::new();
        self.timers.retain_mut(|timer| {
            if timer.due > now {
                return true;
            }
            due.push((timer.due, timer.id, timer.callback));
            match timer.interval {
                Some(interval) => {
                    timer.due = now + interval;
                    true
                }
                None => false,
            }
        });
        due.sort_by_key(|&(at, id, _)| (at, id));
        due.into_iter().map(|(_, _, callback)| callback).collect()
    }

    /// Next pending event
    pub fn pop_event(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    /// Callbacks registered for `name`, in registration order
    pub fn handlers_for(&self, name: &str) -> Vec<Value> {
        self.handlers
            .iter()
            .filter(|h| h.name == name)
            .map(|h| h.callback)
            .collect()
    }

    /// Values the queue keeps alive
    pub(crate) fn roots(&self) -> impl Iterator<Item = Value> + '_ {
        self.handlers
            .iter()
            .map(|h| h.callback)
            .chain(self.timers.iter().map(|t| t.callback))
            .chain(self.pending.iter().flat_map(|e| e.args.iter().copied()))
    }
}
