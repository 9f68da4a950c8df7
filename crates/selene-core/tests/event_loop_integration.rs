//! Event queues and loops driving thread interpreters

mod common;

use common::*;
use selene_bytecode::{Opcode, Proto, ProtoBuilder};
use selene_core::{
    Dispatcher, EventLoop, Interpreter, LoopStatus, RuntimeConfig, Session, Thread, ThreadBuilder,
    Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `function() n = (n or 0) + 1 end`
fn counts(name: &str) -> Proto {
    let mut b = ProtoBuilder::new("count");
    let set = b.label();
    b.get_global(name).dup().jump_if_true(set);
    b.pop().number(0.0);
    b.place(set);
    b.number(1.0).emit(Opcode::Add).set_global(name);
    b.build().unwrap()
}

/// `function(v) <name> = v; event.quit() end`
fn stores_and_quits(name: &str) -> Proto {
    let mut b = ProtoBuilder::with_params("store_quit", 1);
    b.get_local(0).set_global(name);
    b.get_global("event").get_field("quit").call(0, 0);
    b.build().unwrap()
}

/// `function() event.after(<delay>, function() fired = true; event.quit() end) return true end`
fn schedules_quit(delay: f64) -> Proto {
    let mut callback = ProtoBuilder::new("on_timer");
    callback.boolean(true).set_global("fired");
    callback.get_global("event").get_field("quit").call(0, 0);

    let mut b = ProtoBuilder::new("schedule");
    b.get_global("event").get_field("after").number(delay);
    b.closure(callback.build().unwrap()).call(2, 0);
    b.boolean(true).ret(1);
    b.build().unwrap()
}

/// Call `read` in `thread` until its first result passes `check`
fn eventually(
    thread: &Thread,
    main: &mut Interpreter,
    read: Value,
    check: impl Fn(Value) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        let results = thread.call(main, read, &[]).unwrap();
        if check(results.first().copied().unwrap_or(Value::Nil)) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_pushed_event_reaches_handler() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    thread.push_event(&main, "ping", &[Value::Number(7.0)]).unwrap();

    let read = main.load(reads_global("last"));
    assert!(eventually(&thread, &mut main, read, |v| v == Value::Number(7.0)));
    thread.kill();
}

#[test]
fn test_events_for_other_names_are_ignored() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    thread.push_event(&main, "pong", &[Value::Number(1.0)]).unwrap();
    thread.push_event(&main, "ping", &[Value::Number(2.0)]).unwrap();

    let read = main.load(reads_global("last"));
    assert!(eventually(&thread, &mut main, read, |v| v == Value::Number(2.0)));
    thread.kill();
}

#[test]
fn test_timer_quits_loop() {
    let mut main = Interpreter::new();
    let entry = main.load(schedules_quit(0.01));
    let thread = Thread::spawn(&main, entry, &[]);

    assert_eq!(thread.wait(&mut main).unwrap(), vec![Value::Boolean(true)]);
    assert_eq!(thread.lock().get_global("fired"), Value::Boolean(true));
}

#[test]
fn test_repeating_timer_added_by_host() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    let timer = {
        let mut target = thread.lock();
        let callback = target.load(counts("ticks"));
        target.events_mut().add_timer(Duration::from_millis(5), true, callback)
    };

    let read = main.load(reads_global("ticks"));
    assert!(eventually(&thread, &mut main, read, |v| matches!(v, Value::Number(n) if n >= 3.0)));
    assert!(thread.lock().events_mut().cancel_timer(timer));
    thread.kill();
}

#[test]
fn test_failing_handler_does_not_stop_loop() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    {
        let mut target = thread.lock();
        let handler = target.load(raises("handler failed"));
        target.events_mut().on("bad", handler);
    }
    thread.push_event(&main, "bad", &[]).unwrap();
    thread.push_event(&main, "ping", &[Value::Number(5.0)]).unwrap();

    let read = main.load(reads_global("last"));
    assert!(eventually(&thread, &mut main, read, |v| v == Value::Number(5.0)));
    assert!(!thread.is_dead());
    thread.kill();
}

#[test]
fn test_adopted_interpreter_runs_event_loop() {
    let main = Thread::adopt(Interpreter::new(), Arc::new(RuntimeConfig::default()));
    {
        let mut interp = main.lock();
        let handler = interp.load(stores_and_quits("seen"));
        interp.events_mut().on("tick", handler);
        interp.events_mut().push("tick", vec![Value::Number(3.0)]);
    }

    main.run_event_loop(&mut Dispatcher::default()).unwrap();
    assert_eq!(main.lock().get_global("seen"), Value::Number(3.0));
}

#[test]
fn test_event_loop_without_work_returns() {
    let main = Thread::adopt(Interpreter::new(), Arc::new(RuntimeConfig::default()));
    main.run_event_loop(&mut Dispatcher::default()).unwrap();
    assert!(!main.is_dead());
}

struct CountingLoop {
    steps: Arc<AtomicUsize>,
}

impl EventLoop for CountingLoop {
    fn step(&mut self, session: &mut Session<'_>) -> LoopStatus {
        let step = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        session.interpreter().set_global("steps", Value::Number(step as f64));
        drop(session.suspend());
        if step >= 3 {
            LoopStatus::Quit
        } else {
            LoopStatus::Continue
        }
    }
}

#[test]
fn test_custom_event_loop() {
    let mut main = Interpreter::new();
    let entry = main.load(add_one());
    let steps = Arc::new(AtomicUsize::new(0));
    let thread = ThreadBuilder::new()
        .event_loop(Box::new(CountingLoop {
            steps: Arc::clone(&steps),
        }))
        .spawn(&main, entry, &[Value::Number(1.0)]);

    assert_eq!(thread.wait(&mut main).unwrap(), vec![Value::Number(2.0)]);
    assert_eq!(steps.load(Ordering::SeqCst), 3);
    assert_eq!(thread.lock().get_global("steps"), Value::Number(3.0));
}
