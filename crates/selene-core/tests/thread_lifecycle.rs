//! Thread spawn, call, wait and kill across interpreters

mod common;

use common::*;
use selene_core::{
    BootstrapError, ExitStatus, Interpreter, LifecycleState, RuntimeConfig, Thread, ThreadBuilder,
    ThreadError, TransferErrorKind, Value,
};
use std::sync::Arc;

#[test]
fn test_wait_returns_entry_results() {
    let mut main = Interpreter::new();
    let entry = main.load(add_one());
    let thread = Thread::spawn(&main, entry, &[Value::Number(41.0)]);

    assert_eq!(thread.wait(&mut main).unwrap(), vec![Value::Number(42.0)]);
    assert!(thread.is_dead());
    assert_eq!(thread.exit_status(), ExitStatus::Completed);

    // Results are handed out once.
    assert!(thread.wait(&mut main).unwrap().is_empty());
}

#[test]
fn test_idle_thread_serves_calls() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);
    assert!(wait_for_state(&thread, LifecycleState::Idle));

    let pong = main.load(returns_string("pong"));
    let results = thread.call(&mut main, pong, &[]).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(main.to_str(results[0]), Some("pong"));
    assert!(!thread.is_dead());

    let add = main.load(add_one());
    let results = thread.call(&mut main, add, &[Value::Number(1.0)]).unwrap();
    assert_eq!(results, vec![Value::Number(2.0)]);

    thread.kill();
}

#[test]
fn test_killed_thread_rejects_calls() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);
    assert!(wait_for_state(&thread, LifecycleState::Idle));

    thread.kill();
    assert!(thread.is_dead());
    assert_eq!(thread.status(), LifecycleState::Dead);
    assert_eq!(thread.exit_status(), ExitStatus::Killed);

    let add = main.load(add_one());
    let err = thread.call(&mut main, add, &[Value::Number(1.0)]).unwrap_err();
    assert!(matches!(err, ThreadError::Dead));
    assert_eq!(err.to_string(), "thread has stopped");

    // Killing twice is harmless.
    thread.kill();
    assert_eq!(thread.exit_status(), ExitStatus::Killed);
}

#[test]
fn test_untransferable_entry_argument_fails_bootstrap() {
    let mut main = Interpreter::new();
    let entry = main.load(add_one());
    let blob = main.new_userdata("blob", 7u32);
    let thread = Thread::spawn(&main, entry, &[blob]);

    assert!(thread.is_dead());
    assert_eq!(thread.exit_status(), ExitStatus::Failed);
    match thread.bootstrap_error() {
        Some(BootstrapError::Transfer(error)) => {
            assert_eq!(error.position, 2);
            assert_eq!(error.kind, TransferErrorKind::Unsupported { type_name: "blob" });
        }
        other => panic!("unexpected bootstrap error: {:?}", other),
    }
    assert!(thread.wait(&mut main).unwrap().is_empty());
}

#[test]
fn test_failing_entry_reports_bootstrap_error() {
    let mut main = Interpreter::new();
    let entry = main.load(raises("no config"));
    let thread = Thread::spawn(&main, entry, &[]);

    match thread.wait(&mut main) {
        Err(ThreadError::Bootstrap(BootstrapError::Entry(message))) => {
            assert!(message.contains("no config"))
        }
        other => panic!("unexpected wait result: {:?}", other),
    }
    assert_eq!(thread.exit_status(), ExitStatus::Failed);

    let add = main.load(add_one());
    assert!(matches!(thread.call(&mut main, add, &[]), Err(ThreadError::Dead)));
}

#[test]
fn test_call_error_leaves_thread_usable() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    let boom = main.load(raises("boom"));
    match thread.call(&mut main, boom, &[]) {
        Err(ThreadError::Call(error)) => {
            assert_eq!(main.to_str(error.value), Some("boom"));
            assert!(error.message.contains("boom"));
        }
        other => panic!("unexpected call result: {:?}", other),
    }
    assert!(!thread.is_dead());

    let add = main.load(add_one());
    assert_eq!(
        thread.call(&mut main, add, &[Value::Number(41.0)]).unwrap(),
        vec![Value::Number(42.0)]
    );
    thread.kill();
}

#[test]
fn test_false_entry_result_skips_event_loop() {
    let mut main = Interpreter::new();
    let entry = main.load(listens_then_refuses("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    assert_eq!(thread.wait(&mut main).unwrap(), vec![Value::Boolean(false)]);
    assert_eq!(thread.exit_status(), ExitStatus::Completed);
}

#[test]
fn test_untransferable_call_argument_is_reported() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);

    let add = main.load(add_one());
    let blob = main.new_userdata("blob", ());
    match thread.call(&mut main, add, &[blob]) {
        Err(ThreadError::Transfer(error)) => assert_eq!(error.position, 2),
        other => panic!("unexpected call result: {:?}", other),
    }
    assert!(!thread.is_dead());
    thread.kill();
}

#[test]
fn test_builder_names_threads() {
    let main = Interpreter::new();
    let entry = main.get_global("print");

    let named = ThreadBuilder::new().name("worker-a").spawn(&main, entry, &[]);
    assert_eq!(named.name(), "worker-a");

    let unnamed = Thread::spawn(&main, entry, &[]);
    assert_eq!(unnamed.name(), format!("selene-thread-{}", unnamed.id()));
    assert_ne!(named.id(), unnamed.id());

    let mut config = RuntimeConfig::default();
    config.threads.name_prefix = "pool".to_string();
    let configured = Interpreter::configured(Arc::new(config));
    let pooled = Thread::spawn(&configured, entry, &[]);
    assert!(pooled.name().starts_with("pool-"));
}

#[test]
fn test_adopted_interpreter_knows_itself() {
    let main = Thread::adopt(Interpreter::new(), Arc::new(RuntimeConfig::default()));
    assert_eq!(main.status(), LifecycleState::Active);
    assert_eq!(main.name(), "main");

    let mut guard = main.lock();
    let current = Thread::current(&guard).unwrap();
    assert!(current.ptr_eq(&main));

    let add = guard.load(add_one());
    assert!(matches!(main.call(&mut guard, add, &[]), Err(ThreadError::SelfCall)));
    assert!(matches!(main.wait(&mut guard), Err(ThreadError::SelfCall)));
}

#[test]
fn test_threads_call_each_other_through_handles() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let first = Thread::spawn(&main, entry, &[]);
    let second = Thread::spawn(&main, entry, &[]);

    let store = main.load(stores_global("shared"));
    let text = main.new_string("from main");
    first.call(&mut main, store, &[text]).unwrap();

    let read = main.load(reads_global("shared"));
    let results = first.call(&mut main, read, &[]).unwrap();
    assert_eq!(main.to_str(results[0]), Some("from main"));

    // Globals are per interpreter.
    let results = second.call(&mut main, read, &[]).unwrap();
    assert_eq!(results, vec![Value::Nil]);

    first.kill();
    second.kill();
}

#[test]
fn test_dropping_last_handle_kills_thread() {
    let mut main = Interpreter::new();
    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);
    let weak = thread.downgrade();
    assert!(weak.upgrade().is_some());

    drop(thread);
    assert!(weak.upgrade().is_none());
}
