//! Loading runtime configuration from disk

mod common;

use common::*;
use selene_core::config;
use selene_core::{
    BootstrapError, ConfigError, Interpreter, RuntimeConfig, Thread, TransferErrorKind, Value,
};
use std::io::Write;
use std::sync::Arc;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
        [interpreter]
        max_call_depth = 64

        [threads]
        name_prefix = "io"

        [event_loop]
        idle_slice_ms = 10
        "#,
    );
    let config = RuntimeConfig::load(file.path()).unwrap();
    assert_eq!(config.interpreter.max_call_depth, 64);
    assert_eq!(config.threads.name_prefix, "io");
    assert_eq!(config.event_loop.idle_slice_ms, 10);
    assert_eq!(config.event_loop.max_events_per_step, 64);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = RuntimeConfig::load(dir.path().join("selene.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_file() {
    let file = write_config("[threads\nname_prefix = 1");
    let err = RuntimeConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_spawned_threads_inherit_configuration() {
    let file =
        write_config("[interpreter]\nmax_call_depth = 64\n\n[threads]\nname_prefix = \"io\"\n");
    let config = Arc::new(RuntimeConfig::load(file.path()).unwrap());
    let mut main = Interpreter::configured(Arc::clone(&config));
    assert_eq!(main.options().max_call_depth, 64);

    let entry = main.load(listens("ping", "last"));
    let thread = Thread::spawn(&main, entry, &[]);
    assert!(thread.name().starts_with("io-"));

    let inherited = {
        let target = thread.lock();
        (config::current(&target), target.options().max_call_depth)
    };
    assert!(Arc::ptr_eq(&inherited.0, &config));
    assert_eq!(inherited.1, 64);

    let add = main.load(add_one());
    assert_eq!(
        thread.call(&mut main, add, &[Value::Number(1.0)]).unwrap(),
        vec![Value::Number(2.0)]
    );
    thread.kill();
}

#[test]
fn test_configured_policy_applies_to_spawn() {
    let config = RuntimeConfig::from_toml_str("[transfer]\nrelocate_closures = false").unwrap();
    let mut main = Interpreter::configured(Arc::new(config));
    let entry = main.load(add_one());

    let thread = Thread::spawn(&main, entry, &[Value::Number(1.0)]);
    assert!(thread.is_dead());
    match thread.bootstrap_error() {
        Some(BootstrapError::Transfer(error)) => {
            assert_eq!(error.position, 1);
            assert_eq!(error.kind, TransferErrorKind::ClosuresDisabled);
        }
        other => panic!("unexpected bootstrap error: {:?}", other),
    }
}
