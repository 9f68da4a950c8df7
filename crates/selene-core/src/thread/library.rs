//! Script `thread` table
//!
//! Thread handles are userdata of type `thread` whose metatable indexes the
//! `thread` table, so `t:call(f)` and `thread.call(t, f)` are equivalent.
//! Handles made by `spawn` own their Thread; the one returned by `self` does
//! not, so a Thread never keeps itself alive.

use super::error::ThreadError;
use super::handle::{Thread, WeakThread};
use super::registry;
use crate::builtins::{arg, check_function, check_string};
use crate::value::Value;
use crate::vm::{Interpreter, VmError};

type NativeResult = Result<Vec<Value>, VmError>;

/// Registry key of the handle metatable
const HANDLE_METATABLE: &str = "selene.thread";

/// Userdata type name of thread handles
pub const HANDLE_TYPE: &str = "thread";

enum ThreadRef {
    Owned(Thread),
    Weak(WeakThread),
}

impl ThreadRef {
    fn get(&self) -> Option<Thread> {
        match self {
            ThreadRef::Owned(thread) => Some(thread.clone()),
            ThreadRef::Weak(weak) => weak.upgrade(),
        }
    }
}

/// Register the `thread` table and the handle metatable
pub fn open(interp: &mut Interpreter) {
    let library = interp.register_library(
        "thread",
        &[
            ("spawn", spawn),
            ("call", call),
            ("wait", wait),
            ("kill", kill),
            ("self", current),
            ("push", push),
            ("status", status),
            ("id", id),
            ("error", error),
        ],
    );
    let metatable = interp.new_table();
    let registry = interp.registry();
    // Fresh tables accept string keys.
    let _ = interp.set_field(metatable, "__index", library);
    let _ = interp.set_field(registry, HANDLE_METATABLE, metatable);
}

/// Wrap an owning handle as a script value
pub fn push_handle(interp: &mut Interpreter, thread: Thread) -> Value {
    new_handle(interp, ThreadRef::Owned(thread))
}

/// Thread behind a script handle
pub fn to_thread(interp: &Interpreter, value: Value) -> Option<Thread> {
    interp.userdata::<ThreadRef>(value)?.get()
}

fn new_handle(interp: &mut Interpreter, thread: ThreadRef) -> Value {
    let handle = interp.new_userdata(HANDLE_TYPE, thread);
    let metatable = interp.raw_get_str(interp.registry(), HANDLE_METATABLE).as_table();
    if metatable.is_some() {
        // Userdata always accepts a metatable.
        let _ = interp.set_metatable(handle, metatable);
    }
    handle
}

/// The Thread behind argument 1; `None` once its last owner is gone
fn check_thread(
    interp: &mut Interpreter,
    args: &[Value],
    function: &str,
) -> Result<Option<Thread>, VmError> {
    let value = arg(args, 1);
    if let Some(thread) = interp.userdata::<ThreadRef>(value).map(ThreadRef::get) {
        return Ok(thread);
    }
    let got = if value.is_nil() { "no value" } else { value.type_name() };
    Err(interp.arg_error(1, function, format!("thread expected, got {}", got)))
}

fn failure(interp: &mut Interpreter, message: &str) -> Vec<Value> {
    vec![Value::Boolean(false), interp.new_string(message)]
}

fn spawn(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let entry = check_function(interp, &args, 1, "spawn")?;
    let thread = Thread::spawn(interp, entry, &args[1..]);
    Ok(vec![push_handle(interp, thread)])
}

fn call(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let thread = check_thread(interp, &args, "call")?;
    let function = check_function(interp, &args, 2, "call")?;
    let Some(thread) = thread else {
        return Ok(failure(interp, &ThreadError::Dead.to_string()));
    };

    match thread.call(interp, function, &args[2..]) {
        Ok(mut results) => {
            results.insert(0, Value::Boolean(true));
            Ok(results)
        }
        Err(ThreadError::Call(error)) => Ok(vec![Value::Boolean(false), error.value]),
        Err(ThreadError::Transfer(error)) => {
            let error = error.offset(1);
            Err(interp.arg_error(error.position, "call", error.kind.to_string()))
        }
        Err(other) => Ok(failure(interp, &other.to_string())),
    }
}

fn wait(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let Some(thread) = check_thread(interp, &args, "wait")? else {
        return Ok(Vec::new());
    };
    match thread.wait(interp) {
        Ok(results) => Ok(results),
        Err(ThreadError::Bootstrap(_)) => Ok(Vec::new()),
        Err(other) => Err(interp.runtime_error(other.to_string())),
    }
}

fn kill(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    if let Some(thread) = check_thread(interp, &args, "kill")? {
        thread.kill();
    }
    Ok(Vec::new())
}

fn current(interp: &mut Interpreter, _: Vec<Value>) -> NativeResult {
    match registry::current(interp) {
        Some(weak) => Ok(vec![new_handle(interp, ThreadRef::Weak(weak))]),
        None => Ok(vec![Value::Nil]),
    }
}

fn push(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let thread = check_thread(interp, &args, "push")?;
    let name = check_string(interp, &args, 2, "push")?;
    let Some(thread) = thread else {
        return Ok(vec![Value::Boolean(false)]);
    };
    let payload = &args[2..];

    if registry::current_id(interp) == Some(thread.id()) {
        interp.events_mut().push(name, payload.to_vec());
        return Ok(vec![Value::Boolean(true)]);
    }
    match thread.push_event(interp, &name, payload) {
        Ok(()) => Ok(vec![Value::Boolean(true)]),
        Err(ThreadError::Transfer(error)) => {
            let error = error.offset(2);
            Err(interp.arg_error(error.position, "push", error.kind.to_string()))
        }
        Err(_) => Ok(vec![Value::Boolean(false)]),
    }
}

fn status(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let state = check_thread(interp, &args, "status")?.map_or("dead", |t| t.status().as_str());
    Ok(vec![interp.new_string(state)])
}

fn id(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let id = check_thread(interp, &args, "id")?
        .map_or(Value::Nil, |t| Value::Number(t.id().as_u64() as f64));
    Ok(vec![id])
}

fn error(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let message = check_thread(interp, &args, "error")?.and_then(|t| t.bootstrap_error());
    Ok(vec![match message {
        Some(error) => interp.new_string(&error.to_string()),
        None => Value::Nil,
    }])
}
