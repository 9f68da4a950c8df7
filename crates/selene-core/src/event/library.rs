//! Script `event` table

use crate::builtins::{check_function, check_number, check_string};
use crate::value::Value;
use crate::vm::{Interpreter, VmError};
use std::time::Duration;

type NativeResult = Result<Vec<Value>, VmError>;

/// Register the `event` table
pub fn open(interp: &mut Interpreter) {
    interp.register_library(
        "event",
        &[
            ("on", on),
            ("off", off),
            ("push", push),
            ("after", after),
            ("every", every),
            ("cancel", cancel),
            ("quit", quit),
        ],
    );
}

fn check_id(interp: &mut Interpreter, args: &[Value], function: &str) -> Result<u64, VmError> {
    let id = check_number(interp, args, 1, function)?;
    Ok(if id >= 0.0 { id as u64 } else { 0 })
}

fn check_delay(
    interp: &mut Interpreter,
    args: &[Value],
    function: &str,
) -> Result<Duration, VmError> {
    let seconds = check_number(interp, args, 1, function)?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(interp.arg_error(1, function, "non-negative delay expected"));
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn on(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let name = check_string(interp, &args, 1, "on")?;
    let handler = check_function(interp, &args, 2, "on")?;
    let id = interp.events_mut().on(name, handler);
    Ok(vec![Value::Number(id as f64)])
}

fn off(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let id = check_id(interp, &args, "off")?;
    Ok(vec![Value::Boolean(interp.events_mut().off(id))])
}

fn push(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let name = check_string(interp, &args, 1, "push")?;
    let payload = args.get(1..).unwrap_or_default().to_vec();
    interp.events_mut().push(name, payload);
    Ok(Vec::new())
}

fn schedule(
    interp: &mut Interpreter,
    args: &[Value],
    function: &str,
    repeat: bool,
) -> NativeResult {
    let delay = check_delay(interp, args, function)?;
    let callback = check_function(interp, args, 2, function)?;
    if repeat && delay.is_zero() {
        return Err(interp.arg_error(1, function, "positive interval expected"));
    }
    let id = interp.events_mut().add_timer(delay, repeat, callback);
    Ok(vec![Value::Number(id as f64)])
}

fn after(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    schedule(interp, &args, "after", false)
}

fn every(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    schedule(interp, &args, "every", true)
}

fn cancel(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let id = check_id(interp, &args, "cancel")?;
    Ok(vec![Value::Boolean(interp.events_mut().cancel_timer(id))])
}

fn quit(interp: &mut Interpreter, _: Vec<Value>) -> NativeResult {
    interp.events_mut().request_quit();
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::InterpreterOptions;

    fn interp() -> Interpreter {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        crate::builtins::open(&mut interp);
        open(&mut interp);
        interp
    }

    fn call_event(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> NativeResult {
        let library = interp.get_global("event");
        let function = interp.raw_get_str(library, name);
        interp.call(function, args)
    }

    #[test]
    fn test_on_and_off() {
        let mut interp = interp();
        let name = interp.new_string("tick");
        let handler = interp.get_global("print");
        let id = call_event(&mut interp, "on", vec![name, handler]).unwrap()[0];
        assert_eq!(interp.events().handlers_for("tick"), vec![handler]);

        assert_eq!(call_event(&mut interp, "off", vec![id]).unwrap(), vec![Value::Boolean(true)]);
        assert_eq!(call_event(&mut interp, "off", vec![id]).unwrap(), vec![Value::Boolean(false)]);
    }

    #[test]
    fn test_push_queues_payload() {
        let mut interp = interp();
        let name = interp.new_string("data");
        let args = vec![name, Value::Number(1.0), Value::Number(2.0)];
        call_event(&mut interp, "push", args).unwrap();
        let event = interp.events_mut().pop_event().unwrap();
        assert_eq!(event.name, "data");
        assert_eq!(event.args, vec![Value::Number(1.0), Value::Number(2.0)]);
    }

    #[test]
    fn test_timers_validate_delay() {
        let mut interp = interp();
        let callback = interp.get_global("print");
        let id = call_event(&mut interp, "after", vec![Value::Number(0.5), callback]).unwrap()[0];
        assert!(interp.events().next_deadline().is_some());
        assert_eq!(
            call_event(&mut interp, "cancel", vec![id]).unwrap(),
            vec![Value::Boolean(true)]
        );

        let err = call_event(&mut interp, "every", vec![Value::Number(0.0), callback]).unwrap_err();
        assert_eq!(
            interp.describe_error(&err),
            "bad argument #1 to 'every' (positive interval expected)"
        );
        assert!(call_event(&mut interp, "after", vec![Value::Number(-1.0), callback]).is_err());
    }

    #[test]
    fn test_quit_and_missing_arguments() {
        let mut interp = interp();
        call_event(&mut interp, "quit", vec![]).unwrap();
        assert!(interp.events().quit_requested());

        let err = call_event(&mut interp, "on", vec![]).unwrap_err();
        assert_eq!(
            interp.describe_error(&err),
            "bad argument #1 to 'on' (string expected, got no value)"
        );
        assert_eq!(crate::builtins::arg(&[], 1), Value::Nil);
    }
}
