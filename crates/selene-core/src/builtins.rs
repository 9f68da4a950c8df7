//! Base library
//!
//! The minimal set of globals every interpreter starts with.

use crate::value::{format_number, Value};
use crate::vm::{Interpreter, VmError};

type NativeResult = Result<Vec<Value>, VmError>;

/// Register the base library into the interpreter's globals
pub fn open(interp: &mut Interpreter) {
    interp.register("print", print);
    interp.register("type", type_of);
    interp.register("tostring", tostring);
    interp.register("tonumber", tonumber);
    interp.register("error", error);
    interp.register("pcall", pcall);
    interp.register("assert", assert);
    interp.register("setmetatable", setmetatable);
    interp.register("getmetatable", getmetatable);
    interp.register("rawget", rawget);
    interp.register("rawset", rawset);
}

// ===== Argument Helpers =====

/// Argument at a 1-based position, nil when absent
pub(crate) fn arg(args: &[Value], position: usize) -> Value {
    args.get(position - 1).copied().unwrap_or(Value::Nil)
}

fn expected(
    interp: &mut Interpreter,
    position: usize,
    function: &str,
    wanted: &str,
    got: Value,
) -> VmError {
    let got = if got.is_nil() { "no value" } else { got.type_name() };
    interp.arg_error(position, function, format!("{} expected, got {}", wanted, got))
}

pub(crate) fn check_table(
    interp: &mut Interpreter,
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<Value, VmError> {
    match arg(args, position) {
        table @ Value::Table(_) => Ok(table),
        other => Err(expected(interp, position, function, "table", other)),
    }
}

pub(crate) fn check_string(
    interp: &mut Interpreter,
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<String, VmError> {
    match arg(args, position) {
        s @ Value::String(_) => Ok(interp.to_display(s)),
        Value::Number(n) => Ok(format_number(n)),
        other => Err(expected(interp, position, function, "string", other)),
    }
}

pub(crate) fn check_number(
    interp: &mut Interpreter,
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<f64, VmError> {
    match arg(args, position) {
        Value::Number(n) => Ok(n),
        other => Err(expected(interp, position, function, "number", other)),
    }
}

pub(crate) fn check_function(
    interp: &mut Interpreter,
    args: &[Value],
    position: usize,
    function: &str,
) -> Result<Value, VmError> {
    match arg(args, position) {
        f @ Value::Function(_) => Ok(f),
        other => Err(expected(interp, position, function, "function", other)),
    }
}

// ===== Functions =====

fn print(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let line = args
        .iter()
        .map(|&v| interp.to_display(v))
        .collect::<Vec<_>>()
        .join("\t");
    println!("{}", line);
    Ok(Vec::new())
}

fn type_of(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    if args.is_empty() {
        return Err(interp.arg_error(1, "type", "value expected"));
    }
    let name = arg(&args, 1).type_name();
    Ok(vec![interp.new_string(name)])
}

fn tostring(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let text = interp.to_display(arg(&args, 1));
    Ok(vec![interp.new_string(&text)])
}

fn tonumber(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let value = match arg(&args, 1) {
        n @ Value::Number(_) => n,
        s @ Value::String(_) => interp
            .to_str(s)
            .and_then(|text| text.trim().parse::<f64>().ok())
            .map_or(Value::Nil, Value::Number),
        _ => Value::Nil,
    };
    Ok(vec![value])
}

fn error(_: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    Err(VmError::Raised(arg(&args, 1)))
}

fn pcall(interp: &mut Interpreter, mut args: Vec<Value>) -> NativeResult {
    if args.is_empty() {
        return Err(interp.arg_error(1, "pcall", "value expected"));
    }
    let function = args.remove(0);
    match interp.pcall(function, args)? {
        Ok(mut results) => {
            results.insert(0, Value::Boolean(true));
            Ok(results)
        }
        Err(value) => Ok(vec![Value::Boolean(false), value]),
    }
}

fn assert(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    if arg(&args, 1).is_truthy() {
        return Ok(args);
    }
    match arg(&args, 2) {
        Value::Nil => Err(interp.runtime_error("assertion failed!")),
        message => Err(VmError::Raised(message)),
    }
}

fn setmetatable(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let table = check_table(interp, &args, 1, "setmetatable")?;
    let metatable = match arg(&args, 2) {
        Value::Nil => None,
        Value::Table(r) => Some(r),
        other => return Err(expected(interp, 2, "setmetatable", "nil or table", other)),
    };
    interp.set_metatable(table, metatable)?;
    Ok(vec![table])
}

fn getmetatable(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let metatable = interp.metatable(arg(&args, 1)).map_or(Value::Nil, Value::Table);
    Ok(vec![metatable])
}

fn rawget(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let table = check_table(interp, &args, 1, "rawget")?;
    Ok(vec![interp.raw_get(table, arg(&args, 2))])
}

fn rawset(interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
    let table = check_table(interp, &args, 1, "rawset")?;
    interp.raw_set(table, arg(&args, 2), arg(&args, 3))?;
    Ok(vec![table])
}
