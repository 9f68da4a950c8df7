//! Bytecode interpreter
//!
//! Calls are recursive: every scripted call gets its own [`Frame`] on the
//! Rust stack, so native functions can re-enter the interpreter freely.
//! The interrupt flag is polled on every call and backward jump.

use crate::heap::HeapObject;
use crate::object::{Closure, Table};
use crate::value::{Function, ObjRef, Value};
use crate::vm::{Interpreter, VmError};
use selene_bytecode::{Capture, Constant, Opcode, Proto, MULTI};
use std::sync::Arc;

/// Longest `__index` chain followed before giving up
const MAX_INDEX_CHAIN: usize = 100;

/// Activation record of a scripted call
struct Frame {
    proto: Arc<Proto>,
    upvalues: Vec<ObjRef>,
    locals: Vec<Value>,
    /// Cells backing captured locals
    cells: Vec<Option<ObjRef>>,
    varargs: Vec<Value>,
    stack: Vec<Value>,
    ip: usize,
}

impl Frame {
    fn enter(
        interp: &mut Interpreter,
        proto: Arc<Proto>,
        upvalues: Vec<ObjRef>,
        mut args: Vec<Value>,
    ) -> Result<Self, VmError> {
        let params = proto.param_count as usize;
        let varargs = if proto.is_vararg && args.len() > params {
            args.split_off(params)
        } else {
            Vec::new()
        };
        args.resize(params, Value::Nil);

        let mut locals = args;
        locals.resize(proto.local_count as usize, Value::Nil);

        let mut cells = vec![None; locals.len()];
        for &slot in &proto.captured_locals {
            let slot = slot as usize;
            let (Some(cell), Some(&initial)) = (cells.get_mut(slot), locals.get(slot)) else {
                return Err(VmError::Fault(format!("captured local {} out of range", slot)));
            };
            *cell = Some(interp.heap.alloc_cell(initial));
        }

        Ok(Self {
            proto,
            upvalues,
            locals,
            cells,
            varargs,
            stack: Vec::with_capacity(8),
            ip: 0,
        })
    }

    fn read_u8(&mut self) -> Result<u8, VmError> {
        let byte = *self
            .proto
            .code
            .get(self.ip)
            .ok_or_else(|| VmError::Fault(format!("code ends at offset {}", self.ip)))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, VmError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_i16(&mut self) -> Result<i16, VmError> {
        self.read_u16().map(|v| v as i16)
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::Fault("operand stack underflow".to_string()))
    }

    fn peek(&self) -> Result<Value, VmError> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| VmError::Fault("operand stack underflow".to_string()))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        if count > self.stack.len() {
            return Err(VmError::Fault("operand stack underflow".to_string()));
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    fn get_local(&self, interp: &Interpreter, slot: usize) -> Result<Value, VmError> {
        match (self.cells.get(slot), self.locals.get(slot)) {
            (Some(Some(cell)), _) => Ok(interp.heap.cell(*cell).unwrap_or(Value::Nil)),
            (Some(None), Some(&value)) => Ok(value),
            _ => Err(VmError::Fault(format!("local {} out of range", slot))),
        }
    }

    fn set_local(
        &mut self,
        interp: &mut Interpreter,
        slot: usize,
        value: Value,
    ) -> Result<(), VmError> {
        match (self.cells.get(slot), self.locals.get_mut(slot)) {
            (Some(Some(cell)), _) => {
                interp.heap.set_cell(*cell, value);
            }
            (Some(None), Some(local)) => *local = value,
            _ => return Err(VmError::Fault(format!("local {} out of range", slot))),
        }
        Ok(())
    }

    fn constant(&self, interp: &mut Interpreter, index: u16) -> Result<Value, VmError> {
        match self.proto.constants.get(index as usize) {
            Some(Constant::Number(n)) => Ok(Value::Number(*n)),
            Some(Constant::String(s)) => Ok(interp.new_string(s)),
            None => Err(VmError::Fault(format!("constant {} out of range", index))),
        }
    }

    fn upvalue(&self, index: usize) -> Result<ObjRef, VmError> {
        self.upvalues
            .get(index)
            .copied()
            .ok_or_else(|| VmError::Fault(format!("upvalue {} out of range", index)))
    }

    fn jump(&mut self, offset: i16) {
        self.ip = (self.ip as isize + offset as isize) as usize;
    }
}

/// Pad or truncate a result list to `wanted` values (`MULTI` keeps all)
fn adjust(mut values: Vec<Value>, wanted: u8) -> Vec<Value> {
    if wanted != MULTI {
        values.resize(wanted as usize, Value::Nil);
    }
    values
}

impl Interpreter {
    /// Call a function with full multi-return semantics
    pub fn call(&mut self, function: Value, args: Vec<Value>) -> Result<Vec<Value>, VmError> {
        if self.interrupt.is_interrupted() {
            return Err(VmError::Interrupted);
        }
        if self.depth >= self.options.max_call_depth {
            return Err(self.runtime_error("stack overflow"));
        }

        self.depth += 1;
        let result = match function {
            Value::Function(Function::Native(native)) => (native.func())(self, args),
            Value::Function(Function::Closure(closure)) => self.execute(closure, args),
            other => {
                Err(self.runtime_error(format!("attempt to call a {} value", other.type_name())))
            }
        };
        self.depth -= 1;
        result
    }

    /// Call a function, catching script errors
    ///
    /// Interruption is never caught.
    pub fn pcall(
        &mut self,
        function: Value,
        args: Vec<Value>,
    ) -> Result<Result<Vec<Value>, Value>, VmError> {
        match self.call(function, args) {
            Ok(results) => Ok(Ok(results)),
            Err(VmError::Raised(value)) => Ok(Err(value)),
            Err(VmError::Fault(message)) => Ok(Err(self.new_string(&message))),
            Err(VmError::Interrupted) => Err(VmError::Interrupted),
        }
    }

    /// Read `object[key]`, following `__index`
    pub fn index(&mut self, object: Value, key: Value) -> Result<Value, VmError> {
        let mut current = object;
        for _ in 0..MAX_INDEX_CHAIN {
            let metatable = match current {
                Value::Table(r) => {
                    let value = self.raw_get(current, key);
                    if !value.is_nil() {
                        return Ok(value);
                    }
                    self.heap.table(r).and_then(Table::metatable)
                }
                Value::Userdata(_) => self.metatable(current),
                other => {
                    return Err(self.runtime_error(format!(
                        "attempt to index a {} value",
                        other.type_name()
                    )))
                }
            };
            let Some(metatable) = metatable else {
                return Ok(Value::Nil);
            };
            match self.raw_get_str(Value::Table(metatable), "__index") {
                Value::Nil => return Ok(Value::Nil),
                handler @ Value::Function(_) => {
                    let results = self.call(handler, vec![current, key])?;
                    return Ok(results.into_iter().next().unwrap_or(Value::Nil));
                }
                next => current = next,
            }
        }
        Err(self.runtime_error("'__index' chain too long; possible loop"))
    }

    fn execute(&mut self, closure: ObjRef, args: Vec<Value>) -> Result<Vec<Value>, VmError> {
        let (proto, upvalues) = match self.heap.closure(closure) {
            Some(c) => (Arc::clone(c.proto()), c.upvalues().to_vec()),
            None => return Err(VmError::Fault("dangling closure reference".to_string())),
        };
        let mut frame = Frame::enter(self, proto, upvalues, args)?;

        loop {
            let offset = frame.ip;
            let byte = frame.read_u8()?;
            let opcode = Opcode::from_u8(byte).ok_or_else(|| {
                VmError::Fault(format!("invalid opcode {:#x} at offset {}", byte, offset))
            })?;

            match opcode {
                // ===== Stack Manipulation & Constants =====
                Opcode::Nop => {}
                Opcode::Pop => {
                    frame.pop()?;
                }
                Opcode::Dup => {
                    let top = frame.peek()?;
                    frame.push(top);
                }
                Opcode::Swap => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(b);
                    frame.push(a);
                }
                Opcode::Nil => frame.push(Value::Nil),
                Opcode::True => frame.push(Value::Boolean(true)),
                Opcode::False => frame.push(Value::Boolean(false)),
                Opcode::Const => {
                    let index = frame.read_u16()?;
                    let value = frame.constant(self, index)?;
                    frame.push(value);
                }

                // ===== Variables =====
                Opcode::GetLocal => {
                    let slot = frame.read_u8()? as usize;
                    let value = frame.get_local(self, slot)?;
                    frame.push(value);
                }
                Opcode::SetLocal => {
                    let slot = frame.read_u8()? as usize;
                    let value = frame.pop()?;
                    frame.set_local(self, slot, value)?;
                }
                Opcode::GetUpval => {
                    let index = frame.read_u8()? as usize;
                    let value = self.heap.cell(frame.upvalue(index)?).unwrap_or(Value::Nil);
                    frame.push(value);
                }
                Opcode::SetUpval => {
                    let index = frame.read_u8()? as usize;
                    let value = frame.pop()?;
                    self.heap.set_cell(frame.upvalue(index)?, value);
                }
                Opcode::GetTabUp => {
                    let index = frame.read_u8()? as usize;
                    let key = frame.read_u16()?;
                    let env = self.heap.cell(frame.upvalue(index)?).unwrap_or(Value::Nil);
                    let key = frame.constant(self, key)?;
                    let value = self.index(env, key)?;
                    frame.push(value);
                }
                Opcode::SetTabUp => {
                    let index = frame.read_u8()? as usize;
                    let key = frame.read_u16()?;
                    let value = frame.pop()?;
                    let env = self.heap.cell(frame.upvalue(index)?).unwrap_or(Value::Nil);
                    let key = frame.constant(self, key)?;
                    self.raw_set(env, key, value)?;
                }

                // ===== Tables =====
                Opcode::NewTable => {
                    let table = self.new_table();
                    frame.push(table);
                }
                Opcode::GetTable => {
                    let key = frame.pop()?;
                    let table = frame.pop()?;
                    let value = self.index(table, key)?;
                    frame.push(value);
                }
                Opcode::SetTable => {
                    let value = frame.pop()?;
                    let key = frame.pop()?;
                    let table = frame.pop()?;
                    self.raw_set(table, key, value)?;
                }
                Opcode::GetField => {
                    let key = frame.read_u16()?;
                    let table = frame.pop()?;
                    let key = frame.constant(self, key)?;
                    let value = self.index(table, key)?;
                    frame.push(value);
                }
                Opcode::SetField => {
                    let key = frame.read_u16()?;
                    let value = frame.pop()?;
                    let table = frame.pop()?;
                    let key = frame.constant(self, key)?;
                    self.raw_set(table, key, value)?;
                }

                // ===== Arithmetic & Strings =====
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let value = self.arith(opcode, a, b)?;
                    frame.push(value);
                }
                Opcode::Neg => {
                    let a = frame.pop()?;
                    let value = match a {
                        Value::Number(n) => Value::Number(-n),
                        other => return Err(self.arith_error(other)),
                    };
                    frame.push(value);
                }
                Opcode::Concat => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let value = self.concat(a, b)?;
                    frame.push(value);
                }
                Opcode::Len => {
                    let a = frame.pop()?;
                    let value = self.length(a)?;
                    frame.push(value);
                }

                // ===== Comparison & Logical =====
                Opcode::Eq => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(Value::Boolean(a == b));
                }
                Opcode::Lt | Opcode::Le => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let value = self.compare(opcode, a, b)?;
                    frame.push(Value::Boolean(value));
                }
                Opcode::Not => {
                    let a = frame.pop()?;
                    frame.push(Value::Boolean(!a.is_truthy()));
                }

                // ===== Control Flow =====
                Opcode::Jump => {
                    let delta = frame.read_i16()?;
                    if delta < 0 && self.interrupt.is_interrupted() {
                        return Err(VmError::Interrupted);
                    }
                    frame.jump(delta);
                }
                Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
                    let delta = frame.read_i16()?;
                    let condition = frame.pop()?.is_truthy();
                    if condition == (opcode == Opcode::JumpIfTrue) {
                        if delta < 0 && self.interrupt.is_interrupted() {
                            return Err(VmError::Interrupted);
                        }
                        frame.jump(delta);
                    }
                }

                // ===== Calls =====
                Opcode::Call => {
                    let argc = frame.read_u8()? as usize;
                    let nret = frame.read_u8()?;
                    let args = frame.pop_n(argc)?;
                    let callee = frame.pop()?;
                    let results = self.call(callee, args)?;
                    frame.stack.extend(adjust(results, nret));
                }
                Opcode::CallVarArgs => {
                    let fixed = frame.read_u8()? as usize;
                    let nret = frame.read_u8()?;
                    let mut args = frame.pop_n(fixed)?;
                    args.extend_from_slice(&frame.varargs);
                    let callee = frame.pop()?;
                    let results = self.call(callee, args)?;
                    frame.stack.extend(adjust(results, nret));
                }
                Opcode::Return => {
                    let count = frame.read_u8()?;
                    return if count == MULTI {
                        Ok(std::mem::take(&mut frame.stack))
                    } else {
                        frame.pop_n(count as usize)
                    };
                }
                Opcode::VarArg => {
                    let count = frame.read_u8()?;
                    let values = adjust(frame.varargs.clone(), count);
                    frame.stack.extend(values);
                }

                // ===== Closures =====
                Opcode::Closure => {
                    let index = frame.read_u16()? as usize;
                    let nested = frame.proto.protos.get(index).cloned().ok_or_else(|| {
                        VmError::Fault(format!("prototype {} out of range", index))
                    })?;
                    let mut cells = Vec::with_capacity(nested.upvalues.len());
                    for upvalue in &nested.upvalues {
                        let cell = match upvalue.capture {
                            Capture::Local(slot) => {
                                frame.cells.get(slot as usize).copied().flatten()
                            }
                            Capture::Upvalue(up) => frame.upvalues.get(up as usize).copied(),
                        };
                        cells.push(cell.ok_or_else(|| {
                            VmError::Fault(format!("bad capture for '{}'", upvalue.name))
                        })?);
                    }
                    let closure = self.heap.alloc(HeapObject::Closure(Closure::new(nested, cells)));
                    frame.push(Value::Function(Function::Closure(closure)));
                }
            }
        }
    }

    // ===== Operators =====

    fn arith_error(&mut self, operand: Value) -> VmError {
        self.runtime_error(format!(
            "attempt to perform arithmetic on a {} value",
            operand.type_name()
        ))
    }

    fn arith(&mut self, opcode: Opcode, a: Value, b: Value) -> Result<Value, VmError> {
        let (x, y) = match (a, b) {
            (Value::Number(x), Value::Number(y)) => (x, y),
            (Value::Number(_), other) | (other, _) => return Err(self.arith_error(other)),
        };
        let result = match opcode {
            Opcode::Add => x + y,
            Opcode::Sub => x - y,
            Opcode::Mul => x * y,
            Opcode::Div => x / y,
            Opcode::Mod => x - (x / y).floor() * y,
            _ => return Err(VmError::Fault(format!("{} is not arithmetic", opcode))),
        };
        Ok(Value::Number(result))
    }

    fn concat_piece(&mut self, value: Value) -> Result<String, VmError> {
        match value {
            Value::String(_) | Value::Number(_) => Ok(self.to_display(value)),
            other => Err(self.runtime_error(format!(
                "attempt to concatenate a {} value",
                other.type_name()
            ))),
        }
    }

    fn concat(&mut self, a: Value, b: Value) -> Result<Value, VmError> {
        let mut text = self.concat_piece(a)?;
        text.push_str(&self.concat_piece(b)?);
        Ok(self.new_string(&text))
    }

    fn length(&mut self, value: Value) -> Result<Value, VmError> {
        match value {
            Value::String(_) => Ok(Value::Number(self.to_str(value).map_or(0, str::len) as f64)),
            Value::Table(r) => Ok(Value::Number(self.heap.table(r).map_or(0, Table::len) as f64)),
            other => Err(self.runtime_error(format!(
                "attempt to get length of a {} value",
                other.type_name()
            ))),
        }
    }

    fn compare(&mut self, opcode: Opcode, a: Value, b: Value) -> Result<bool, VmError> {
        let ordering = match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(&y),
            (Value::String(_), Value::String(_)) => {
                let x = self.to_str(a).unwrap_or_default();
                let y = self.to_str(b).unwrap_or_default();
                Some(x.cmp(y))
            }
            _ => {
                return Err(self.runtime_error(format!(
                    "attempt to compare {} with {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        };
        Ok(match (opcode, ordering) {
            (_, None) => false,
            (Opcode::Lt, Some(o)) => o.is_lt(),
            (_, Some(o)) => o.is_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::InterpreterOptions;
    use selene_bytecode::ProtoBuilder;

    fn bare() -> Interpreter {
        Interpreter::bare(InterpreterOptions::default())
    }

    /// Unverified prototype with no locals, constants or upvalues
    fn unchecked(code: Vec<u8>, captured_locals: Vec<u8>) -> Proto {
        Proto {
            name: "unchecked".to_string(),
            param_count: 0,
            is_vararg: false,
            local_count: 1,
            captured_locals,
            constants: Vec::new(),
            upvalues: Vec::new(),
            protos: Vec::new(),
            code,
        }
    }

    #[test]
    fn test_out_of_range_operands_fault() {
        let ret = Opcode::Return as u8;
        let cases = [
            (vec![Opcode::Const as u8, 5, 0, ret, 1], vec![], "constant 5"),
            (vec![Opcode::GetLocal as u8, 3, ret, 1], vec![], "local 3"),
            (vec![Opcode::GetUpval as u8, 4, ret, 1], vec![], "upvalue 4"),
            (vec![Opcode::Closure as u8, 2, 0, ret, 1], vec![], "prototype 2"),
            (vec![Opcode::Nil as u8, ret, 1], vec![9], "captured local 9"),
        ];

        let mut interp = bare();
        for (code, captured, expected) in cases {
            let f = interp.load(unchecked(code, captured));
            match interp.call(f, vec![]) {
                Err(VmError::Fault(message)) => assert!(message.contains(expected), "{}", message),
                other => panic!("expected a fault mentioning {}, got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_arithmetic_and_return() {
        let mut interp = bare();
        let mut b = ProtoBuilder::with_params("add", 2);
        b.get_local(0).get_local(1).emit(Opcode::Add).ret(1);
        let f = interp.load(b.build().unwrap());

        let results = interp.call(f, vec![Value::Number(40.0), Value::Number(2.0)]).unwrap();
        assert_eq!(results, vec![Value::Number(42.0)]);
    }

    #[test]
    fn test_multiple_returns_and_varargs() {
        let mut interp = bare();
        let mut b = ProtoBuilder::new("pass").vararg();
        b.vararg_values(MULTI).ret_all();
        let f = interp.load(b.build().unwrap());

        let args = vec![Value::Number(1.0), Value::Boolean(true), Value::Nil];
        assert_eq!(interp.call(f, args.clone()).unwrap(), args);
    }

    #[test]
    fn test_loop_sums() {
        // local i, sum = n, 0; while i > 0 do sum = sum + i; i = i - 1 end; return sum
        let mut interp = bare();
        let mut b = ProtoBuilder::with_params("sum", 1);
        let sum = b.local();
        let top = b.label();
        let done = b.label();
        b.number(0.0).set_local(sum);
        b.place(top);
        b.number(0.0).get_local(0).emit(Opcode::Lt).jump_if_false(done);
        b.get_local(sum).get_local(0).emit(Opcode::Add).set_local(sum);
        b.get_local(0).number(1.0).emit(Opcode::Sub).set_local(0);
        b.jump(top);
        b.place(done);
        b.get_local(sum).ret(1);
        let f = interp.load(b.build().unwrap());

        assert_eq!(interp.call(f, vec![Value::Number(10.0)]).unwrap(), vec![Value::Number(55.0)]);
    }

    #[test]
    fn test_closures_share_captured_local() {
        // local n = 0; return function() n = n + 1; return n end
        let mut inner = ProtoBuilder::new("increment");
        let n = inner.capture_local("n", 0);
        inner.get_upvalue(n).number(1.0).emit(Opcode::Add).set_upvalue(n);
        inner.get_upvalue(n).ret(1);

        let mut outer = ProtoBuilder::new("counter");
        let slot = outer.local();
        outer.number(0.0).set_local(slot);
        outer.closure(inner.build().unwrap()).ret(1);

        let mut interp = bare();
        let make = interp.load(outer.build().unwrap());
        let counter = interp.call(make, vec![]).unwrap()[0];
        interp.call(counter, vec![]).unwrap();
        assert_eq!(interp.call(counter, vec![]).unwrap(), vec![Value::Number(2.0)]);
    }

    #[test]
    fn test_globals_through_env() {
        let mut interp = bare();
        let mut b = ProtoBuilder::new("globals");
        b.string("stored").set_global("value");
        b.get_global("value").ret(1);
        let f = interp.load(b.build().unwrap());

        let result = interp.call(f, vec![]).unwrap()[0];
        assert_eq!(interp.to_str(result), Some("stored"));
        assert_eq!(interp.get_global("value"), result);
    }

    #[test]
    fn test_index_follows_metatable() {
        let mut interp = bare();
        let base = interp.new_table();
        interp.set_field(base, "greeting", Value::Number(1.0)).unwrap();
        let meta = interp.new_table();
        interp.set_field(meta, "__index", base).unwrap();
        let object = interp.new_table();
        interp.set_metatable(object, meta.as_table()).unwrap();

        let key = interp.new_string("greeting");
        assert_eq!(interp.index(object, key).unwrap(), Value::Number(1.0));
        let missing = interp.new_string("missing");
        assert_eq!(interp.index(object, missing).unwrap(), Value::Nil);
    }

    #[test]
    fn test_runtime_errors() {
        let mut interp = bare();
        let mut b = ProtoBuilder::new("bad");
        b.nil().number(1.0).emit(Opcode::Add).ret(1);
        let f = interp.load(b.build().unwrap());

        let err = interp.call(f, vec![]).unwrap_err();
        assert_eq!(
            interp.describe_error(&err),
            "attempt to perform arithmetic on a nil value"
        );

        let err = interp.call(Value::Number(1.0), vec![]).unwrap_err();
        assert_eq!(interp.describe_error(&err), "attempt to call a number value");
        assert_eq!(interp.call_depth(), 0);
    }

    #[test]
    fn test_stack_overflow_is_reported() {
        // function f() return f() end
        let mut interp = Interpreter::bare(InterpreterOptions {
            max_call_depth: 32,
            ..Default::default()
        });
        let mut b = ProtoBuilder::new("recurse");
        b.get_global("recurse").call(0, MULTI).ret_all();
        let f = interp.load(b.build().unwrap());
        interp.set_global("recurse", f);

        let err = interp.call(f, vec![]).unwrap_err();
        assert_eq!(interp.describe_error(&err), "stack overflow");
        assert_eq!(interp.call_depth(), 0);
    }

    #[test]
    fn test_interrupt_stops_infinite_loop() {
        let mut interp = bare();
        let mut b = ProtoBuilder::new("spin");
        let top = b.label();
        b.place(top).jump(top);
        let f = interp.load(b.build().unwrap());

        interp.interrupt_handle().interrupt();
        assert!(matches!(interp.call(f, vec![]), Err(VmError::Interrupted)));
    }

    #[test]
    fn test_concat_and_compare() {
        let mut interp = bare();
        let mut b = ProtoBuilder::new("text");
        b.string("n=").number(3.0).emit(Opcode::Concat);
        b.string("a").string("b").emit(Opcode::Lt);
        b.ret(2);
        let f = interp.load(b.build().unwrap());

        let results = interp.call(f, vec![]).unwrap();
        assert_eq!(interp.to_str(results[0]), Some("n=3"));
        assert_eq!(results[1], Value::Boolean(true));
    }
}
