//! Prototype assembler
//!
//! `ProtoBuilder` emits instructions, interns constants, tracks locals and
//! upvalues and resolves jump labels. Every prototype it builds reserves
//! upvalue 0 for `_ENV`, captured from the enclosing function's upvalue 0,
//! so globals resolve the same way at every nesting level.

use crate::encoder::BytecodeWriter;
use crate::opcode::{Opcode, MULTI};
use crate::proto::{Capture, Constant, Proto, UpvalueDesc, ENV_UPVALUE};
use crate::verify::{verify_proto, VerifyError};
use std::sync::Arc;

/// A jump target inside a prototype under construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builder for [`Proto`]
#[derive(Debug)]
pub struct ProtoBuilder {
    name: String,
    param_count: u8,
    is_vararg: bool,
    local_count: u8,
    captured_locals: Vec<u8>,
    constants: Vec<Constant>,
    upvalues: Vec<UpvalueDesc>,
    protos: Vec<Arc<Proto>>,
    writer: BytecodeWriter,
    labels: Vec<Option<usize>>,
    patches: Vec<(usize, Label)>,
}

impl ProtoBuilder {
    /// Create a builder for a function without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_count: 0,
            is_vararg: false,
            local_count: 0,
            captured_locals: Vec::new(),
            constants: Vec::new(),
            upvalues: vec![UpvalueDesc {
                name: ENV_UPVALUE.to_string(),
                capture: Capture::Upvalue(0),
            }],
            protos: Vec::new(),
            writer: BytecodeWriter::new(),
            labels: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Create a builder whose first `count` locals are parameters
    pub fn with_params(name: impl Into<String>, count: u8) -> Self {
        let mut builder = Self::new(name);
        builder.param_count = count;
        builder.local_count = count;
        builder
    }

    /// Keep extra arguments as varargs
    pub fn vararg(mut self) -> Self {
        self.is_vararg = true;
        self
    }

    /// Allocate a new local slot
    pub fn local(&mut self) -> u8 {
        let slot = self.local_count;
        self.local_count += 1;
        slot
    }

    /// Intern a constant, returning its index
    pub fn constant(&mut self, constant: Constant) -> u16 {
        if let Some(index) = self.constants.iter().position(|c| *c == constant) {
            return index as u16;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u16
    }

    /// Declare an upvalue captured from a local of the enclosing function
    pub fn capture_local(&mut self, name: impl Into<String>, slot: u8) -> u8 {
        self.add_upvalue(name.into(), Capture::Local(slot))
    }

    /// Declare an upvalue shared with an upvalue of the enclosing function
    pub fn capture_upvalue(&mut self, name: impl Into<String>, index: u8) -> u8 {
        self.add_upvalue(name.into(), Capture::Upvalue(index))
    }

    fn add_upvalue(&mut self, name: String, capture: Capture) -> u8 {
        self.upvalues.push(UpvalueDesc { name, capture });
        (self.upvalues.len() - 1) as u8
    }

    // ===== Constants & Stack =====

    /// Push nil
    pub fn nil(&mut self) -> &mut Self {
        self.emit(Opcode::Nil)
    }

    /// Push a boolean
    pub fn boolean(&mut self, value: bool) -> &mut Self {
        self.emit(if value { Opcode::True } else { Opcode::False })
    }

    /// Push a number constant
    pub fn number(&mut self, value: f64) -> &mut Self {
        let index = self.constant(Constant::Number(value));
        self.writer.emit_op_u16(Opcode::Const, index);
        self
    }

    /// Push a string constant
    pub fn string(&mut self, value: &str) -> &mut Self {
        let index = self.constant(Constant::String(value.to_string()));
        self.writer.emit_op_u16(Opcode::Const, index);
        self
    }

    /// Emit an instruction that takes no operands
    pub fn emit(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert_eq!(opcode.operand_size(), 0, "{} takes operands", opcode);
        self.writer.emit_opcode(opcode);
        self
    }

    /// Pop the top value
    pub fn pop(&mut self) -> &mut Self {
        self.emit(Opcode::Pop)
    }

    /// Duplicate the top value
    pub fn dup(&mut self) -> &mut Self {
        self.emit(Opcode::Dup)
    }

    // ===== Variables =====

    /// Push a local
    pub fn get_local(&mut self, slot: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::GetLocal, slot);
        self
    }

    /// Pop into a local
    pub fn set_local(&mut self, slot: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::SetLocal, slot);
        self
    }

    /// Push an upvalue
    pub fn get_upvalue(&mut self, index: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::GetUpval, index);
        self
    }

    /// Pop into an upvalue
    pub fn set_upvalue(&mut self, index: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::SetUpval, index);
        self
    }

    /// Push a global
    pub fn get_global(&mut self, name: &str) -> &mut Self {
        let key = self.constant(Constant::String(name.to_string()));
        self.writer.emit_op_u8_u16(Opcode::GetTabUp, 0, key);
        self
    }

    /// Pop into a global
    pub fn set_global(&mut self, name: &str) -> &mut Self {
        let key = self.constant(Constant::String(name.to_string()));
        self.writer.emit_op_u8_u16(Opcode::SetTabUp, 0, key);
        self
    }

    // ===== Tables =====

    /// Push a new table
    pub fn new_table(&mut self) -> &mut Self {
        self.emit(Opcode::NewTable)
    }

    /// Pop key and table, push `table[key]`
    pub fn get_table(&mut self) -> &mut Self {
        self.emit(Opcode::GetTable)
    }

    /// Pop value, key and table, store `table[key] = value`
    pub fn set_table(&mut self) -> &mut Self {
        self.emit(Opcode::SetTable)
    }

    /// Pop table, push `table.name`
    pub fn get_field(&mut self, name: &str) -> &mut Self {
        let key = self.constant(Constant::String(name.to_string()));
        self.writer.emit_op_u16(Opcode::GetField, key);
        self
    }

    /// Pop value and table, store `table.name = value`
    pub fn set_field(&mut self, name: &str) -> &mut Self {
        let key = self.constant(Constant::String(name.to_string()));
        self.writer.emit_op_u16(Opcode::SetField, key);
        self
    }

    // ===== Calls =====

    /// Call with `argc` arguments, keeping `nret` results (`MULTI` keeps all)
    pub fn call(&mut self, argc: u8, nret: u8) -> &mut Self {
        self.writer.emit_op_u8_u8(Opcode::Call, argc, nret);
        self
    }

    /// Call with `fixed` arguments followed by this frame's varargs
    pub fn call_varargs(&mut self, fixed: u8, nret: u8) -> &mut Self {
        self.writer.emit_op_u8_u8(Opcode::CallVarArgs, fixed, nret);
        self
    }

    /// Return the top `count` values (`MULTI` returns the whole operand stack)
    pub fn ret(&mut self, count: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::Return, count);
        self
    }

    /// Return every value on the operand stack
    pub fn ret_all(&mut self) -> &mut Self {
        self.ret(MULTI)
    }

    /// Push `count` varargs (`MULTI` pushes all of them)
    pub fn vararg_values(&mut self, count: u8) -> &mut Self {
        self.writer.emit_op_u8(Opcode::VarArg, count);
        self
    }

    /// Nest a prototype and push a closure over it
    ///
    /// Locals the nested function captures become shared cells in this frame.
    pub fn closure(&mut self, proto: Proto) -> &mut Self {
        for upvalue in &proto.upvalues {
            if let Capture::Local(slot) = upvalue.capture {
                if !self.captured_locals.contains(&slot) {
                    self.captured_locals.push(slot);
                }
            }
        }
        self.protos.push(Arc::new(proto));
        let index = (self.protos.len() - 1) as u16;
        self.writer.emit_op_u16(Opcode::Closure, index);
        self
    }

    // ===== Control Flow =====

    /// Create an unplaced label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Place a label at the current offset
    pub fn place(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.writer.offset());
        self
    }

    /// Unconditional jump
    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.jump_op(Opcode::Jump, label)
    }

    /// Pop, jump when falsy
    pub fn jump_if_false(&mut self, label: Label) -> &mut Self {
        self.jump_op(Opcode::JumpIfFalse, label)
    }

    /// Pop, jump when truthy
    pub fn jump_if_true(&mut self, label: Label) -> &mut Self {
        self.jump_op(Opcode::JumpIfTrue, label)
    }

    fn jump_op(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        let at = self.writer.emit_jump(opcode);
        self.patches.push((at, label));
        self
    }

    /// Finish the prototype
    ///
    /// A trailing `RETURN 0` is appended so the function always terminates.
    pub fn build(mut self) -> Result<Proto, VerifyError> {
        self.writer.emit_op_u8(Opcode::Return, 0);

        for (at, label) in std::mem::take(&mut self.patches) {
            let target = self.labels[label.0].ok_or(VerifyError::UnboundLabel(label.0))?;
            let delta = target as isize - (at as isize + 2);
            self.writer.patch_i16(at, delta as i16);
        }

        let proto = Proto {
            name: self.name,
            param_count: self.param_count,
            is_vararg: self.is_vararg,
            local_count: self.local_count,
            captured_locals: self.captured_locals,
            constants: self.constants,
            upvalues: self.upvalues,
            protos: self.protos,
            code: self.writer.into_bytes(),
        };
        verify_proto(&proto)?;
        Ok(proto)
    }
}
