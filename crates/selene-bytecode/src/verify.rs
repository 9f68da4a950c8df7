//! Bytecode verification
//!
//! Checks that every operand of a prototype tree refers to something that
//! exists, so the interpreter can index constants, locals, upvalues and
//! nested prototypes without re-checking them.

use crate::encoder::{BytecodeReader, DecodeError};
use crate::opcode::Opcode;
use crate::proto::{Capture, Proto};
use std::collections::HashSet;

/// Bytecode verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Invalid opcode
    #[error("Invalid opcode {opcode:#x} at offset {offset}")]
    InvalidOpcode {
        /// Offending byte
        opcode: u8,
        /// Offset of the byte
        offset: usize,
    },

    /// Instruction operands run past the end of the code
    #[error("Truncated instruction at offset {0}")]
    Truncated(usize),

    /// Invalid jump target
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Computed target
        target: isize,
        /// Offset of the jump
        offset: usize,
    },

    /// Invalid constant pool reference
    #[error("Invalid constant reference: index {index} at offset {offset}")]
    InvalidConstantRef {
        /// Referenced index
        index: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid local variable reference
    #[error("Invalid local reference: index {index} (max {max}) at offset {offset}")]
    InvalidLocalRef {
        /// Referenced slot
        index: usize,
        /// Number of slots
        max: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid upvalue reference
    #[error("Invalid upvalue reference: index {index} (max {max}) at offset {offset}")]
    InvalidUpvalueRef {
        /// Referenced upvalue
        index: usize,
        /// Number of upvalues
        max: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// Invalid nested prototype reference
    #[error("Invalid prototype reference: index {index} at offset {offset}")]
    InvalidProtoRef {
        /// Referenced prototype
        index: usize,
        /// Offset of the instruction
        offset: usize,
    },

    /// A nested prototype captures something its parent does not have
    #[error("Prototype '{proto}' has an invalid capture for upvalue {index}")]
    InvalidCapture {
        /// Nested prototype name
        proto: String,
        /// Upvalue index in the nested prototype
        index: usize,
    },

    /// Parameter or captured-local slots exceed the local count
    #[error("Invalid frame layout in '{0}'")]
    InvalidFrame(String),

    /// Execution falls off end
    #[error("Execution falls off end of function at offset {0}")]
    FallOffEnd(usize),

    /// A builder label was referenced but never placed
    #[error("Label {0} was never placed")]
    UnboundLabel(usize),
}

/// Verify a prototype and all prototypes nested in it
pub fn verify_proto(proto: &Proto) -> Result<(), VerifyError> {
    if proto.param_count > proto.local_count
        || proto.captured_locals.iter().any(|&slot| slot >= proto.local_count)
    {
        return Err(VerifyError::InvalidFrame(proto.name.clone()));
    }

    for nested in &proto.protos {
        for (index, upvalue) in nested.upvalues.iter().enumerate() {
            let valid = match upvalue.capture {
                Capture::Local(slot) => proto.is_captured(slot),
                Capture::Upvalue(up) => (up as usize) < proto.upvalues.len(),
            };
            if !valid {
                return Err(VerifyError::InvalidCapture {
                    proto: nested.name.clone(),
                    index,
                });
            }
        }
        verify_proto(nested)?;
    }

    verify_code(proto)
}

/// Parsed instruction
#[derive(Debug, Clone, Copy)]
struct Instruction {
    offset: usize,
    opcode: Opcode,
    end: usize,
}

fn verify_code(proto: &Proto) -> Result<(), VerifyError> {
    let mut instructions = Vec::new();
    let mut boundaries = HashSet::new();
    let mut reader = BytecodeReader::new(&proto.code);

    while reader.has_more() {
        let offset = reader.position();
        let byte = reader.read_u8().map_err(|_| VerifyError::Truncated(offset))?;
        let opcode = Opcode::from_u8(byte).ok_or(VerifyError::InvalidOpcode {
            opcode: byte,
            offset,
        })?;
        if reader.remaining() < opcode.operand_size() {
            return Err(VerifyError::Truncated(offset));
        }

        verify_operands(proto, opcode, offset, &mut reader)?;
        boundaries.insert(offset);
        instructions.push(Instruction {
            offset,
            opcode,
            end: reader.position(),
        });
    }

    for instr in &instructions {
        if instr.opcode.is_jump() {
            let mut operand = BytecodeReader::new(&proto.code);
            operand.seek(instr.offset + 1);
            let delta = operand
                .read_i16()
                .map_err(|_| VerifyError::Truncated(instr.offset))? as isize;
            let target = instr.end as isize + delta;
            if target < 0 || !boundaries.contains(&(target as usize)) {
                return Err(VerifyError::InvalidJumpTarget {
                    target,
                    offset: instr.offset,
                });
            }
        }
    }

    match instructions.last() {
        Some(last) if last.opcode.is_terminator() => Ok(()),
        Some(last) => Err(VerifyError::FallOffEnd(last.offset)),
        None => Err(VerifyError::FallOffEnd(0)),
    }
}

fn verify_operands(
    proto: &Proto,
    opcode: Opcode,
    offset: usize,
    reader: &mut BytecodeReader<'_>,
) -> Result<(), VerifyError> {
    let truncated = |_: DecodeError| VerifyError::Truncated(offset);
    let check_const = |index: u16| {
        if (index as usize) < proto.constants.len() {
            Ok(())
        } else {
            Err(VerifyError::InvalidConstantRef {
                index: index as usize,
                offset,
            })
        }
    };
    let check_upvalue = |index: u8| {
        if (index as usize) < proto.upvalues.len() {
            Ok(())
        } else {
            Err(VerifyError::InvalidUpvalueRef {
                index: index as usize,
                max: proto.upvalues.len(),
                offset,
            })
        }
    };

    match opcode {
        Opcode::Const | Opcode::GetField | Opcode::SetField => {
            check_const(reader.read_u16().map_err(truncated)?)
        }
        Opcode::GetLocal | Opcode::SetLocal => {
            let slot = reader.read_u8().map_err(truncated)?;
            if slot < proto.local_count {
                Ok(())
            } else {
                Err(VerifyError::InvalidLocalRef {
                    index: slot as usize,
                    max: proto.local_count as usize,
                    offset,
                })
            }
        }
        Opcode::GetUpval | Opcode::SetUpval => check_upvalue(reader.read_u8().map_err(truncated)?),
        Opcode::GetTabUp | Opcode::SetTabUp => {
            check_upvalue(reader.read_u8().map_err(truncated)?)?;
            check_const(reader.read_u16().map_err(truncated)?)
        }
        Opcode::Closure => {
            let index = reader.read_u16().map_err(truncated)? as usize;
            if index < proto.protos.len() {
                Ok(())
            } else {
                Err(VerifyError::InvalidProtoRef { index, offset })
            }
        }
        _ => {
            reader
                .read_bytes(opcode.operand_size())
                .map_err(truncated)?;
            Ok(())
        }
    }
}
