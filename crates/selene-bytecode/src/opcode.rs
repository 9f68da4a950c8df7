//! Bytecode opcodes for the Selene interpreter
//!
//! Every instruction is one opcode byte followed by fixed-size operands.
//! Multi-byte operands are little-endian.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Stack manipulation & constants
//! - 0x10-0x1F: Locals, upvalues and globals
//! - 0x20-0x2F: Tables
//! - 0x30-0x3F: Arithmetic & strings
//! - 0x40-0x4F: Comparison & logical
//! - 0x50-0x5F: Control flow
//! - 0x60-0x6F: Calls
//! - 0x70-0x7F: Closures

/// Operand value for `Call`, `Return` and `VarArg` meaning "all values".
pub const MULTI: u8 = 0xFF;

/// Bytecode opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Swap top two stack values
    Swap = 0x03,
    /// Push nil
    Nil = 0x04,
    /// Push true
    True = 0x05,
    /// Push false
    False = 0x06,
    /// Push constant (operand: u16 constant index)
    Const = 0x07,

    // ===== Locals, Upvalues & Globals (0x10-0x1F) =====
    /// Push local (operand: u8 slot)
    GetLocal = 0x10,
    /// Pop into local (operand: u8 slot)
    SetLocal = 0x11,
    /// Push upvalue (operand: u8 index)
    GetUpval = 0x12,
    /// Pop into upvalue (operand: u8 index)
    SetUpval = 0x13,
    /// Push `upvalue[K]` (operands: u8 upvalue, u16 constant key)
    GetTabUp = 0x14,
    /// Pop into `upvalue[K]` (operands: u8 upvalue, u16 constant key)
    SetTabUp = 0x15,

    // ===== Tables (0x20-0x2F) =====
    /// Push a new empty table
    NewTable = 0x20,
    /// Pop key and table, push `table[key]`
    GetTable = 0x21,
    /// Pop value, key and table, store `table[key] = value`
    SetTable = 0x22,
    /// Pop table, push `table[K]` (operand: u16 constant key)
    GetField = 0x23,
    /// Pop value and table, store `table[K] = value` (operand: u16 constant key)
    SetField = 0x24,

    // ===== Arithmetic & Strings (0x30-0x3F) =====
    /// Addition
    Add = 0x30,
    /// Subtraction
    Sub = 0x31,
    /// Multiplication
    Mul = 0x32,
    /// Division
    Div = 0x33,
    /// Floored modulo
    Mod = 0x34,
    /// Negation
    Neg = 0x35,
    /// String concatenation
    Concat = 0x36,
    /// Length of a string or table
    Len = 0x37,

    // ===== Comparison & Logical (0x40-0x4F) =====
    /// Raw equality
    Eq = 0x40,
    /// Less than
    Lt = 0x41,
    /// Less than or equal
    Le = 0x42,
    /// Logical not
    Not = 0x43,

    // ===== Control Flow (0x50-0x5F) =====
    /// Unconditional jump (operand: i16 offset)
    Jump = 0x50,
    /// Pop, jump if falsy (operand: i16 offset)
    JumpIfFalse = 0x51,
    /// Pop, jump if truthy (operand: i16 offset)
    JumpIfTrue = 0x52,

    // ===== Calls (0x60-0x6F) =====
    /// Call (operands: u8 argument count, u8 result count or MULTI)
    Call = 0x60,
    /// Call with the frame's varargs appended (operands: u8 fixed count, u8 result count)
    CallVarArgs = 0x61,
    /// Return (operand: u8 value count or MULTI)
    Return = 0x62,
    /// Push varargs (operand: u8 count or MULTI)
    VarArg = 0x63,

    // ===== Closures (0x70-0x7F) =====
    /// Instantiate nested prototype (operand: u16 prototype index)
    Closure = 0x70,
}

impl Opcode {
    /// Convert a byte to an opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Pop),
            0x02 => Some(Self::Dup),
            0x03 => Some(Self::Swap),
            0x04 => Some(Self::Nil),
            0x05 => Some(Self::True),
            0x06 => Some(Self::False),
            0x07 => Some(Self::Const),

            0x10 => Some(Self::GetLocal),
            0x11 => Some(Self::SetLocal),
            0x12 => Some(Self::GetUpval),
            0x13 => Some(Self::SetUpval),
            0x14 => Some(Self::GetTabUp),
            0x15 => Some(Self::SetTabUp),

            0x20 => Some(Self::NewTable),
            0x21 => Some(Self::GetTable),
            0x22 => Some(Self::SetTable),
            0x23 => Some(Self::GetField),
            0x24 => Some(Self::SetField),

            0x30 => Some(Self::Add),
            0x31 => Some(Self::Sub),
            0x32 => Some(Self::Mul),
            0x33 => Some(Self::Div),
            0x34 => Some(Self::Mod),
            0x35 => Some(Self::Neg),
            0x36 => Some(Self::Concat),
            0x37 => Some(Self::Len),

            0x40 => Some(Self::Eq),
            0x41 => Some(Self::Lt),
            0x42 => Some(Self::Le),
            0x43 => Some(Self::Not),

            0x50 => Some(Self::Jump),
            0x51 => Some(Self::JumpIfFalse),
            0x52 => Some(Self::JumpIfTrue),

            0x60 => Some(Self::Call),
            0x61 => Some(Self::CallVarArgs),
            0x62 => Some(Self::Return),
            0x63 => Some(Self::VarArg),

            0x70 => Some(Self::Closure),

            _ => None,
        }
    }

    /// Convert opcode to byte
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Size in bytes of the operands following this opcode
    pub fn operand_size(self) -> usize {
        match self {
            Self::GetLocal
            | Self::SetLocal
            | Self::GetUpval
            | Self::SetUpval
            | Self::Return
            | Self::VarArg => 1,
            Self::Const
            | Self::GetField
            | Self::SetField
            | Self::Jump
            | Self::JumpIfFalse
            | Self::JumpIfTrue
            | Self::Call
            | Self::CallVarArgs
            | Self::Closure => 2,
            Self::GetTabUp | Self::SetTabUp => 3,
            _ => 0,
        }
    }

    /// Whether this opcode carries a relative jump offset
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::JumpIfTrue)
    }

    /// Whether control never falls through to the next instruction
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Return | Self::Jump)
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Pop => "POP",
            Self::Dup => "DUP",
            Self::Swap => "SWAP",
            Self::Nil => "NIL",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Const => "CONST",
            Self::GetLocal => "GET_LOCAL",
            Self::SetLocal => "SET_LOCAL",
            Self::GetUpval => "GET_UPVAL",
            Self::SetUpval => "SET_UPVAL",
            Self::GetTabUp => "GET_TABUP",
            Self::SetTabUp => "SET_TABUP",
            Self::NewTable => "NEW_TABLE",
            Self::GetTable => "GET_TABLE",
            Self::SetTable => "SET_TABLE",
            Self::GetField => "GET_FIELD",
            Self::SetField => "SET_FIELD",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Concat => "CONCAT",
            Self::Len => "LEN",
            Self::Eq => "EQ",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Not => "NOT",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::JumpIfTrue => "JUMP_IF_TRUE",
            Self::Call => "CALL",
            Self::CallVarArgs => "CALL_VARARGS",
            Self::Return => "RETURN",
            Self::VarArg => "VARARG",
            Self::Closure => "CLOSURE",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_mapping() {
        for byte in 0u8..=0xFF {
            if let Some(op) = Opcode::from_u8(byte) {
                assert_eq!(op.to_u8(), byte, "{} does not map back", op);
            }
        }
        assert_eq!(Opcode::from_u8(0xFE), None);
    }

    #[test]
    fn test_operand_sizes() {
        assert_eq!(Opcode::Add.operand_size(), 0);
        assert_eq!(Opcode::GetLocal.operand_size(), 1);
        assert_eq!(Opcode::Call.operand_size(), 2);
        assert_eq!(Opcode::GetTabUp.operand_size(), 3);
    }

    #[test]
    fn test_terminators() {
        assert!(Opcode::Return.is_terminator());
        assert!(Opcode::Jump.is_terminator());
        assert!(!Opcode::JumpIfFalse.is_terminator());
        assert!(Opcode::JumpIfFalse.is_jump());
    }
}
