//! Value classification for transfer

use crate::value::Value;

/// Kind of a value as seen by the transfer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Nil
    Nil,
    /// Boolean
    Boolean,
    /// Number
    Number,
    /// String, copied by content
    String,
    /// Embedder-owned pointer, copied by raw value
    OpaquePointer,
    /// Table, copied recursively
    Table,
    /// Closure or native function
    Function,
    /// Anything bound to its interpreter (userdata)
    Unsupported,
}

/// How a kind of value crosses interpreters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Copyability {
    /// Copied by value
    Atomic,
    /// Copied recursively through the copy cache
    Composite,
    /// Cannot be copied
    Unsupported,
}

impl ValueKind {
    /// Classify a value
    pub fn of(value: Value) -> Self {
        match value {
            Value::Nil => ValueKind::Nil,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Pointer(_) => ValueKind::OpaquePointer,
            Value::Table(_) => ValueKind::Table,
            Value::Function(_) => ValueKind::Function,
            Value::Userdata(_) => ValueKind::Unsupported,
        }
    }

    /// How values of this kind are copied
    pub fn copyability(self) -> Copyability {
        match self {
            ValueKind::Nil
            | ValueKind::Boolean
            | ValueKind::Number
            | ValueKind::String
            | ValueKind::OpaquePointer => Copyability::Atomic,
            ValueKind::Table | ValueKind::Function => Copyability::Composite,
            ValueKind::Unsupported => Copyability::Unsupported,
        }
    }
}

/// Shorthand for `ValueKind::of(value).copyability()`
pub fn classify(value: Value) -> Copyability {
    ValueKind::of(value).copyability()
}
