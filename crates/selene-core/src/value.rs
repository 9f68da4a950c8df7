//! Script values
//!
//! A `Value` is a small `Copy` word. Heap-backed variants hold an [`ObjRef`]
//! into the heap of the interpreter that created them and mean nothing in
//! any other interpreter; moving them elsewhere goes through
//! [`crate::transfer`].

use crate::vm::{Interpreter, VmError};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of an object in one interpreter's heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    /// Slot index in the owning heap
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Signature of host functions callable from scripts
pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Vec<Value>, VmError>;

/// A host function
///
/// Native functions are plain code pointers, valid in every interpreter of
/// the process. Two natives are equal when they share an entry point.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    name: &'static str,
    func: NativeFn,
}

impl NativeFunction {
    /// Wrap a host function
    pub const fn new(name: &'static str, func: NativeFn) -> Self {
        Self { name, func }
    }

    /// Registered name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Entry point
    pub fn func(&self) -> NativeFn {
        self.func
    }

    /// Entry-point address, the process-wide identity of this function
    pub fn address(&self) -> usize {
        self.func as usize
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::fn_addr_eq(self.func, other.func)
    }
}

impl Eq for NativeFunction {}

impl Hash for NativeFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({} @ {:#x})", self.name, self.address())
    }
}

/// A callable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// Scripted closure living in the heap
    Closure(ObjRef),
    /// Host function
    Native(NativeFunction),
}

/// A script value
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean
    Boolean(bool),
    /// Double precision number
    Number(f64),
    /// Interned string
    String(ObjRef),
    /// Opaque address-sized pointer owned by the embedder
    Pointer(usize),
    /// Table
    Table(ObjRef),
    /// Closure or native function
    Function(Function),
    /// Host object; cannot leave its interpreter
    Userdata(ObjRef),
}

impl Value {
    /// Wrap a native function
    pub const fn native(name: &'static str, func: NativeFn) -> Self {
        Value::Function(Function::Native(NativeFunction::new(name, func)))
    }

    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Everything except nil and false is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Script-visible type name, as returned by `type()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Pointer(_) | Value::Userdata(_) => "userdata",
        }
    }

    /// Numeric payload
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Table reference
    pub fn as_table(&self) -> Option<ObjRef> {
        match self {
            Value::Table(r) => Some(*r),
            _ => None,
        }
    }

    /// Heap object this value keeps alive
    pub fn object_ref(&self) -> Option<ObjRef> {
        match self {
            Value::String(r)
            | Value::Table(r)
            | Value::Userdata(r)
            | Value::Function(Function::Closure(r)) => Some(*r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

/// Format a number the way scripts print it
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
