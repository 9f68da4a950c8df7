//! Heap object model: tables, closures and userdata

use crate::value::{Function, NativeFunction, ObjRef, Value};
use rustc_hash::FxHashMap;
use selene_bytecode::Proto;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Normalized table key
///
/// Integral floats are stored as integers so `t[1]` and `t[1.0]` name the
/// same slot. Nil and NaN cannot be keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// Boolean key
    Boolean(bool),
    /// Integral number key
    Integer(i64),
    /// Non-integral number key (raw bits)
    Float(u64),
    /// String key
    String(ObjRef),
    /// Table key
    Table(ObjRef),
    /// Closure key
    Closure(ObjRef),
    /// Native function key
    Native(NativeFunction),
    /// Opaque pointer key
    Pointer(usize),
    /// Userdata key
    Userdata(ObjRef),
}

impl TableKey {
    /// Build a key from a value; `None` for nil and NaN
    pub fn from_value(value: Value) -> Option<Self> {
        Some(match value {
            Value::Nil => return None,
            Value::Boolean(b) => TableKey::Boolean(b),
            Value::Number(n) if n.is_nan() => return None,
            Value::Number(n) => {
                if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
                    TableKey::Integer(n as i64)
                } else {
                    TableKey::Float(n.to_bits())
                }
            }
            Value::String(r) => TableKey::String(r),
            Value::Table(r) => TableKey::Table(r),
            Value::Function(Function::Closure(r)) => TableKey::Closure(r),
            Value::Function(Function::Native(f)) => TableKey::Native(f),
            Value::Pointer(p) => TableKey::Pointer(p),
            Value::Userdata(r) => TableKey::Userdata(r),
        })
    }

    /// The value this key was built from
    pub fn to_value(self) -> Value {
        match self {
            TableKey::Boolean(b) => Value::Boolean(b),
            TableKey::Integer(i) => Value::Number(i as f64),
            TableKey::Float(bits) => Value::Number(f64::from_bits(bits)),
            TableKey::String(r) => Value::String(r),
            TableKey::Table(r) => Value::Table(r),
            TableKey::Closure(r) => Value::Function(Function::Closure(r)),
            TableKey::Native(f) => Value::Function(Function::Native(f)),
            TableKey::Pointer(p) => Value::Pointer(p),
            TableKey::Userdata(r) => Value::Userdata(r),
        }
    }
}

/// Hash table with an optional metatable
#[derive(Debug, Default, Clone)]
pub struct Table {
    entries: FxHashMap<TableKey, Value>,
    metatable: Option<ObjRef>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table sized for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            metatable: None,
        }
    }

    /// Raw lookup
    pub fn get(&self, key: &TableKey) -> Value {
        self.entries.get(key).copied().unwrap_or(Value::Nil)
    }

    /// Raw store; storing nil removes the entry
    pub fn set(&mut self, key: TableKey, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Border of the array part: the largest `n` with `t[1..=n]` all present
    pub fn len(&self) -> usize {
        let mut n = 0;
        while self.entries.contains_key(&TableKey::Integer(n as i64 + 1)) {
            n += 1;
        }
        n
    }

    /// Number of stored entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (TableKey, Value)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    /// Attached metatable
    pub fn metatable(&self) -> Option<ObjRef> {
        self.metatable
    }

    /// Attach or detach a metatable
    pub fn set_metatable(&mut self, metatable: Option<ObjRef>) {
        self.metatable = metatable;
    }
}

/// Scripted function instance
#[derive(Debug, Clone)]
pub struct Closure {
    proto: Arc<Proto>,
    upvalues: Vec<ObjRef>,
}

impl Closure {
    /// Create a closure over `proto` with one cell per upvalue
    pub fn new(proto: Arc<Proto>, upvalues: Vec<ObjRef>) -> Self {
        Self { proto, upvalues }
    }

    /// Compiled prototype
    pub fn proto(&self) -> &Arc<Proto> {
        &self.proto
    }

    /// Upvalue cells
    pub fn upvalues(&self) -> &[ObjRef] {
        &self.upvalues
    }

    /// Rebind upvalue `index` to another cell; out-of-range indices are ignored
    pub fn set_upvalue(&mut self, index: usize, cell: ObjRef) {
        if let Some(slot) = self.upvalues.get_mut(index) {
            *slot = cell;
        }
    }
}

/// Host object stored in the heap
pub struct Userdata {
    type_name: &'static str,
    data: Box<dyn Any + Send>,
    metatable: Option<ObjRef>,
}

impl Userdata {
    /// Wrap a host value
    pub fn new<T: Any + Send>(type_name: &'static str, data: T) -> Self {
        Self {
            type_name,
            data: Box::new(data),
            metatable: None,
        }
    }

    /// Host-assigned type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the payload as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }

    /// Attached metatable
    pub fn metatable(&self) -> Option<ObjRef> {
        self.metatable
    }

    /// Attach or detach a metatable
    pub fn set_metatable(&mut self, metatable: Option<ObjRef>) {
        self.metatable = metatable;
    }
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Userdata")
            .field("type_name", &self.type_name)
            .field("metatable", &self.metatable)
            .finish_non_exhaustive()
    }
}
