//! Interpreter context
//!
//! An `Interpreter` owns:
//! - Its own heap and collector
//! - A globals table and a registry table for host bookkeeping
//! - A host stack used to hand values in and out
//! - An event queue driven by the thread's event loop
//! - Typed application data slots

use crate::config::RuntimeConfig;
use crate::event::EventQueue;
use crate::heap::{Heap, HeapObject, HeapStats};
use crate::object::{Closure, Table, TableKey, Userdata};
use crate::sync::InterruptHandle;
use crate::value::{format_number, Function, NativeFn, ObjRef, Value};
use crate::vm::VmError;
use rustc_hash::FxHashMap;
use selene_bytecode::Proto;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for an Interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterpreterId(u64);

impl InterpreterId {
    /// Create a new unique interpreter ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        InterpreterId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for InterpreterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-interpreter execution options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterOptions {
    /// Maximum nesting of script and native calls
    pub max_call_depth: usize,
    /// Allocations between opportunistic collections
    pub gc_threshold: usize,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            gc_threshold: 4096,
        }
    }
}

/// Isolated interpreter instance
pub struct Interpreter {
    id: InterpreterId,
    pub(crate) heap: Heap,
    globals: ObjRef,
    registry: ObjRef,
    stack: Vec<Value>,
    pub(crate) events: EventQueue,
    pub(crate) options: InterpreterOptions,
    pub(crate) interrupt: InterruptHandle,
    app_data: FxHashMap<TypeId, Box<dyn Any + Send>>,
    pub(crate) depth: usize,
}

impl Interpreter {
    /// Create an interpreter with the standard libraries open
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    /// Create an interpreter with the standard libraries open
    pub fn with_options(options: InterpreterOptions) -> Self {
        let mut interp = Self::bare(options);
        crate::builtins::open(&mut interp);
        crate::event::library::open(&mut interp);
        crate::thread::library::open(&mut interp);
        interp
    }

    /// Create an interpreter from a runtime configuration
    ///
    /// Threads spawned from this interpreter inherit the configuration.
    pub fn configured(config: Arc<RuntimeConfig>) -> Self {
        let mut interp = Self::with_options(config.interpreter.clone());
        interp.set_app_data(config);
        interp
    }

    /// Create an interpreter with no libraries at all
    pub fn bare(options: InterpreterOptions) -> Self {
        let mut heap = Heap::new();
        let globals = heap.alloc(HeapObject::Table(Table::new()));
        let registry = heap.alloc(HeapObject::Table(Table::new()));
        Self {
            id: InterpreterId::new(),
            heap,
            globals,
            registry,
            stack: Vec::new(),
            events: EventQueue::new(),
            options,
            interrupt: InterruptHandle::new(),
            app_data: FxHashMap::default(),
            depth: 0,
        }
    }

    /// Get the interpreter ID
    pub fn id(&self) -> InterpreterId {
        self.id
    }

    /// Execution options
    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    /// Borrow the heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Mutably borrow the heap
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Globals table
    pub fn globals(&self) -> Value {
        Value::Table(self.globals)
    }

    /// Registry table, reserved for host bookkeeping
    pub fn registry(&self) -> Value {
        Value::Table(self.registry)
    }

    /// Event queue
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Mutable event queue
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Current nesting of active calls
    pub fn call_depth(&self) -> usize {
        self.depth
    }

    /// Handle that interrupts this interpreter from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Whether this interpreter has been interrupted
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_interrupted()
    }

    // ===== Object Creation =====

    /// Intern a string
    pub fn new_string(&mut self, s: &str) -> Value {
        Value::String(self.heap.intern(s))
    }

    /// Allocate an empty table
    pub fn new_table(&mut self) -> Value {
        Value::Table(self.heap.alloc(HeapObject::Table(Table::new())))
    }

    /// Wrap a host value as userdata
    pub fn new_userdata<T: Any + Send>(&mut self, type_name: &'static str, data: T) -> Value {
        Value::Userdata(self.heap.alloc(HeapObject::Userdata(Userdata::new(type_name, data))))
    }

    /// Borrow a userdata payload as `T`
    pub fn userdata<T: Any>(&self, value: Value) -> Option<&T> {
        match value {
            Value::Userdata(r) => self.heap.userdata(r)?.downcast_ref(),
            _ => None,
        }
    }

    /// Instantiate a top-level prototype, binding `_ENV` to the globals
    pub fn load(&mut self, proto: Proto) -> Value {
        self.load_shared(Arc::new(proto))
    }

    /// Instantiate a shared top-level prototype
    pub fn load_shared(&mut self, proto: Arc<Proto>) -> Value {
        let globals = self.globals();
        let cells = proto
            .upvalues
            .iter()
            .map(|upvalue| {
                let initial = if upvalue.is_env() { globals } else { Value::Nil };
                self.heap.alloc_cell(initial)
            })
            .collect();
        let closure = self.heap.alloc(HeapObject::Closure(Closure::new(proto, cells)));
        Value::Function(Function::Closure(closure))
    }

    // ===== Strings & Display =====

    /// Contents of a string value
    pub fn to_str(&self, value: Value) -> Option<&str> {
        match value {
            Value::String(r) => self.heap.string(r),
            _ => None,
        }
    }

    /// Render a value the way `tostring` does
    pub fn to_display(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(n),
            Value::String(r) => self.heap.string(r).unwrap_or_default().to_string(),
            Value::Table(r) => format!("table: {:#010x}", r.index()),
            Value::Function(Function::Closure(r)) => format!("function: {:#010x}", r.index()),
            Value::Function(Function::Native(f)) => format!("function: builtin: {}", f.name()),
            Value::Pointer(p) => format!("userdata: {:#x}", p),
            Value::Userdata(r) => {
                let name = self.heap.userdata(r).map_or("userdata", Userdata::type_name);
                format!("{}: {:#010x}", name, r.index())
            }
        }
    }

    /// Readable message for an error
    pub fn describe_error(&self, error: &VmError) -> String {
        match error {
            VmError::Raised(value @ (Value::String(_) | Value::Number(_))) => {
                self.to_display(*value)
            }
            VmError::Raised(Value::Nil) => "nil".to_string(),
            VmError::Raised(value) => format!("(error object is a {} value)", value.type_name()),
            VmError::Interrupted => "execution interrupted".to_string(),
            VmError::Fault(message) => message.clone(),
        }
    }

    /// Build a script error carrying a string message
    pub fn runtime_error(&mut self, message: impl AsRef<str>) -> VmError {
        VmError::Raised(self.new_string(message.as_ref()))
    }

    /// Build a `bad argument` error for a native function
    pub fn arg_error(
        &mut self,
        position: usize,
        function: &str,
        message: impl AsRef<str>,
    ) -> VmError {
        let text = format!("bad argument #{} to '{}' ({})", position, function, message.as_ref());
        self.runtime_error(text)
    }

    // ===== Tables =====

    /// Raw read without metamethods
    pub fn raw_get(&self, table: Value, key: Value) -> Value {
        match (table, TableKey::from_value(key)) {
            (Value::Table(r), Some(key)) => self.heap.table(r).map_or(Value::Nil, |t| t.get(&key)),
            _ => Value::Nil,
        }
    }

    /// Raw read of a string-keyed field without interning the key
    pub fn raw_get_str(&self, table: Value, name: &str) -> Value {
        match self.heap.find_string(name) {
            Some(key) => self.raw_get(table, Value::String(key)),
            None => Value::Nil,
        }
    }

    /// Raw write without metamethods
    pub fn raw_set(&mut self, table: Value, key: Value, value: Value) -> Result<(), VmError> {
        let Some(normalized) = TableKey::from_value(key) else {
            let reason = if key.is_nil() { "table index is nil" } else { "table index is NaN" };
            return Err(self.runtime_error(reason));
        };
        match table {
            Value::Table(r) => match self.heap.table_mut(r) {
                Some(t) => {
                    t.set(normalized, value);
                    Ok(())
                }
                None => Err(VmError::Fault("dangling table reference".to_string())),
            },
            other => Err(self.runtime_error(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    /// Raw write of a string-keyed field
    pub fn set_field(&mut self, table: Value, name: &str, value: Value) -> Result<(), VmError> {
        let key = self.new_string(name);
        self.raw_set(table, key, value)
    }

    /// Read a global
    pub fn get_global(&self, name: &str) -> Value {
        self.raw_get_str(self.globals(), name)
    }

    /// Write a global
    pub fn set_global(&mut self, name: &str, value: Value) {
        let key = self.new_string(name);
        let globals = self.globals;
        if let Some(table) = self.heap.table_mut(globals) {
            // Interned string keys are never nil or NaN.
            if let Some(key) = TableKey::from_value(key) {
                table.set(key, value);
            }
        }
    }

    /// Register a native function as a global
    pub fn register(&mut self, name: &'static str, func: NativeFn) {
        self.set_global(name, Value::native(name, func));
    }

    /// Create a global table of native functions
    pub fn register_library(
        &mut self,
        name: &str,
        functions: &[(&'static str, NativeFn)],
    ) -> Value {
        let library = self.new_table();
        for &(field, func) in functions {
            // A freshly allocated table always accepts string keys.
            let _ = self.set_field(library, field, Value::native(field, func));
        }
        self.set_global(name, library);
        library
    }

    /// Metatable of a table or userdata
    pub fn metatable(&self, value: Value) -> Option<ObjRef> {
        match value {
            Value::Table(r) => self.heap.table(r)?.metatable(),
            Value::Userdata(r) => self.heap.userdata(r)?.metatable(),
            _ => None,
        }
    }

    /// Attach or detach the metatable of a table or userdata
    pub fn set_metatable(
        &mut self,
        value: Value,
        metatable: Option<ObjRef>,
    ) -> Result<(), VmError> {
        let attached = match value {
            Value::Table(r) => self.heap.table_mut(r).map(|t| t.set_metatable(metatable)),
            Value::Userdata(r) => self.heap.userdata_mut(r).map(|u| u.set_metatable(metatable)),
            _ => None,
        };
        match attached {
            Some(()) => Ok(()),
            None => Err(self.runtime_error(format!(
                "cannot set a metatable on a {} value",
                value.type_name()
            ))),
        }
    }

    // ===== Host Stack =====

    /// Push a value
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop a value
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Number of values on the host stack
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Value at a 0-based stack index
    pub fn stack_value(&self, index: usize) -> Option<Value> {
        self.stack.get(index).copied()
    }

    /// All values on the host stack
    pub fn stack_values(&self) -> &[Value] {
        &self.stack
    }

    /// Append values to the host stack
    pub fn extend_stack(&mut self, values: impl IntoIterator<Item = Value>) {
        self.stack.extend(values);
    }

    /// Drop everything at or above `len`
    pub fn truncate_stack(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    /// Remove and return everything at or above `from`
    pub fn take_stack(&mut self, from: usize) -> Vec<Value> {
        let from = from.min(self.stack.len());
        self.stack.split_off(from)
    }

    // ===== Application Data =====

    /// Store a typed application value, replacing any previous one
    pub fn set_app_data<T: Any + Send>(&mut self, data: T) {
        self.app_data.insert(TypeId::of::<T>(), Box::new(data));
    }

    /// Borrow a typed application value
    pub fn app_data<T: Any>(&self) -> Option<&T> {
        self.app_data.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Remove a typed application value
    pub fn remove_app_data<T: Any>(&mut self) -> Option<T> {
        let boxed = self.app_data.remove(&TypeId::of::<T>())?;
        boxed.downcast().ok().map(|b: Box<T>| *b)
    }

    // ===== Garbage Collection =====

    /// Collect unreachable objects now; returns the number freed
    ///
    /// Refuses to run while a call is active, since frame locals are not
    /// roots.
    pub fn collect_garbage(&mut self) -> usize {
        if self.depth > 0 {
            return 0;
        }
        let mut roots = vec![self.globals(), self.registry()];
        roots.extend_from_slice(&self.stack);
        roots.extend(self.events.roots());
        let freed = self.heap.collect(roots);
        tracing::trace!(interpreter = self.id.as_u64(), freed, "garbage collected");
        freed
    }

    /// Collect if enough allocations happened since the last collection
    pub fn maybe_collect(&mut self) -> bool {
        if self.depth == 0 && self.heap.allocated_since_collect() >= self.options.gc_threshold {
            self.collect_garbage();
            true
        } else {
            false
        }
    }

    /// Heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("id", &self.id)
            .field("stack", &self.stack.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpreter_id_uniqueness() {
        let a = InterpreterId::new();
        let b = InterpreterId::new();
        assert_ne!(a, b);
        assert_ne!(
            Interpreter::bare(Default::default()).id(),
            Interpreter::bare(Default::default()).id()
        );
    }

    #[test]
    fn test_globals_round_trip() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        interp.set_global("answer", Value::Number(42.0));
        assert_eq!(interp.get_global("answer"), Value::Number(42.0));
        assert_eq!(interp.get_global("missing"), Value::Nil);
    }

    #[test]
    fn test_raw_set_rejects_nil_key() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        let table = interp.new_table();
        let err = interp.raw_set(table, Value::Nil, Value::Boolean(true)).unwrap_err();
        assert_eq!(interp.describe_error(&err), "table index is nil");
    }

    #[test]
    fn test_host_stack() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        interp.extend_stack([Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(interp.take_stack(1), vec![Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(interp.stack_len(), 1);
        assert_eq!(interp.take_stack(5), Vec::<Value>::new());
    }

    #[test]
    fn test_app_data_slots() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        interp.set_app_data(7u32);
        interp.set_app_data("label");
        assert_eq!(interp.app_data::<u32>(), Some(&7));
        assert_eq!(interp.remove_app_data::<u32>(), Some(7));
        assert_eq!(interp.app_data::<u32>(), None);
        assert_eq!(interp.app_data::<&str>(), Some(&"label"));
    }

    #[test]
    fn test_collect_keeps_globals_and_stack() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        let kept = interp.new_table();
        interp.set_global("kept", kept);
        let stacked = interp.new_string("on the stack");
        interp.push(stacked);
        let _garbage = interp.new_table();

        assert_eq!(interp.collect_garbage(), 1);
        assert_eq!(interp.to_str(stacked), Some("on the stack"));
        assert!(interp.heap().table(kept.as_table().unwrap()).is_some());
    }

    #[test]
    fn test_display() {
        let mut interp = Interpreter::bare(InterpreterOptions::default());
        let s = interp.new_string("hi");
        assert_eq!(interp.to_display(s), "hi");
        assert_eq!(interp.to_display(Value::Number(3.0)), "3");
        assert_eq!(interp.to_display(Value::Nil), "nil");
        let data = interp.new_userdata("widget", ());
        assert!(interp.to_display(data).starts_with("widget: "));
    }
}
