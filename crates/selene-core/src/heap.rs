//! Per-interpreter object heap
//!
//! Objects live in a slot arena addressed by [`ObjRef`]. Strings are
//! interned, so two equal strings in one heap share a reference. Memory is
//! reclaimed by a mark-and-sweep pass over explicit roots; the interpreter
//! only runs it when no script frame is active.

use crate::object::{Closure, Table, Userdata};
use crate::value::{ObjRef, Value};
use rustc_hash::FxHashMap;

/// Object stored in a heap slot
#[derive(Debug)]
pub enum HeapObject {
    /// Interned string
    String(Box<str>),
    /// Table
    Table(Table),
    /// Closure
    Closure(Closure),
    /// Upvalue cell shared by closures
    Cell(Value),
    /// Host object
    Userdata(Userdata),
}

#[derive(Debug)]
struct Slot {
    object: Option<HeapObject>,
    marked: bool,
}

/// Heap statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects currently allocated
    pub live_objects: usize,
    /// Completed collections
    pub collections: u64,
    /// Objects freed over the heap's lifetime
    pub freed_objects: u64,
}

/// Slot arena for one interpreter
#[derive(Debug, Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    strings: FxHashMap<Box<str>, ObjRef>,
    allocated_since_collect: usize,
    stats: HeapStats,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object
    pub fn alloc(&mut self, object: HeapObject) -> ObjRef {
        self.allocated_since_collect += 1;
        self.stats.live_objects += 1;
        let slot = Slot {
            object: Some(object),
            marked: false,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                ObjRef(index)
            }
            None => {
                self.slots.push(slot);
                ObjRef((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Intern a string, reusing an existing copy
    pub fn intern(&mut self, s: &str) -> ObjRef {
        if let Some(&r) = self.strings.get(s) {
            return r;
        }
        let r = self.alloc(HeapObject::String(s.into()));
        self.strings.insert(s.into(), r);
        r
    }

    /// Reference of an already interned string
    pub fn find_string(&self, s: &str) -> Option<ObjRef> {
        self.strings.get(s).copied()
    }

    /// Borrow an object
    pub fn get(&self, r: ObjRef) -> Option<&HeapObject> {
        self.slots.get(r.index()).and_then(|slot| slot.object.as_ref())
    }

    /// Mutably borrow an object
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut HeapObject> {
        self.slots
            .get_mut(r.index())
            .and_then(|slot| slot.object.as_mut())
    }

    /// String contents
    pub fn string(&self, r: ObjRef) -> Option<&str> {
        match self.get(r) {
            Some(HeapObject::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow a table
    pub fn table(&self, r: ObjRef) -> Option<&Table> {
        match self.get(r) {
            Some(HeapObject::Table(t)) => Some(t),
            _ => None,
        }
    }

    /// Mutably borrow a table
    pub fn table_mut(&mut self, r: ObjRef) -> Option<&mut Table> {
        match self.get_mut(r) {
            Some(HeapObject::Table(t)) => Some(t),
            _ => None,
        }
    }

    /// Borrow a closure
    pub fn closure(&self, r: ObjRef) -> Option<&Closure> {
        match self.get(r) {
            Some(HeapObject::Closure(c)) => Some(c),
            _ => None,
        }
    }

    /// Mutably borrow a closure
    pub fn closure_mut(&mut self, r: ObjRef) -> Option<&mut Closure> {
        match self.get_mut(r) {
            Some(HeapObject::Closure(c)) => Some(c),
            _ => None,
        }
    }

    /// Allocate an upvalue cell
    pub fn alloc_cell(&mut self, value: Value) -> ObjRef {
        self.alloc(HeapObject::Cell(value))
    }

    /// Current value of a cell
    pub fn cell(&self, r: ObjRef) -> Option<Value> {
        match self.get(r) {
            Some(HeapObject::Cell(v)) => Some(*v),
            _ => None,
        }
    }

    /// Overwrite a cell; returns false if `r` is not a cell
    pub fn set_cell(&mut self, r: ObjRef, value: Value) -> bool {
        match self.get_mut(r) {
            Some(HeapObject::Cell(v)) => {
                *v = value;
                true
            }
            _ => false,
        }
    }

    /// Borrow a userdata
    pub fn userdata(&self, r: ObjRef) -> Option<&Userdata> {
        match self.get(r) {
            Some(HeapObject::Userdata(u)) => Some(u),
            _ => None,
        }
    }

    /// Mutably borrow a userdata
    pub fn userdata_mut(&mut self, r: ObjRef) -> Option<&mut Userdata> {
        match self.get_mut(r) {
            Some(HeapObject::Userdata(u)) => Some(u),
            _ => None,
        }
    }

    /// Heap statistics
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Allocations since the last collection
    pub fn allocated_since_collect(&self) -> usize {
        self.allocated_since_collect
    }

    // ===== Collection =====

    /// Free every object not reachable from `roots`, returning the count freed
    pub fn collect(&mut self, roots: impl IntoIterator<Item = Value>) -> usize {
        let mut worklist: Vec<ObjRef> = roots.into_iter().filter_map(|v| v.object_ref()).collect();

        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index()) else {
                continue;
            };
            if slot.marked {
                continue;
            }
            slot.marked = true;
            match &slot.object {
                Some(HeapObject::Table(table)) => {
                    for (key, value) in table.iter() {
                        worklist.extend(key.to_value().object_ref());
                        worklist.extend(value.object_ref());
                    }
                    worklist.extend(table.metatable());
                }
                Some(HeapObject::Closure(closure)) => {
                    worklist.extend_from_slice(closure.upvalues())
                }
                Some(HeapObject::Cell(value)) => worklist.extend(value.object_ref()),
                Some(HeapObject::Userdata(data)) => worklist.extend(data.metatable()),
                Some(HeapObject::String(_)) | None => {}
            }
        }

        let mut garbage = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
            } else if let Some(object) = slot.object.take() {
                if let HeapObject::String(s) = &object {
                    self.strings.remove(s);
                }
                self.free.push(index as u32);
                garbage.push(object);
            }
        }

        let freed = garbage.len();
        self.stats.live_objects -= freed;
        self.stats.freed_objects += freed as u64;
        self.stats.collections += 1;
        self.allocated_since_collect = 0;
        // Userdata destructors may run arbitrary host code; run them once the
        // heap is consistent again.
        drop(garbage);
        freed
    }
}
