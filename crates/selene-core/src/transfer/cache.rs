//! Per-transfer copy cache

use crate::value::ObjRef;
use rustc_hash::FxHashMap;

/// Bidirectional map between source objects and their copies
///
/// Scoped to one transfer operation. Every source object reached during the
/// operation maps to exactly one destination object, which breaks cycles and
/// keeps shared sub-graphs shared.
#[derive(Debug, Default)]
pub struct CopyCache {
    forward: FxHashMap<ObjRef, ObjRef>,
    backward: FxHashMap<ObjRef, ObjRef>,
}

impl CopyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy already made for `source`
    pub fn get(&self, source: ObjRef) -> Option<ObjRef> {
        self.forward.get(&source).copied()
    }

    /// Source object a destination object was copied from
    pub fn source_of(&self, copy: ObjRef) -> Option<ObjRef> {
        self.backward.get(&copy).copied()
    }

    /// Record that `source` produced `copy`
    pub fn insert(&mut self, source: ObjRef, copy: ObjRef) {
        if let Some(previous) = self.forward.insert(source, copy) {
            self.backward.remove(&previous);
        }
        self.backward.insert(copy, source);
    }

    /// Withdraw the entry for `source`
    pub fn forget(&mut self, source: ObjRef) -> Option<ObjRef> {
        let copy = self.forward.remove(&source)?;
        self.backward.remove(&copy);
        Some(copy)
    }

    /// Number of recorded objects
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
