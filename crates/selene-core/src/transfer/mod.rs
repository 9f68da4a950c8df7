//! Cross-interpreter value transfer
//!
//! Values hold references into the heap of the interpreter that created
//! them, so crossing to another interpreter means a deep copy:
//!
//! - Atomic values (nil, booleans, numbers, opaque pointers) copy by value;
//!   strings copy by content into the destination's string table
//! - Tables are rebuilt entry by entry, metatable included
//! - Closures are dumped to bytecode, reloaded in the destination and have
//!   their captured cells copied
//! - Native functions are process-wide and pass through unchanged
//! - Userdata never leaves its interpreter
//!
//! One [`TransferOperation`] spans one top-level call and owns the
//! [`CopyCache`] that keeps cycles finite and shared objects shared.

mod cache;
mod classify;
mod error;
mod function;
mod table;

pub use cache::CopyCache;
pub use classify::{classify, Copyability, ValueKind};
pub use error::{TransferError, TransferErrorKind};

use crate::value::{ObjRef, Value};
use crate::vm::Interpreter;
use rustc_hash::FxHashMap;
use selene_bytecode::Proto;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Transfer behaviour knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferPolicy {
    /// Bind a relocated closure's `_ENV` to the destination's globals
    /// instead of copying the source's globals table
    pub use_destination_globals: bool,
    /// Relocate scripted closures; natives always transfer
    pub relocate_closures: bool,
    /// Deepest composite nesting accepted
    pub max_depth: usize,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            use_destination_globals: true,
            relocate_closures: true,
            max_depth: 200,
        }
    }
}

/// One deep-copy operation between two interpreters
pub struct TransferOperation<'a> {
    src: &'a Interpreter,
    dst: &'a mut Interpreter,
    policy: TransferPolicy,
    cache: CopyCache,
    protos: FxHashMap<usize, Arc<Proto>>,
    depth: usize,
}

impl<'a> TransferOperation<'a> {
    /// Start an operation copying from `src` into `dst`
    pub fn new(src: &'a Interpreter, dst: &'a mut Interpreter, policy: TransferPolicy) -> Self {
        Self {
            src,
            dst,
            policy,
            cache: CopyCache::new(),
            protos: FxHashMap::default(),
            depth: 0,
        }
    }

    /// Copy one value, reporting failures at `position`
    ///
    /// Objects already copied by this operation are reused.
    pub fn copy_value(&mut self, position: usize, value: Value) -> Result<Value, TransferError> {
        self.copy(value).map_err(|kind| TransferError::new(position, kind))
    }

    /// Objects copied so far
    pub fn cache(&self) -> &CopyCache {
        &self.cache
    }

    pub(crate) fn copy(&mut self, value: Value) -> Result<Value, TransferErrorKind> {
        match classify(value) {
            Copyability::Atomic => self.copy_atomic(value),
            Copyability::Composite => match value {
                Value::Table(r) => self.copy_table(r).map(Value::Table),
                Value::Function(f) => self.copy_function(f).map(Value::Function),
                other => Err(self.unsupported(other)),
            },
            Copyability::Unsupported => Err(self.unsupported(value)),
        }
    }

    fn copy_atomic(&mut self, value: Value) -> Result<Value, TransferErrorKind> {
        match value {
            Value::String(r) => {
                let src: &'a Interpreter = self.src;
                let Some(text) = src.to_str(value) else {
                    return Err(self.invalid(r));
                };
                Ok(self.dst.new_string(text))
            }
            other => Ok(other),
        }
    }

    fn unsupported(&self, value: Value) -> TransferErrorKind {
        let type_name = match value {
            Value::Userdata(r) => self.src.heap.userdata(r).map_or("userdata", |u| u.type_name()),
            other => other.type_name(),
        };
        TransferErrorKind::Unsupported { type_name }
    }

    fn invalid(&self, r: ObjRef) -> TransferErrorKind {
        tracing::warn!(object = r.index(), "transfer reached a dangling reference");
        TransferErrorKind::Unsupported {
            type_name: "invalid reference",
        }
    }

    fn enter(&mut self) -> Result<(), TransferErrorKind> {
        if self.depth >= self.policy.max_depth {
            return Err(TransferErrorKind::TooDeep {
                limit: self.policy.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }
}

/// Copy `values` from `src` into `dst` under one operation
///
/// Positions in errors are 1-based within `values`.
pub fn copy_slice(
    src: &Interpreter,
    dst: &mut Interpreter,
    values: &[Value],
    policy: TransferPolicy,
) -> Result<Vec<Value>, TransferError> {
    let (src_id, dst_id) = (src.id().as_u64(), dst.id().as_u64());
    let mut operation = TransferOperation::new(src, dst, policy);
    let copies = values
        .iter()
        .enumerate()
        .map(|(i, &value)| operation.copy_value(i + 1, value))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::trace!(
        src = src_id,
        dst = dst_id,
        values = copies.len(),
        objects = operation.cache().len(),
        "values transferred"
    );
    Ok(copies)
}

/// Copy `count` stack values of `src`, starting at 0-based `src_index`, onto
/// the stack of `dst`
///
/// Slots past the top of `src`'s stack read as nil. On failure the stack of
/// `dst` is left as it was.
pub fn copy_values(
    src: &Interpreter,
    dst: &mut Interpreter,
    src_index: usize,
    count: usize,
    policy: TransferPolicy,
) -> Result<(), TransferError> {
    let values: Vec<Value> = (src_index..src_index + count)
        .map(|i| src.stack_value(i).unwrap_or(Value::Nil))
        .collect();
    let copies = copy_slice(src, dst, &values, policy)?;
    dst.extend_stack(copies);
    Ok(())
}

/// Move the top `count` stack values of `src` onto the stack of `dst`
///
/// `src` is only popped when the copy succeeds.
pub fn move_values(
    src: &mut Interpreter,
    dst: &mut Interpreter,
    count: usize,
    policy: TransferPolicy,
) -> Result<(), TransferError> {
    let from = src.stack_len().saturating_sub(count);
    copy_values(src, dst, from, count, policy)?;
    src.truncate_stack(from);
    Ok(())
}
