//! Function relocation
//!
//! A closure is relocated by dumping its prototype to bytecode and reloading
//! it on the other side, then rebuilding its upvalue cells. The `_ENV` cell
//! is either pointed at the destination's globals or copied like any other
//! captured value, depending on the policy.

use super::{TransferErrorKind, TransferOperation};
use crate::heap::HeapObject;
use crate::object::Closure;
use crate::value::{Function, ObjRef, Value};
use crate::vm::Interpreter;
use selene_bytecode::Proto;
use std::sync::Arc;

impl<'a> TransferOperation<'a> {
    pub(super) fn copy_function(
        &mut self,
        function: Function,
    ) -> Result<Function, TransferErrorKind> {
        let source = match function {
            Function::Native(_) => return Ok(function),
            Function::Closure(r) => r,
        };
        if !self.policy.relocate_closures {
            return Err(TransferErrorKind::ClosuresDisabled);
        }
        if let Some(copy) = self.cache.get(source) {
            return Ok(Function::Closure(copy));
        }
        let src: &'a Interpreter = self.src;
        let Some(closure) = src.heap.closure(source) else {
            return Err(self.invalid(source));
        };

        let proto = self.relocate_proto(closure.proto())?;
        self.enter()?;
        let cells = (0..proto.upvalue_count())
            .map(|_| self.dst.heap.alloc_cell(Value::Nil))
            .collect::<Vec<_>>();
        let env_slot = proto.env_slot();
        let copy = self
            .dst
            .heap
            .alloc(HeapObject::Closure(Closure::new(proto, cells.clone())));
        self.cache.insert(source, copy);

        let mut recorded = Vec::new();
        let result = self.bind_upvalues(closure, copy, &cells, env_slot, &mut recorded);
        self.exit();

        if let Err(kind) = result {
            self.cache.forget(source);
            for cell in recorded {
                self.cache.forget(cell);
            }
            return Err(kind);
        }
        Ok(Function::Closure(copy))
    }

    /// Round-trip a prototype through its serialized form, once per operation
    fn relocate_proto(&mut self, proto: &Arc<Proto>) -> Result<Arc<Proto>, TransferErrorKind> {
        let key = Arc::as_ptr(proto) as usize;
        if let Some(relocated) = self.protos.get(&key) {
            return Ok(Arc::clone(relocated));
        }
        let bytes = selene_bytecode::dump(proto);
        let relocated = selene_bytecode::undump(&bytes)
            .map(Arc::new)
            .map_err(|e| TransferErrorKind::Bytecode(e.to_string()))?;
        self.protos.insert(key, Arc::clone(&relocated));
        Ok(relocated)
    }

    fn bind_upvalues(
        &mut self,
        closure: &Closure,
        copy: ObjRef,
        cells: &[ObjRef],
        env_slot: Option<usize>,
        recorded: &mut Vec<ObjRef>,
    ) -> Result<(), TransferErrorKind> {
        let src: &'a Interpreter = self.src;
        for (index, &cell) in closure.upvalues().iter().enumerate() {
            if let Some(shared) = self.cache.get(cell) {
                if let Some(target) = self.dst.heap.closure_mut(copy) {
                    target.set_upvalue(index, shared);
                }
                continue;
            }

            let target = cells[index];
            self.cache.insert(cell, target);
            recorded.push(cell);

            let value = if env_slot == Some(index) && self.policy.use_destination_globals {
                self.dst.globals()
            } else {
                self.copy(src.heap.cell(cell).unwrap_or(Value::Nil))
                    .map_err(TransferErrorKind::captured)?
            };
            self.dst.heap.set_cell(target, value);
        }
        Ok(())
    }
}
