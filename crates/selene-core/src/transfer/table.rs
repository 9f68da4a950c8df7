//! Table relocation

use super::{TransferErrorKind, TransferOperation};
use crate::heap::HeapObject;
use crate::object::{Table, TableKey};
use crate::value::{ObjRef, Value};
use crate::vm::Interpreter;

impl<'a> TransferOperation<'a> {
    /// Copy a table into the destination heap
    ///
    /// The copy is cached before any entry is visited, so a table reaching
    /// itself resolves to the copy under construction. Entries whose key or
    /// value cannot be transferred are dropped; so is a metatable that fails
    /// to copy.
    pub(super) fn copy_table(&mut self, source: ObjRef) -> Result<ObjRef, TransferErrorKind> {
        if let Some(copy) = self.cache.get(source) {
            return Ok(copy);
        }
        let src: &'a Interpreter = self.src;
        let Some(table) = src.heap.table(source) else {
            return Err(self.invalid(source));
        };

        self.enter()?;
        let copy = self
            .dst
            .heap
            .alloc(HeapObject::Table(Table::with_capacity(table.entry_count())));
        self.cache.insert(source, copy);
        let result = self.fill_table(table, copy);
        self.exit();
        result.map(|()| copy)
    }

    fn fill_table(&mut self, table: &Table, copy: ObjRef) -> Result<(), TransferErrorKind> {
        for (key, value) in table.iter() {
            match self.copy_entry(key, value) {
                Ok((key, value)) => {
                    if let Some(target) = self.dst.heap.table_mut(copy) {
                        target.set(key, value);
                    }
                }
                Err(kind) if kind.is_droppable() => {
                    tracing::debug!(reason = %kind, "table entry dropped during transfer");
                }
                Err(kind) => return Err(kind),
            }
        }

        if let Some(metatable) = table.metatable() {
            match self.copy_table(metatable) {
                Ok(meta) => {
                    if let Some(target) = self.dst.heap.table_mut(copy) {
                        target.set_metatable(Some(meta));
                    }
                }
                Err(kind) => {
                    tracing::debug!(reason = %kind, "metatable omitted during transfer");
                }
            }
        }
        Ok(())
    }

    fn copy_entry(
        &mut self,
        key: TableKey,
        value: Value,
    ) -> Result<(TableKey, Value), TransferErrorKind> {
        let key = self.copy(key.to_value())?;
        let value = self.copy(value)?;
        // Copies of valid keys are valid keys.
        let key =
            TableKey::from_value(key).ok_or(TransferErrorKind::Unsupported { type_name: "nil" })?;
        Ok((key, value))
    }
}
