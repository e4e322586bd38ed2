// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Archetype storage with row allocation and swap-removal.

use rustc_hash::FxHashMap;

use crate::bitmask::{Bitmask, ComponentId};
use crate::edge::EdgeId;
use crate::entity::EntityId;
use crate::value::Value;

/// Arena slot of an archetype inside the world.
pub type ArchetypeId = usize;

/// One component's storage across all rows of an archetype. Slots are
/// nullable so swap-removal can vacate a row without shifting.
pub type Column = Vec<Option<Value>>;

/// Change flags consumed by cache validation and diagnostics.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags(u8);

impl DirtyFlags {
    /// A row was appended.
    pub const ADDITION: DirtyFlags = DirtyFlags(1);
    /// A row was swap-removed.
    pub const REMOVAL: DirtyFlags = DirtyFlags(1 << 1);
    /// A value was overwritten in place.
    pub const UPDATE: DirtyFlags = DirtyFlags(1 << 2);

    #[inline]
    pub fn mark(&mut self, flag: DirtyFlags) {
        self.0 |= flag.0;
    }

    #[inline]
    pub fn contains(self, flag: DirtyFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn is_clear(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl std::fmt::Debug for DirtyFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut set = f.debug_set();
        if self.contains(Self::ADDITION) {
            set.entry(&"ADDITION");
        }
        if self.contains(Self::REMOVAL) {
            set.entry(&"REMOVAL");
        }
        if self.contains(Self::UPDATE) {
            set.entry(&"UPDATE");
        }
        set.finish()
    }
}

/// Columnar storage for every entity whose component set equals one mask.
///
/// Rows are dense: row `r` of every allocated column belongs to
/// `entities[r]`. Removal is swap-and-pop, so row order is deterministic
/// under a fixed mutation sequence but not otherwise meaningful.
pub struct Archetype {
    mask: Bitmask,
    entities: Vec<EntityId>,
    entity_rows: FxHashMap<u32, usize>,
    columns: FxHashMap<ComponentId, Column>,
    dirty: DirtyFlags,

    /// Outgoing edges: adding `c` to this archetype leads to `add_edges[c]`.
    pub(crate) add_edges: FxHashMap<ComponentId, EdgeId>,
    /// Incoming edges: removing `c` from this archetype leads back along
    /// `remove_edges[c]`.
    pub(crate) remove_edges: FxHashMap<ComponentId, EdgeId>,
    /// Head of the doubly-linked list of edges terminating here. Only
    /// walked during cleanup teardown.
    pub(crate) incoming_head: Option<EdgeId>,
}

impl Archetype {
    pub fn new(mask: Bitmask) -> Self {
        Self {
            mask,
            entities: Vec::new(),
            entity_rows: FxHashMap::default(),
            columns: FxHashMap::default(),
            dirty: DirtyFlags::default(),
            add_edges: FxHashMap::default(),
            remove_edges: FxHashMap::default(),
            incoming_head: None,
        }
    }

    /// Component set key of this archetype.
    pub fn mask(&self) -> &Bitmask {
        &self.mask
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All resident entities, row order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Current row of an entity, by dense index.
    pub fn row_of(&self, entity_index: u32) -> Option<usize> {
        self.entity_rows.get(&entity_index).copied()
    }

    /// Entity occupying `row`.
    pub fn entity_at(&self, row: usize) -> Option<EntityId> {
        self.entities.get(row).copied()
    }

    /// Value of component `c` at `row`. `None` covers an absent column, a
    /// vacated slot, and an out-of-range row alike.
    pub fn value(&self, c: ComponentId, row: usize) -> Option<&Value> {
        self.columns.get(&c)?.get(row)?.as_ref()
    }

    /// Accumulated change flags.
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Read and reset the change flags.
    pub fn take_dirty(&mut self) -> DirtyFlags {
        let flags = self.dirty;
        self.dirty.clear();
        flags
    }

    /// Column for `c`, lazily allocated and grown to `min_len` slots.
    ///
    /// Precondition: bit `c` is set in the archetype mask.
    pub(crate) fn column_mut(&mut self, c: ComponentId, min_len: usize) -> &mut Column {
        debug_assert!(self.mask.contains(c));
        let column = self.columns.entry(c).or_default();
        if column.len() < min_len {
            column.resize(min_len, None);
        }
        column
    }

    pub(crate) fn column(&self, c: ComponentId) -> Option<&Column> {
        self.columns.get(&c)
    }

    /// Allocate the next row for `entity` and register its row mapping.
    pub(crate) fn push_entity(&mut self, entity: EntityId) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        self.entity_rows.insert(entity.index(), row);
        self.dirty.mark(DirtyFlags::ADDITION);
        row
    }

    /// Append `entity` with one value per supplied component.
    pub(crate) fn append(
        &mut self,
        entity: EntityId,
        values: impl IntoIterator<Item = (ComponentId, Value)>,
    ) -> usize {
        let row = self.push_entity(entity);
        for (c, v) in values {
            self.column_mut(c, row + 1)[row] = Some(v);
        }
        row
    }

    /// Overwrite component `c` for `entity` in place.
    ///
    /// Precondition: bit `c` is set in the archetype mask.
    pub(crate) fn update(&mut self, entity_index: u32, c: ComponentId, value: Value) {
        let row = self.entity_rows[&entity_index];
        self.column_mut(c, row + 1)[row] = Some(value);
        self.dirty.mark(DirtyFlags::UPDATE);
    }

    /// Take the value at `(c, row)`, leaving the slot null. Absent or short
    /// columns yield `None`.
    pub(crate) fn take_slot(&mut self, c: ComponentId, row: usize) -> Option<Value> {
        self.columns.get_mut(&c)?.get_mut(row)?.take()
    }

    /// Write an optional value at `(c, row)`, growing the column as needed.
    pub(crate) fn put_slot(&mut self, c: ComponentId, row: usize, value: Option<Value>) {
        self.column_mut(c, row + 1)[row] = value;
    }

    /// Drop an entity's row bookkeeping after its column slots were already
    /// vacated, swapping the last row's entity into its place. Returns the
    /// entity that moved, if any.
    pub(crate) fn detach_row(&mut self, entity_index: u32) -> Option<EntityId> {
        let row = self.entity_rows.remove(&entity_index)?;
        self.entities.swap_remove(row);
        self.dirty.mark(DirtyFlags::REMOVAL);
        if row < self.entities.len() {
            let moved = self.entities[row];
            self.entity_rows.insert(moved.index(), row);
            Some(moved)
        } else {
            None
        }
    }

    /// Remove an entity's row, backfilling from the last row. Vacated slots
    /// are nulled so values drop immediately. Returns the entity that moved
    /// into the vacated row, if any.
    pub(crate) fn swap_remove(&mut self, entity_index: u32) -> Option<EntityId> {
        let row = self.entity_rows.remove(&entity_index)?;
        let last = self.entities.len() - 1;

        for column in self.columns.values_mut() {
            // Lazily allocated columns may be shorter than the row count.
            if last < column.len() {
                if row != last {
                    column[row] = column[last].take();
                } else {
                    column[last] = None;
                }
            } else if row < column.len() {
                column[row] = None;
            }
        }

        self.entities.swap_remove(row);
        self.dirty.mark(DirtyFlags::REMOVAL);

        if row < self.entities.len() {
            let moved = self.entities[row];
            self.entity_rows.insert(moved.index(), row);
            Some(moved)
        } else {
            None
        }
    }

    /// Component ids with an allocated column (diagnostics only).
    pub fn allocated_columns(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.columns.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::Bitmask;

    fn entity(index: u32) -> EntityId {
        EntityId::pack(index, 0)
    }

    #[test]
    fn test_append_and_lookup() {
        let mask: Bitmask = [1, 2].into_iter().collect();
        let mut arch = Archetype::new(mask);

        let row = arch.append(entity(0), [(1, Value::from(10)), (2, Value::from(20))]);
        assert_eq!(row, 0);
        assert_eq!(arch.len(), 1);
        assert_eq!(arch.row_of(0), Some(0));
        assert_eq!(arch.value(1, 0), Some(&Value::Int(10)));
        assert_eq!(arch.value(2, 0), Some(&Value::Int(20)));
        assert!(arch.dirty().contains(DirtyFlags::ADDITION));
    }

    #[test]
    fn test_swap_remove_backfills_middle_row() {
        let mask = Bitmask::single(1);
        let mut arch = Archetype::new(mask);
        for i in 0..3 {
            arch.append(entity(i), [(1, Value::from(i as i64 * 100))]);
        }

        let moved = arch.swap_remove(1);
        assert_eq!(moved, Some(entity(2)));
        assert_eq!(arch.len(), 2);
        // Last entity now occupies the vacated row with its value intact.
        assert_eq!(arch.row_of(2), Some(1));
        assert_eq!(arch.value(1, 1), Some(&Value::Int(200)));
        assert_eq!(arch.row_of(1), None);
        assert!(arch.dirty().contains(DirtyFlags::REMOVAL));
    }

    #[test]
    fn test_swap_remove_last_row_nulls_slot() {
        let mask = Bitmask::single(3);
        let mut arch = Archetype::new(mask);
        arch.append(entity(0), [(3, Value::from("a"))]);
        arch.append(entity(1), [(3, Value::from("b"))]);

        assert_eq!(arch.swap_remove(1), None);
        assert_eq!(arch.len(), 1);
        assert_eq!(arch.value(3, 1), None);
        assert_eq!(arch.value(3, 0), Some(&Value::Str("a".to_string())));
    }

    #[test]
    fn test_update_marks_update_only() {
        let mask = Bitmask::single(1);
        let mut arch = Archetype::new(mask);
        arch.append(entity(0), [(1, Value::from(1))]);
        arch.take_dirty();

        arch.update(0, 1, Value::from(2));
        assert_eq!(arch.value(1, 0), Some(&Value::Int(2)));
        let dirty = arch.take_dirty();
        assert!(dirty.contains(DirtyFlags::UPDATE));
        assert!(!dirty.contains(DirtyFlags::ADDITION));
        assert!(arch.dirty().is_clear());
    }

    #[test]
    fn test_row_entity_coherence_under_churn() {
        let mask = Bitmask::single(1);
        let mut arch = Archetype::new(mask);
        for i in 0..8 {
            arch.append(entity(i), [(1, Value::from(i as i64))]);
        }
        arch.swap_remove(0);
        arch.swap_remove(4);
        arch.swap_remove(6);

        for (row, e) in arch.entities().iter().enumerate() {
            assert_eq!(arch.row_of(e.index()), Some(row));
        }
    }
}
