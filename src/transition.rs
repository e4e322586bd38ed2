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

//! Structural moves of entities between archetypes.

use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeId};
use crate::bitmask::ComponentId;
use crate::edge::TransitionInfo;
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::observer::EcsEvent;
use crate::value::Value;
use crate::world::World;

/// Values written into the destination for newly added components.
pub(crate) type NewValues = SmallVec<[(ComponentId, Value); 1]>;

/// Shared-column count above which the batched path may engage.
const BATCH_THRESHOLD: usize = 3;

/// Columns staged per batch round. Stack-allocated; holds nothing between
/// moves.
const SCRATCH_COLS: usize = 8;

impl World {
    /// Move `entity` from `source` (if any) into `dest`, copying shared
    /// columns, backfilling the vacated source row, and writing the new
    /// component values. The whole move is observed as one step; the
    /// transition observation fires after it completes.
    pub(crate) fn move_entity(
        &mut self,
        entity: EntityId,
        source: Option<ArchetypeId>,
        dest: ArchetypeId,
        info: &TransitionInfo,
        new_values: NewValues,
    ) -> Result<()> {
        info.record_use();

        match source {
            Some(src_id) => {
                if src_id == dest {
                    return Err(EcsError::TransitionError(
                        "source and destination archetype are the same".to_string(),
                    ));
                }
                let (src, dst) = self.archetype_pair_mut(src_id, dest)?;
                apply_move(Some(src), dst, entity, info, new_values)?;
            }
            None => {
                let dst = self.archetype_mut(dest)?;
                apply_move(None, dst, entity, info, new_values)?;
            }
        }

        self.entity_archetype[entity.index() as usize] = Some(dest);
        self.emit(&EcsEvent::Transition {
            entity,
            from: source,
            to: Some(dest),
        });
        Ok(())
    }
}

/// The column-level move. Kept free of world bookkeeping so it can be
/// exercised against bare archetypes.
fn apply_move(
    source: Option<&mut Archetype>,
    dest: &mut Archetype,
    entity: EntityId,
    info: &TransitionInfo,
    mut new_values: NewValues,
) -> Result<()> {
    let to_row = dest.len();

    // Destination columns first, so every later write is a plain store.
    for &c in &info.shared {
        dest.column_mut(c, to_row + 1);
    }
    for &(c, _) in new_values.iter() {
        dest.column_mut(c, to_row + 1);
    }

    if let Some(src) = source {
        let from_row = src.row_of(entity.index()).ok_or_else(|| {
            EcsError::TransitionError(format!("entity {entity:?} has no row in source archetype"))
        })?;
        let last = src.len() - 1;
        let needs_backfill = from_row < last;

        let batched = info.shared.len() > BATCH_THRESHOLD
            && info
                .shared
                .first()
                .and_then(|&c| src.value(c, from_row))
                .is_some_and(Value::is_numeric);

        if batched {
            move_shared_batched(src, dest, &info.shared, from_row, last, to_row, needs_backfill);
        } else {
            for &c in &info.shared {
                let travelling = src.take_slot(c, from_row);
                if needs_backfill {
                    let tail = src.take_slot(c, last);
                    src.put_slot(c, from_row, tail);
                }
                dest.put_slot(c, to_row, travelling);
            }
        }

        // Columns that stay behind still need the vacated row backfilled.
        for &c in &info.removed {
            src.take_slot(c, from_row);
            if needs_backfill {
                let tail = src.take_slot(c, last);
                src.put_slot(c, from_row, tail);
            }
        }

        src.detach_row(entity.index());
    }

    let row = dest.push_entity(entity);
    debug_assert_eq!(row, to_row);

    for (c, v) in new_values.drain(..) {
        dest.put_slot(c, to_row, Some(v));
    }
    Ok(())
}

/// Stage shared-column moves through a fixed scratch buffer, a handful of
/// columns per round. Produces exactly the same stores as the per-column
/// loop.
fn move_shared_batched(
    src: &mut Archetype,
    dest: &mut Archetype,
    shared: &[ComponentId],
    from_row: usize,
    last: usize,
    to_row: usize,
    needs_backfill: bool,
) {
    let mut scratch: [Option<Value>; SCRATCH_COLS] = Default::default();
    for chunk in shared.chunks(SCRATCH_COLS) {
        for (i, &c) in chunk.iter().enumerate() {
            scratch[i] = src.take_slot(c, from_row);
            if needs_backfill {
                let tail = src.take_slot(c, last);
                src.put_slot(c, from_row, tail);
            }
        }
        for (i, &c) in chunk.iter().enumerate() {
            dest.put_slot(c, to_row, scratch[i].take());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::Bitmask;
    use smallvec::smallvec;

    fn entity(index: u32) -> EntityId {
        EntityId::pack(index, 0)
    }

    fn populated(mask: Bitmask, count: u32) -> Archetype {
        let mut arch = Archetype::new(mask);
        for i in 0..count {
            let values: Vec<(ComponentId, Value)> = mask
                .ones()
                .map(|c| (c, Value::from((i * 100 + c) as i64)))
                .collect();
            arch.append(entity(i), values);
        }
        arch
    }

    #[test]
    fn test_add_move_copies_shared_and_writes_new() {
        let src_mask = Bitmask::single(1);
        let dst_mask = src_mask.with(2);
        let mut src = populated(src_mask, 1);
        let mut dst = Archetype::new(dst_mask);
        let info = TransitionInfo::between(&src_mask, &dst_mask);

        apply_move(
            Some(&mut src),
            &mut dst,
            entity(0),
            &info,
            smallvec![(2, Value::from(42))],
        )
        .unwrap();

        assert_eq!(src.len(), 0);
        assert_eq!(dst.len(), 1);
        assert_eq!(dst.value(1, 0), Some(&Value::Int(1)));
        assert_eq!(dst.value(2, 0), Some(&Value::Int(42)));
        assert_eq!(dst.row_of(0), Some(0));
    }

    #[test]
    fn test_move_backfills_source_row() {
        let src_mask: Bitmask = [1, 2].into_iter().collect();
        let dst_mask = src_mask.with(3);
        let mut src = populated(src_mask, 3);
        let mut dst = Archetype::new(dst_mask);
        let info = TransitionInfo::between(&src_mask, &dst_mask);

        // Move the first entity out; the last one must take its row.
        apply_move(
            Some(&mut src),
            &mut dst,
            entity(0),
            &info,
            smallvec![(3, Value::from(7))],
        )
        .unwrap();

        assert_eq!(src.len(), 2);
        assert_eq!(src.row_of(2), Some(0));
        assert_eq!(src.value(1, 0), Some(&Value::Int(201)));
        assert_eq!(src.value(2, 0), Some(&Value::Int(202)));
        // The vacated tail row is nulled.
        assert_eq!(src.value(1, 2), None);
        assert_eq!(src.row_of(0), None);
    }

    #[test]
    fn test_remove_move_vacates_left_behind_column() {
        let src_mask: Bitmask = [1, 2].into_iter().collect();
        let dst_mask = src_mask.without(2);
        let mut src = populated(src_mask, 2);
        let mut dst = Archetype::new(dst_mask);
        let info = TransitionInfo::between(&src_mask, &dst_mask);

        apply_move(Some(&mut src), &mut dst, entity(0), &info, SmallVec::new()).unwrap();

        assert_eq!(dst.value(1, 0), Some(&Value::Int(1)));
        assert_eq!(dst.value(2, 0), None);
        // Source kept the surviving entity coherent in both columns.
        assert_eq!(src.len(), 1);
        assert_eq!(src.row_of(1), Some(0));
        assert_eq!(src.value(1, 0), Some(&Value::Int(101)));
        assert_eq!(src.value(2, 0), Some(&Value::Int(102)));
    }

    #[test]
    fn test_batched_path_moves_and_backfills() {
        // Five shared numeric columns trip the batched path; the stores must
        // match what the per-column loop would have produced.
        let wide: Bitmask = [1, 2, 3, 4, 5].into_iter().collect();
        let dst_mask = wide.with(6);
        let info = TransitionInfo::between(&wide, &dst_mask);
        assert!(info.shared.len() > BATCH_THRESHOLD);

        let mut src_a = populated(wide, 4);
        let mut dst_a = Archetype::new(dst_mask);
        apply_move(
            Some(&mut src_a),
            &mut dst_a,
            entity(1),
            &info,
            smallvec![(6, Value::from(0))],
        )
        .unwrap();

        for c in 1..=5u32 {
            assert_eq!(dst_a.value(c, 0), Some(&Value::Int((100 + c) as i64)));
        }
        assert_eq!(src_a.len(), 3);
        assert_eq!(src_a.row_of(3), Some(1));
        for c in 1..=5u32 {
            assert_eq!(src_a.value(c, 1), Some(&Value::Int((300 + c) as i64)));
        }
    }

    #[test]
    fn test_fresh_entity_has_no_source() {
        let mask = Bitmask::single(9);
        let mut dst = Archetype::new(mask);
        let info = TransitionInfo::between(&Bitmask::EMPTY, &mask);

        apply_move(
            None,
            &mut dst,
            entity(5),
            &info,
            smallvec![(9, Value::from("fresh"))],
        )
        .unwrap();

        assert_eq!(dst.len(), 1);
        assert_eq!(dst.value(9, 0), Some(&Value::Str("fresh".to_string())));
    }
}
