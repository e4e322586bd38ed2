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

//! Query planning and iteration over matched archetypes.
//!
//! A query composes three bitmask filters: include (all bits required),
//! exclude (no bit may be present), any (at least one bit must be present).
//! Only the first-level include scan is cached; refinements recompose the
//! matched set without touching the cache.

#[cfg(feature = "profiling")]
use tracing::info_span;

use smallvec::SmallVec;

use crate::archetype::ArchetypeId;
use crate::bitmask::{component_in_range, query_key, Bitmask, ComponentId, QueryKey};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::observer::{CacheKind, EcsEvent};
use crate::value::Value;
use crate::world::World;

/// Cached result of one first-level include scan.
///
/// Valid only while the archetype epoch it was built in is current; any
/// archetype creation or teardown invalidates it. Row-level churn does not:
/// the set of archetypes matching a fixed mask is stable across it.
pub(crate) struct CachedQuery {
    pub(crate) archetypes: Vec<ArchetypeId>,
    pub(crate) epoch: u64,
}

impl World {
    /// Build a view over all archetypes carrying every listed component.
    ///
    /// The listed components are also the projected columns, in declared
    /// order. The archetype scan is cached per include mask.
    pub fn query(&self, components: &[ComponentId]) -> Result<QueryView<'_>> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.query", components = components.len());
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let started = self.profile_start();

        if components.is_empty() {
            self.profile_end("query", started);
            return Err(EcsError::InvalidOperation(
                "query requires at least one component".to_string(),
            ));
        }

        let mut include = Bitmask::EMPTY;
        let mut projected: SmallVec<[ComponentId; 8]> = SmallVec::new();
        for &c in components {
            if !component_in_range(c) {
                if self.config.debug_mode {
                    self.profile_end("query", started);
                    return Err(EcsError::InvalidComponent);
                }
                continue;
            }
            include.insert(c);
            projected.push(c);
        }
        if include.is_empty() {
            self.profile_end("query", started);
            return Err(EcsError::QueryError(
                "no valid component in filter".to_string(),
            ));
        }

        let key = query_key(&include, &Bitmask::EMPTY);
        let archetypes = self.cached_query_archetypes(key, &include);

        self.profile_end("query", started);
        Ok(QueryView {
            world: self,
            include,
            exclude: Bitmask::EMPTY,
            any: Bitmask::EMPTY,
            components: projected,
            archetypes,
        })
    }

    /// First-level scan result from the cache, or a fresh scan of the
    /// archetype index. Stale entries are dropped and rebuilt.
    fn cached_query_archetypes(&self, key: QueryKey, include: &Bitmask) -> Vec<ArchetypeId> {
        {
            let mut cache = self.query_cache.borrow_mut();
            if let Some(entry) = cache.get(&key) {
                if entry.epoch == self.archetype_epoch {
                    return entry.archetypes.clone();
                }
                cache.remove(&key);
            }
        }

        let matched: Vec<ArchetypeId> = self
            .archetypes()
            .filter(|(_, arch)| arch.mask().is_superset(include))
            .map(|(id, _)| id)
            .collect();

        self.query_cache.borrow_mut().insert(
            key,
            CachedQuery {
                archetypes: matched.clone(),
                epoch: self.archetype_epoch,
            },
        );
        self.emit(&EcsEvent::Cached {
            kind: CacheKind::Query,
            key,
        });
        matched
    }

    /// Get query cache statistics for diagnostics
    pub fn query_cache_stats(&self) -> QueryCacheStats {
        let cache = self.query_cache.borrow();
        let total_cached_archetypes = cache.values().map(|entry| entry.archetypes.len()).sum();

        QueryCacheStats {
            num_cached_queries: cache.len(),
            total_cached_archetypes,
            total_archetypes: self.archetype_count(),
        }
    }

    /// Clear all cached query results
    pub fn clear_query_cache(&self) {
        self.query_cache.borrow_mut().clear();
    }
}

/// Statistics about the query cache
#[derive(Debug, Clone, Copy)]
pub struct QueryCacheStats {
    /// Number of unique include masks cached
    pub num_cached_queries: usize,
    /// Total number of archetype matches across all cached queries
    pub total_cached_archetypes: usize,
    /// Total number of live archetypes in the world
    pub total_archetypes: usize,
}

/// A composed filter over archetypes plus the projected component columns.
///
/// Refinements (`with`/`without`/`any`) recompose the matched set and are
/// not themselves cached.
pub struct QueryView<'w> {
    world: &'w World,
    include: Bitmask,
    exclude: Bitmask,
    any: Bitmask,
    components: SmallVec<[ComponentId; 8]>,
    archetypes: Vec<ArchetypeId>,
}

impl<'w> QueryView<'w> {
    /// Require further components without projecting them.
    pub fn with(mut self, components: &[ComponentId]) -> Result<Self> {
        for &c in components {
            if !component_in_range(c) {
                if self.world.config.debug_mode {
                    return Err(EcsError::InvalidComponent);
                }
                continue;
            }
            self.include.insert(c);
        }
        let include = self.include;
        self.retain(|mask| mask.is_superset(&include));
        Ok(self)
    }

    /// Reject archetypes carrying any of the listed components.
    pub fn without(mut self, components: &[ComponentId]) -> Result<Self> {
        for &c in components {
            if !component_in_range(c) {
                if self.world.config.debug_mode {
                    return Err(EcsError::InvalidComponent);
                }
                continue;
            }
            self.exclude.insert(c);
        }
        let exclude = self.exclude;
        self.retain(|mask| !mask.intersects(&exclude));
        Ok(self)
    }

    /// Require at least one of the listed components. Repeated calls extend
    /// the same mask, which can re-admit archetypes a narrower mask dropped,
    /// so the matched set is rebuilt from all three filters.
    pub fn any(mut self, components: &[ComponentId]) -> Result<Self> {
        for &c in components {
            if !component_in_range(c) {
                if self.world.config.debug_mode {
                    return Err(EcsError::InvalidComponent);
                }
                continue;
            }
            self.any.insert(c);
        }
        let (include, exclude, any) = (self.include, self.exclude, self.any);
        self.archetypes = self
            .world
            .archetypes()
            .filter(|(_, arch)| {
                let mask = arch.mask();
                mask.is_superset(&include) && !mask.intersects(&exclude) && mask.intersects(&any)
            })
            .map(|(id, _)| id)
            .collect();
        Ok(self)
    }

    fn retain(&mut self, keep: impl Fn(&Bitmask) -> bool) {
        let world = self.world;
        self.archetypes.retain(|&id| {
            world
                .get_archetype(id)
                .map(|arch| keep(arch.mask()))
                .unwrap_or(false)
        });
    }

    /// Matched archetype slots, insertion order.
    pub fn matched(&self) -> &[ArchetypeId] {
        &self.archetypes
    }

    /// Projected component ids, declared order.
    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Total matched rows.
    pub fn count(&self) -> usize {
        self.archetypes
            .iter()
            .filter_map(|&id| self.world.get_archetype(id))
            .map(|arch| arch.len())
            .sum()
    }

    /// Iterate `(entity, values…)` rows, archetype-major: each archetype's
    /// rows are exhausted before the next archetype starts. A projected
    /// column missing a value yields `None` in its position.
    ///
    /// The iterator owns its plan, so yielded references outlive the view
    /// itself and are bound only to the world borrow.
    pub fn view(&self) -> RowIter<'w> {
        RowIter {
            world: self.world,
            components: self.components.clone(),
            archetypes: self.archetypes.clone(),
            archetype_cursor: 0,
            row: 0,
        }
    }
}

/// One matched row: the entity plus the projected values.
pub type Row<'a> = (EntityId, SmallVec<[Option<&'a Value>; 5]>);

/// Archetype-major row iterator produced by [`QueryView::view`].
pub struct RowIter<'a> {
    world: &'a World,
    components: SmallVec<[ComponentId; 8]>,
    archetypes: Vec<ArchetypeId>,
    archetype_cursor: usize,
    row: usize,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = Row<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &aid = self.archetypes.get(self.archetype_cursor)?;
            let Some(archetype) = self.world.get_archetype(aid) else {
                self.archetype_cursor += 1;
                self.row = 0;
                continue;
            };
            if self.row >= archetype.len() {
                self.archetype_cursor += 1;
                self.row = 0;
                continue;
            }

            let row = self.row;
            self.row += 1;

            let entity = archetype.entity_at(row)?;
            let values = self
                .components
                .iter()
                .map(|&c| archetype.value(c, row))
                .collect();
            return Some((entity, values));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining: usize = self
            .archetypes
            .iter()
            .skip(self.archetype_cursor)
            .filter_map(|&id| self.world.get_archetype(id))
            .map(|arch| arch.len())
            .sum();
        (0, Some(remaining))
    }
}
