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

//! World: central entity, archetype, and cache storage

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use ahash::AHashMap;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId};
use crate::bitmask::{
    component_in_range, ArchetypeKey, Bitmask, ComponentId, QueryKey, TransitionKey,
};
use crate::config::EcsConfig;
use crate::debug::OpTimings;
use crate::edge::{Edge, EdgeId, TransitionInfo};
use crate::entity::{EntityAllocator, EntityId};
use crate::error::{EcsError, Result};
use crate::observer::{EcsEvent, Observer, ObserverHandle, ObserverRegistry};
use crate::query::CachedQuery;
use crate::value::Value;

/// Central ECS store.
///
/// Owns the entity allocator, the archetype arena with its key index, the
/// transition edge graph, and the query cache. Single-threaded by design:
/// every operation completes synchronously and observers fire inline after
/// the mutation they describe.
pub struct World {
    pub(crate) config: EcsConfig,

    /// Entity id issue/recycle state.
    pub(crate) allocator: EntityAllocator,

    /// Current archetype of each entity, by dense index. `None` while an
    /// entity has no components.
    pub(crate) entity_archetype: Vec<Option<ArchetypeId>>,

    /// Archetype arena; cleanup vacates slots for reuse.
    pub(crate) archetypes: Vec<Option<Archetype>>,
    pub(crate) free_archetypes: Vec<ArchetypeId>,

    /// Maps component-set keys to arena slots.
    pub(crate) archetype_index: AHashMap<ArchetypeKey, ArchetypeId>,

    /// Bumped on every archetype create/destroy; query cache entries are
    /// valid only for the epoch they were built in.
    pub(crate) archetype_epoch: u64,

    /// Edge arena for the transition graph.
    pub(crate) edges: Vec<Option<Edge>>,
    pub(crate) free_edges: Vec<EdgeId>,

    /// Cached transition metadata keyed by (source, destination) masks.
    pub(crate) edge_cache: AHashMap<TransitionKey, Rc<TransitionInfo>>,

    /// First-level query results keyed by (include, exclude) masks.
    pub(crate) query_cache: RefCell<AHashMap<QueryKey, CachedQuery>>,

    /// Observers for mutation observations.
    pub(crate) observers: RefCell<ObserverRegistry>,

    /// Per-operation latency collection, active in profiling mode.
    pub(crate) timings: RefCell<OpTimings>,
}

impl World {
    /// Create a world configured from the environment.
    pub fn new() -> Self {
        Self::new_with_config(EcsConfig::from_env())
    }

    /// Create a world with explicit configuration.
    pub fn new_with_config(config: EcsConfig) -> Self {
        Self {
            config,
            allocator: EntityAllocator::new(),
            entity_archetype: Vec::new(),

            // Start with reasonable defaults to avoid resize spikes
            archetypes: Vec::with_capacity(64),
            free_archetypes: Vec::new(),
            archetype_index: AHashMap::with_capacity(64),
            archetype_epoch: 0,

            edges: Vec::with_capacity(128),
            free_edges: Vec::new(),
            edge_cache: AHashMap::with_capacity(128),

            query_cache: RefCell::new(AHashMap::with_capacity(32)),
            observers: RefCell::new(ObserverRegistry::new()),
            timings: RefCell::new(OpTimings::new()),
        }
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // ========== Entity lifecycle ==========

    /// Issue a fresh entity handle. The entity starts unassigned: it has no
    /// row anywhere until its first component is set.
    pub fn entity(&mut self) -> Result<EntityId> {
        let started = self.profile_start();
        let entity = self.allocator.allocate()?;
        let index = entity.index() as usize;
        if index >= self.entity_archetype.len() {
            self.entity_archetype.resize(index + 1, None);
        }
        self.profile_end("entity", started);
        Ok(entity)
    }

    /// Destroy an entity: clear its row, recycle its index, and bump the
    /// generation so the handle goes stale. The emptied archetype is left
    /// for [`cleanup`](World::cleanup).
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.despawn");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let started = self.profile_start();
        let index = match self.allocator.validate(entity) {
            Ok(index) => index,
            Err(err) => {
                self.profile_end("despawn", started);
                return self.user_error(err);
            }
        };

        if let Some(aid) = self.entity_archetype[index as usize] {
            self.archetype_mut(aid)?.swap_remove(index);
        }
        self.entity_archetype[index as usize] = None;
        self.allocator.release(entity);
        self.profile_end("despawn", started);
        Ok(())
    }

    /// True if the handle decodes to a live entity.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Iterate live entity handles, index order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.allocator.live_handles()
    }

    /// Arena slot of the entity's current archetype, if it has one.
    pub fn archetype_of(&self, entity: EntityId) -> Option<ArchetypeId> {
        let index = self.allocator.validate(entity).ok()?;
        self.entity_archetype[index as usize]
    }

    // ========== Set / Remove entry points ==========

    /// Write component `component` on `entity`, migrating it to the
    /// archetype with that bit set when it is not already there.
    pub fn set(
        &mut self,
        entity: EntityId,
        component: ComponentId,
        value: impl Into<Value>,
    ) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.set", component);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let started = self.profile_start();
        let result = self.set_component(entity, component, value.into());
        self.profile_end("set", started);
        result
    }

    fn set_component(&mut self, entity: EntityId, component: ComponentId, value: Value) -> Result<()> {
        if !component_in_range(component) {
            return self.user_error(EcsError::InvalidComponent);
        }
        let index = match self.allocator.validate(entity) {
            Ok(index) => index,
            Err(err) => return self.user_error(err),
        };

        let current = self.entity_archetype[index as usize];
        match current {
            // First component of a fresh entity: synthesize the single-bit
            // archetype and append directly.
            None => {
                let target = self.get_or_create_archetype(Bitmask::single(component));
                self.archetype_mut(target)?
                    .append(entity, [(component, value.clone())]);
                self.entity_archetype[index as usize] = Some(target);
                self.emit(&EcsEvent::Transition {
                    entity,
                    from: None,
                    to: Some(target),
                });
            }
            Some(aid) => {
                let mask = *self.archetype(aid)?.mask();
                if mask.contains(component) {
                    // Value update, no structural change.
                    self.archetype_mut(aid)?.update(index, component, value.clone());
                } else {
                    let cached = self.archetype(aid)?.add_edges.get(&component).copied();
                    let (dest, info) = match cached {
                        Some(eid) => {
                            let edge = self.edge(eid)?;
                            (edge.to, Rc::clone(&edge.info))
                        }
                        None => {
                            let target = self.get_or_create_archetype(mask.with(component));
                            let eid = self.link_edge(aid, target, component)?;
                            let edge = self.edge(eid)?;
                            (edge.to, Rc::clone(&edge.info))
                        }
                    };
                    self.move_entity(
                        entity,
                        Some(aid),
                        dest,
                        &info,
                        smallvec![(component, value.clone())],
                    )?;
                }
            }
        }

        self.emit(&EcsEvent::Set {
            entity,
            component,
            value,
        });
        Ok(())
    }

    /// Remove component `component` from `entity`. No-op when the entity
    /// does not have it.
    pub fn remove(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.remove", component);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let started = self.profile_start();
        let result = self.remove_component(entity, component);
        self.profile_end("remove", started);
        result
    }

    fn remove_component(&mut self, entity: EntityId, component: ComponentId) -> Result<()> {
        if !component_in_range(component) {
            return self.user_error(EcsError::InvalidComponent);
        }
        let index = match self.allocator.validate(entity) {
            Ok(index) => index,
            Err(err) => return self.user_error(err),
        };

        let Some(aid) = self.entity_archetype[index as usize] else {
            return Ok(());
        };
        let src_mask = *self.archetype(aid)?.mask();
        if !src_mask.contains(component) {
            return Ok(());
        }

        let target_mask = src_mask.without(component);
        if target_mask.is_empty() {
            // Last component: the entity goes back to unassigned.
            self.archetype_mut(aid)?.swap_remove(index);
            self.entity_archetype[index as usize] = None;
            self.emit(&EcsEvent::Transition {
                entity,
                from: Some(aid),
                to: None,
            });
            return Ok(());
        }

        let cached = self.archetype(aid)?.remove_edges.get(&component).copied();
        let dest = match cached {
            Some(eid) => self.edge(eid)?.from,
            None => {
                let target = self.get_or_create_archetype(target_mask);
                self.link_edge(target, aid, component)?;
                target
            }
        };
        let info = self.cached_transition(&src_mask, &target_mask);
        self.move_entity(entity, Some(aid), dest, &info, SmallVec::new())
    }

    // ========== Reads ==========

    /// Current value of `component` on `entity`, or `None` when absent.
    ///
    /// A stale handle is an error in debug mode and `None` otherwise.
    pub fn get(&self, entity: EntityId, component: ComponentId) -> Result<Option<&Value>> {
        if !component_in_range(component) {
            return if self.config.debug_mode {
                Err(EcsError::InvalidComponent)
            } else {
                Ok(None)
            };
        }
        let index = match self.allocator.validate(entity) {
            Ok(index) => index,
            Err(err) => {
                return if self.config.debug_mode {
                    Err(err)
                } else {
                    Ok(None)
                };
            }
        };

        let Some(aid) = self.entity_archetype[index as usize] else {
            return Ok(None);
        };
        let arch = self.archetype(aid)?;
        let row = arch.row_of(index).ok_or_else(|| {
            EcsError::ArchetypeError(format!("entity {entity:?} has no row in its archetype"))
        })?;
        Ok(arch.value(component, row))
    }

    /// True if the entity is live and its archetype carries `component`.
    pub fn has(&self, entity: EntityId, component: ComponentId) -> bool {
        if !component_in_range(component) {
            return false;
        }
        let Ok(index) = self.allocator.validate(entity) else {
            return false;
        };
        match self.entity_archetype[index as usize] {
            Some(aid) => self
                .get_archetype(aid)
                .is_some_and(|arch| arch.mask().contains(component)),
            None => false,
        }
    }

    // ========== Archetype arena ==========

    /// Archetype by arena slot.
    pub fn get_archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id).and_then(|slot| slot.as_ref())
    }

    /// Iterate live archetypes with their arena slots.
    pub fn archetypes(&self) -> impl Iterator<Item = (ArchetypeId, &Archetype)> {
        self.archetypes
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|arch| (id, arch)))
    }

    pub(crate) fn archetype(&self, id: ArchetypeId) -> Result<&Archetype> {
        self.get_archetype(id)
            .ok_or_else(|| EcsError::ArchetypeError(format!("missing archetype slot {id}")))
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> Result<&mut Archetype> {
        self.archetypes
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| EcsError::ArchetypeError(format!("missing archetype slot {id}")))
    }

    /// Distinct mutable borrows of two arena slots, split around the higher
    /// index.
    pub(crate) fn archetype_pair_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> Result<(&mut Archetype, &mut Archetype)> {
        if a == b {
            return Err(EcsError::ArchetypeError(format!(
                "aliasing archetype pair {a}"
            )));
        }
        let (first, second) = if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        };
        match (first.as_mut(), second.as_mut()) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(EcsError::ArchetypeError(format!(
                "missing archetype slot in pair ({a}, {b})"
            ))),
        }
    }

    pub(crate) fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| EcsError::ArchetypeError(format!("missing edge slot {id}")))
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge> {
        self.edges
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| EcsError::ArchetypeError(format!("missing edge slot {id}")))
    }

    /// Arena slot for the archetype with this exact mask, creating it when
    /// first needed. Creation bumps the epoch.
    pub(crate) fn get_or_create_archetype(&mut self, mask: Bitmask) -> ArchetypeId {
        let key = mask.archetype_key();
        if let Some(&id) = self.archetype_index.get(&key) {
            return id;
        }

        let archetype = Archetype::new(mask);
        let id = match self.free_archetypes.pop() {
            Some(id) => {
                self.archetypes[id] = Some(archetype);
                id
            }
            None => {
                self.archetypes.push(Some(archetype));
                self.archetypes.len() - 1
            }
        };
        self.archetype_index.insert(key, id);
        self.archetype_epoch += 1;
        id
    }

    // ========== Observers ==========

    /// Register an observer for mutation observations.
    pub fn register_observer(&mut self, observer: Box<dyn Observer>) -> ObserverHandle {
        self.observers.get_mut().register(observer)
    }

    /// Unregister an observer, returning it.
    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> Option<Box<dyn Observer>> {
        self.observers.get_mut().unregister(handle)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().observer_count()
    }

    pub(crate) fn emit(&self, event: &EcsEvent) {
        self.observers.borrow_mut().emit(event);
    }

    // ========== Maintenance ==========

    /// Tear down empty archetypes and their edges, then drop the query
    /// cache wholesale. Surfaces id-space exhaustion.
    pub fn cleanup(&mut self) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("world.cleanup");
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        let started = self.profile_start();

        let empty: Vec<ArchetypeId> = self
            .archetypes()
            .filter(|(_, arch)| arch.is_empty())
            .map(|(id, _)| id)
            .collect();

        let mut removed_keys: Vec<ArchetypeKey> = Vec::with_capacity(empty.len());
        for id in empty {
            self.teardown_edges(id)?;
            let arch = self.archetypes[id]
                .take()
                .ok_or_else(|| EcsError::ArchetypeError(format!("missing archetype slot {id}")))?;
            let key = arch.mask().archetype_key();
            self.archetype_index.remove(&key);
            removed_keys.push(key);
            self.free_archetypes.push(id);
            self.archetype_epoch += 1;
        }

        // Transition metadata follows archetype lifetime.
        if !removed_keys.is_empty() {
            self.edge_cache.retain(|key, _| {
                let src = (key >> 64) as ArchetypeKey;
                let dst = *key as ArchetypeKey;
                !removed_keys.contains(&src) && !removed_keys.contains(&dst)
            });
        }

        self.query_cache.borrow_mut().clear();

        if self.allocator.exhausted() {
            self.profile_end("cleanup", started);
            return Err(EcsError::MemoryError);
        }

        self.emit(&EcsEvent::Cleanup);
        self.profile_end("cleanup", started);
        Ok(())
    }

    /// Drop every entity, archetype, edge, and cache. Generations survive,
    /// so handles from before the clear keep failing validation.
    pub fn clear(&mut self) {
        let live: Vec<EntityId> = self.allocator.live_handles().collect();
        for entity in live {
            self.allocator.release(entity);
        }
        for slot in &mut self.entity_archetype {
            *slot = None;
        }
        self.archetypes.clear();
        self.free_archetypes.clear();
        self.archetype_index.clear();
        self.edges.clear();
        self.free_edges.clear();
        self.edge_cache.clear();
        self.query_cache.borrow_mut().clear();
        self.archetype_epoch += 1;
    }

    // ========== Diagnostics ==========

    pub fn entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Number of live archetypes.
    pub fn archetype_count(&self) -> usize {
        self.archetype_index.len()
    }

    /// Get memory usage statistics
    pub fn memory_stats(&self) -> MemoryStats {
        let entity_index_memory =
            self.entity_archetype.capacity() * std::mem::size_of::<Option<ArchetypeId>>();
        let archetype_memory = self.archetypes.capacity() * std::mem::size_of::<Option<Archetype>>();
        let column_slots = self
            .archetypes()
            .map(|(_, arch)| {
                arch.allocated_columns()
                    .filter_map(|c| arch.column(c))
                    .map(Vec::len)
                    .sum::<usize>()
            })
            .sum();

        MemoryStats {
            entity_index_memory,
            archetype_memory,
            column_slots,
        }
    }

    /// Get edge cache statistics for diagnostics
    pub fn edge_cache_stats(&self) -> EdgeCacheStats {
        EdgeCacheStats {
            cached_transitions: self.edge_cache.len(),
            live_edges: self.edges.iter().filter(|slot| slot.is_some()).count(),
        }
    }

    /// Snapshot of collected operation latencies (profiling mode only).
    pub fn op_timings(&self) -> Vec<(&'static str, crate::debug::OpStat)> {
        self.timings.borrow().snapshot()
    }

    // ========== Internals ==========

    /// Downgrade a user-input error to a silent no-op unless debug
    /// validation is on.
    fn user_error(&self, err: EcsError) -> Result<()> {
        if self.config.debug_mode {
            Err(err)
        } else {
            Ok(())
        }
    }

    pub(crate) fn profile_start(&self) -> Option<Instant> {
        self.config.profiling_mode.then(Instant::now)
    }

    pub(crate) fn profile_end(&self, op: &'static str, started: Option<Instant>) {
        if let Some(start) = started {
            self.timings.borrow_mut().record(op, start.elapsed());
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Memory statistics for the world
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub entity_index_memory: usize,
    pub archetype_memory: usize,
    /// Total allocated value slots across all columns.
    pub column_slots: usize,
}

/// Statistics about the transition cache and edge graph
#[derive(Debug, Clone, Copy)]
pub struct EdgeCacheStats {
    /// Cached transition records.
    pub cached_transitions: usize,
    /// Edges currently linked in the graph.
    pub live_edges: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new_with_config(EcsConfig::default().with_debug(true))
    }

    #[test]
    fn test_set_then_get() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, "A")?;

        assert_eq!(world.get(e, 1)?, Some(&Value::Str("A".to_string())));
        assert_eq!(world.get(e, 2)?, None);
        assert!(world.has(e, 1));
        assert!(!world.has(e, 2));
        Ok(())
    }

    #[test]
    fn test_update_in_place_keeps_archetype() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 10)?;
        let before = world.archetype_of(e);
        let archetype_count = world.archetype_count();

        world.set(e, 1, 11)?;
        assert_eq!(world.archetype_of(e), before);
        assert_eq!(world.archetype_count(), archetype_count);
        assert_eq!(world.get(e, 1)?, Some(&Value::Int(11)));
        Ok(())
    }

    #[test]
    fn test_migration_on_second_component() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 10)?;
        let first = world.archetype_of(e).unwrap();

        world.set(e, 2, 20)?;
        let second = world.archetype_of(e).unwrap();
        assert_ne!(first, second);

        let mask = world.get_archetype(second).unwrap().mask();
        assert!(mask.contains(1) && mask.contains(2));
        assert_eq!(world.get(e, 1)?, Some(&Value::Int(10)));
        assert_eq!(world.get(e, 2)?, Some(&Value::Int(20)));

        // The old single-component archetype is now empty but still present.
        assert_eq!(world.get_archetype(first).unwrap().len(), 0);
        Ok(())
    }

    #[test]
    fn test_remove_returns_to_prior_archetype() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 10)?;
        let single = world.archetype_of(e).unwrap();
        world.set(e, 2, 20)?;

        world.remove(e, 2)?;
        assert_eq!(world.archetype_of(e), Some(single));
        assert_eq!(world.get(e, 2)?, None);
        assert_eq!(world.get(e, 1)?, Some(&Value::Int(10)));

        // Removing an absent component is a no-op.
        world.remove(e, 5)?;
        assert_eq!(world.archetype_of(e), Some(single));
        Ok(())
    }

    #[test]
    fn test_remove_last_component_unassigns() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 3, true)?;
        world.remove(e, 3)?;

        assert!(world.is_alive(e));
        assert_eq!(world.archetype_of(e), None);
        assert_eq!(world.get(e, 3)?, None);
        Ok(())
    }

    #[test]
    fn test_despawn_invalidates_handle() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 1)?;
        world.despawn(e)?;

        assert!(!world.is_alive(e));
        assert!(matches!(world.get(e, 1), Err(EcsError::InvalidEntity)));
        assert!(matches!(world.despawn(e), Err(EcsError::InvalidEntity)));
        Ok(())
    }

    #[test]
    fn test_silent_mode_noops_on_stale_handle() -> Result<()> {
        let mut world = World::new_with_config(EcsConfig::default().with_debug(false));
        let e = world.entity()?;
        world.despawn(e)?;

        // All user-input failures degrade to no-ops.
        world.despawn(e)?;
        world.set(e, 1, 5)?;
        world.set(e, 0, 5)?;
        assert_eq!(world.get(e, 1)?, None);
        Ok(())
    }

    #[test]
    fn test_component_range_checked_in_debug() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        assert!(matches!(
            world.set(e, 0, 1),
            Err(EcsError::InvalidComponent)
        ));
        assert!(matches!(
            world.set(e, crate::bitmask::MAX_COMPONENT_ID + 1, 1),
            Err(EcsError::InvalidComponent)
        ));
        world.set(e, crate::bitmask::MAX_COMPONENT_ID, 1)?;
        Ok(())
    }

    #[test]
    fn test_add_edge_reused_across_entities() -> Result<()> {
        let mut world = world();
        let e1 = world.entity()?;
        world.set(e1, 1, 1)?;
        world.set(e1, 2, 2)?;
        let stats = world.edge_cache_stats();

        let e2 = world.entity()?;
        world.set(e2, 1, 1)?;
        world.set(e2, 2, 2)?;

        // Same path, no new edges or cached transitions.
        let after = world.edge_cache_stats();
        assert_eq!(stats.live_edges, after.live_edges);
        assert_eq!(stats.cached_transitions, after.cached_transitions);
        Ok(())
    }

    #[test]
    fn test_cleanup_reclaims_empty_archetypes() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 1)?;
        world.set(e, 2, 2)?;
        assert_eq!(world.archetype_count(), 2);

        world.cleanup()?;
        // The vacated {1} archetype is gone; the occupied {1, 2} remains.
        assert_eq!(world.archetype_count(), 1);
        let remaining = world.archetype_of(e).unwrap();
        assert!(world.get_archetype(remaining).is_some());

        // The entity is untouched.
        assert_eq!(world.get(e, 1)?, Some(&Value::Int(1)));
        Ok(())
    }

    #[test]
    fn test_clear_resets_world_but_stales_handles() -> Result<()> {
        let mut world = world();
        let e = world.entity()?;
        world.set(e, 1, 1)?;
        world.clear();

        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.archetype_count(), 0);
        assert!(!world.is_alive(e));

        let e2 = world.entity()?;
        assert_eq!(e2.index(), e.index());
        assert_ne!(e2.generation(), e.generation());
        Ok(())
    }
}
