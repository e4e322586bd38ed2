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

//! The archetype transition graph and its cached transition metadata.

use std::cell::Cell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::archetype::ArchetypeId;
use crate::bitmask::{transition_key, Bitmask, ComponentId};
use crate::error::{EcsError, Result};
use crate::observer::{CacheKind, EcsEvent};
use crate::world::World;

/// Arena slot of an edge inside the world.
pub type EdgeId = usize;

/// Cached metadata for one archetype pair: which component ids travel, which
/// appear, which are left behind. Derivable from the two masks alone; cached
/// so the move loop never recomputes it.
pub struct TransitionInfo {
    /// Intersection of the two masks, natural bit order.
    pub shared: SmallVec<[ComponentId; 8]>,
    /// Destination-only component ids.
    pub added: SmallVec<[ComponentId; 8]>,
    /// Source-only component ids.
    pub removed: SmallVec<[ComponentId; 8]>,
    uses: Cell<u64>,
}

impl TransitionInfo {
    /// Derive the component lists for the move from `src` to `dst`.
    pub fn between(src: &Bitmask, dst: &Bitmask) -> Self {
        Self {
            shared: src.intersection(dst).ones().collect(),
            added: dst.difference(src).ones().collect(),
            removed: src.difference(dst).ones().collect(),
            uses: Cell::new(0),
        }
    }

    pub(crate) fn record_use(&self) {
        self.uses.set(self.uses.get() + 1);
    }

    /// How many moves this record has served.
    pub fn uses(&self) -> u64 {
        self.uses.get()
    }
}

/// A directed link between two archetypes differing by exactly one
/// component: `to.mask == from.mask` with the bit for `component` set.
///
/// The edge serves both directions: it sits in `from.add_edges[component]`
/// and in `to.remove_edges[component]`. The incoming-list pointers exist
/// only so cleanup can unlink in O(1); they are never walked on the hot
/// path.
pub struct Edge {
    pub from: ArchetypeId,
    pub to: ArchetypeId,
    pub component: ComponentId,
    /// Transition metadata for the add direction (`from` → `to`).
    pub info: Rc<TransitionInfo>,
    pub(crate) prev_incoming: Option<EdgeId>,
    pub(crate) next_incoming: Option<EdgeId>,
}

impl World {
    /// Transition metadata for `src` → `dst`, from the cache or freshly
    /// derived. Fires the cache observation on insertion only.
    pub(crate) fn cached_transition(
        &mut self,
        src: &Bitmask,
        dst: &Bitmask,
    ) -> Rc<TransitionInfo> {
        let key = transition_key(src, dst);
        if let Some(info) = self.edge_cache.get(&key) {
            return Rc::clone(info);
        }

        let info = Rc::new(TransitionInfo::between(src, dst));
        self.edge_cache.insert(key, Rc::clone(&info));
        self.emit(&EcsEvent::Cached {
            kind: CacheKind::Transition,
            key,
        });
        info
    }

    /// Create the edge `from` → `to` labelled by `component`, register it in
    /// both endpoint maps, and splice it onto the head of the destination's
    /// incoming list.
    pub(crate) fn link_edge(
        &mut self,
        from: ArchetypeId,
        to: ArchetypeId,
        component: ComponentId,
    ) -> Result<EdgeId> {
        let src_mask = *self.archetype(from)?.mask();
        let dst_mask = *self.archetype(to)?.mask();
        let info = self.cached_transition(&src_mask, &dst_mask);

        let old_head = self.archetype(to)?.incoming_head;
        let edge = Edge {
            from,
            to,
            component,
            info,
            prev_incoming: None,
            next_incoming: old_head,
        };

        let id = match self.free_edges.pop() {
            Some(id) => {
                self.edges[id] = Some(edge);
                id
            }
            None => {
                self.edges.push(Some(edge));
                self.edges.len() - 1
            }
        };

        if let Some(head) = old_head {
            self.edge_mut(head)?.prev_incoming = Some(id);
        }
        self.archetype_mut(to)?.incoming_head = Some(id);
        self.archetype_mut(from)?.add_edges.insert(component, id);
        self.archetype_mut(to)?.remove_edges.insert(component, id);
        Ok(id)
    }

    /// Unlink and free every edge attached to `aid`, in both directions.
    /// Called when an empty archetype is torn down.
    pub(crate) fn teardown_edges(&mut self, aid: ArchetypeId) -> Result<()> {
        // Edges terminating here: walk the incoming list, detaching each
        // from its source archetype's add map.
        let mut cursor = match self.archetypes.get_mut(aid).and_then(|s| s.as_mut()) {
            Some(arch) => arch.incoming_head.take(),
            None => None,
        };
        while let Some(eid) = cursor {
            let edge = self.edges[eid]
                .take()
                .ok_or_else(|| EcsError::ArchetypeError(format!("dangling incoming edge {eid}")))?;
            cursor = edge.next_incoming;
            if let Some(src) = self.archetypes.get_mut(edge.from).and_then(|s| s.as_mut()) {
                src.add_edges.remove(&edge.component);
            }
            self.free_edges.push(eid);
        }

        // Edges originating here: drain the add map, unsplicing each from
        // its destination's incoming list.
        let outgoing: Vec<EdgeId> = match self.archetypes.get_mut(aid).and_then(|s| s.as_mut()) {
            Some(arch) => {
                arch.remove_edges.clear();
                arch.add_edges.drain().map(|(_, eid)| eid).collect()
            }
            None => Vec::new(),
        };
        for eid in outgoing {
            let edge = self.edges[eid]
                .take()
                .ok_or_else(|| EcsError::ArchetypeError(format!("dangling outgoing edge {eid}")))?;
            match edge.prev_incoming {
                Some(prev) => self.edge_mut(prev)?.next_incoming = edge.next_incoming,
                None => {
                    if let Some(dst) = self.archetypes.get_mut(edge.to).and_then(|s| s.as_mut()) {
                        dst.incoming_head = edge.next_incoming;
                    }
                }
            }
            if let Some(next) = edge.next_incoming {
                self.edge_mut(next)?.prev_incoming = edge.prev_incoming;
            }
            if let Some(dst) = self.archetypes.get_mut(edge.to).and_then(|s| s.as_mut()) {
                dst.remove_edges.remove(&edge.component);
            }
            self.free_edges.push(eid);
        }
        Ok(())
    }
}
