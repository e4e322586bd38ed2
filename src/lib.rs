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

//! Mask ECS - bitmask-indexed archetype Entity Component System
//!
//! A data-oriented store mapping entities to dynamically-typed components.
//! Entities migrate between columnar archetypes as their component set
//! changes, along a cached transition graph; queries filter archetypes by
//! include/exclude/any bitmasks and iterate rows archetype-major.

pub mod archetype;
pub mod bitmask;
pub mod config;
pub mod debug;
pub mod edge;
pub mod entity;
pub mod error;
pub mod observer;
pub mod prelude;
pub mod query;
pub mod value;
pub mod world;

mod transition;

// Re-exports for convenience
pub use archetype::{Archetype, ArchetypeId, DirtyFlags};
pub use bitmask::{Bitmask, ComponentId, MAX_COMPONENT_ID};
pub use config::EcsConfig;
pub use edge::{Edge, TransitionInfo};
pub use entity::{EntityAllocator, EntityId};
pub use error::{EcsError, Result};
pub use observer::{CacheKind, EcsEvent, Observer, ObserverHandle};
pub use query::{QueryView, Row, RowIter};
pub use value::Value;
pub use world::World;

#[cfg(test)]
mod tests;
