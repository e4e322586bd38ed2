//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use mask_ecs::prelude::*;
//! ```

pub use crate::bitmask::{Bitmask, ComponentId};
pub use crate::config::EcsConfig;
pub use crate::debug::WorldInspector;
pub use crate::entity::EntityId;
pub use crate::error::{EcsError, Result};
pub use crate::observer::{EcsEvent, Observer};
pub use crate::query::QueryView;
pub use crate::value::Value;
pub use crate::world::World;
