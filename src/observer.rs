use crate::archetype::ArchetypeId;
use crate::bitmask::ComponentId;
use crate::entity::EntityId;
use crate::value::Value;

/// Which cache accepted a new entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKind {
    Transition,
    Query,
}

/// Observations fired from mutation sites, after the mutation completes.
///
/// Events carry plain data only; observers cannot reach back into the world
/// during a firing, so re-entrant mutation is impossible by construction.
#[derive(Clone, Debug)]
pub enum EcsEvent {
    /// A value write performed by a set call.
    Set {
        entity: EntityId,
        component: ComponentId,
        value: Value,
    },

    /// A completed structural move. `from` is `None` for an entity's first
    /// component; `to` is `None` when the last component was removed.
    Transition {
        entity: EntityId,
        from: Option<ArchetypeId>,
        to: Option<ArchetypeId>,
    },

    /// A transition or query cache accepted a new entry under `key`.
    Cached { kind: CacheKind, key: u128 },

    /// A cleanup pass completed.
    Cleanup,
}

impl EcsEvent {
    /// Get event type name for debugging
    pub fn event_type(&self) -> &'static str {
        match self {
            EcsEvent::Set { .. } => "Set",
            EcsEvent::Transition { .. } => "Transition",
            EcsEvent::Cached { .. } => "Cached",
            EcsEvent::Cleanup => "Cleanup",
        }
    }
}

/// Observer that reacts to world observations
pub trait Observer {
    /// Called after each observation. Fire-and-forget: return values and
    /// back-pressure do not exist here.
    fn on_event(&mut self, event: &EcsEvent);

    /// Get name for debugging
    fn name(&self) -> &str {
        "Observer"
    }
}

/// Token returned by registration, used to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Registry that manages all observers
pub struct ObserverRegistry {
    observers: Vec<(ObserverHandle, Box<dyn Observer>)>,
    next_handle: u64,
}

impl ObserverRegistry {
    /// Create new registry
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_handle: 0,
        }
    }

    /// Register observer
    pub fn register(&mut self, observer: Box<dyn Observer>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.observers.push((handle, observer));
        handle
    }

    /// Unregister observer by handle
    pub fn unregister(&mut self, handle: ObserverHandle) -> Option<Box<dyn Observer>> {
        let position = self.observers.iter().position(|(h, _)| *h == handle)?;
        Some(self.observers.remove(position).1)
    }

    /// Broadcast an observation to all observers, registration order.
    pub fn emit(&mut self, event: &EcsEvent) {
        for (_, observer) in &mut self.observers {
            observer.on_event(event);
        }
    }

    /// Get number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Clear all observers
    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Example: Log observer that prints all observations
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_event(&mut self, event: &EcsEvent) {
        match event {
            EcsEvent::Set {
                entity,
                component,
                value,
            } => println!("Set {component} on {entity:?}: {value:?}"),
            EcsEvent::Transition { entity, from, to } => {
                println!("Entity {entity:?} moved: {from:?} -> {to:?}")
            }
            EcsEvent::Cached { kind, key } => println!("Cached {kind:?} entry {key:#x}"),
            EcsEvent::Cleanup => println!("Cleanup pass completed"),
        }
    }

    fn name(&self) -> &str {
        "LoggingObserver"
    }
}

// Example: Counter observer that tracks statistics
#[derive(Default)]
pub struct StatisticsObserver {
    pub set_count: usize,
    pub transition_count: usize,
    pub cache_insertions: usize,
    pub cleanup_count: usize,
}

impl StatisticsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Observer for StatisticsObserver {
    fn on_event(&mut self, event: &EcsEvent) {
        match event {
            EcsEvent::Set { .. } => self.set_count += 1,
            EcsEvent::Transition { .. } => self.transition_count += 1,
            EcsEvent::Cached { .. } => self.cache_insertions += 1,
            EcsEvent::Cleanup => self.cleanup_count += 1,
        }
    }

    fn name(&self) -> &str {
        "StatisticsObserver"
    }
}
