use ahash::AHashMap;
use std::time::Duration;

use crate::archetype::DirtyFlags;
use crate::bitmask::ComponentId;
use crate::entity::EntityId;
use crate::world::World;

/// World inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Get total entity count
    pub fn entity_count(world: &World) -> usize {
        world.entity_count()
    }

    /// Get archetype summary
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        let mut infos = Vec::new();

        for (id, archetype) in world.archetypes() {
            infos.push(ArchetypeInfo {
                id,
                components: archetype.mask().ones().collect(),
                entity_count: archetype.len(),
                dirty: archetype.dirty(),
            });
        }

        infos
    }

    /// Print world summary to console
    pub fn print_summary(world: &World) {
        println!("=== World Summary ===");
        println!("Entities: {}", world.entity_count());
        println!("Archetypes: {}", world.archetype_count());

        println!("\n=== Archetypes ===");
        for info in Self::archetype_summary(world) {
            println!(
                "Archetype {}: {} entities, components {:?}, dirty {:?}",
                info.id, info.entity_count, info.components, info.dirty
            );
        }
    }

    /// Print entity details
    pub fn print_entity(world: &World, entity: EntityId) {
        match world.archetype_of(entity) {
            Some(id) => {
                println!("=== Entity {entity:?} ===");
                println!("Archetype: {id}");
                if let Some(archetype) = world.get_archetype(id) {
                    println!("Row: {:?}", archetype.row_of(entity.index()));
                    println!("Components: {:?}", archetype.mask());
                }
            }
            None if world.is_alive(entity) => println!("Entity {entity:?} has no components"),
            None => println!("Entity {entity:?} not found"),
        }
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug)]
pub struct ArchetypeInfo {
    pub id: usize,
    pub components: Vec<ComponentId>,
    pub entity_count: usize,
    pub dirty: DirtyFlags,
}

/// Latency aggregate for one operation kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpStat {
    pub count: u64,
    pub total_us: u64,
    pub peak_us: u64,
}

impl OpStat {
    /// Average time per call in microseconds.
    pub fn avg_us(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_us as f64 / self.count as f64
        }
    }
}

/// Per-operation latency collection, active in profiling mode. Purely
/// observational.
#[derive(Default)]
pub struct OpTimings {
    stats: AHashMap<&'static str, OpStat>,
}

impl OpTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, op: &'static str, elapsed: Duration) {
        let micros = elapsed.as_micros() as u64;
        let stat = self.stats.entry(op).or_default();
        stat.count += 1;
        stat.total_us += micros;
        stat.peak_us = stat.peak_us.max(micros);
    }

    /// Copy out the collected aggregates.
    pub fn snapshot(&self) -> Vec<(&'static str, OpStat)> {
        self.stats.iter().map(|(op, stat)| (*op, *stat)).collect()
    }

    /// Reset all aggregates.
    pub fn reset(&mut self) {
        self.stats.clear();
    }

    /// Print summary to stdout
    pub fn print_summary(&self) {
        println!("Operation timings:");
        for (op, stat) in &self.stats {
            println!(
                "  - {op}: {} calls, avg {:.2} μs, peak {} μs",
                stat.count,
                stat.avg_us(),
                stat.peak_us
            );
        }
    }
}
