// trafficwatch/src/sim/mod.rs
//
// Simulation subsystem: one autonomous periodic generator per tracked
// entity, lifecycled by the registry.

pub mod registry;
pub mod simulator;

use parking_lot::RwLock;

use crate::events::{Entity, EntityId, EntityStatus};

/// Live entity handle shared between a running simulator and the registry.
/// Activation toggles land here and are visible to the simulator's next tick
/// without restarting its timer.
#[derive(Debug)]
pub struct SharedEntity {
    pub id: EntityId,
    pub name: String,
    status: RwLock<EntityStatus>,
}

impl SharedEntity {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            status: RwLock::new(entity.status),
        }
    }

    pub fn status(&self) -> EntityStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: EntityStatus) {
        *self.status.write() = status;
    }
}
