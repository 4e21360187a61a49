// trafficwatch/src/sim/registry.rs
//
// Entity id → running simulator. Owns the start/stop lifecycle and holds the
// singleton-per-entity invariant; activation toggles pass through to the
// live entity handle without touching the timer.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::bus::MeasurementSink;
use crate::config::SimulatorConfig;
use crate::errors::StorageError;
use crate::events::{Entity, EntityId};
use crate::sim::simulator::EntitySimulator;
use crate::sim::SharedEntity;
use crate::storage::EntityStore;

pub struct SimulationRegistry {
    simulators: DashMap<EntityId, EntitySimulator>,
    sink: Arc<dyn MeasurementSink>,
    config: SimulatorConfig,
}

impl SimulationRegistry {
    pub fn new(sink: Arc<dyn MeasurementSink>, config: SimulatorConfig) -> Self {
        Self {
            simulators: DashMap::new(),
            sink,
            config,
        }
    }

    /// Start a simulator for a new entity, or push the entity's status into
    /// the already-running one. Never restarts a running timer; the entry
    /// API keeps concurrent upserts for one id from double-starting.
    pub fn upsert(&self, entity: &Entity) {
        match self.simulators.entry(entity.id) {
            Entry::Occupied(slot) => {
                info!(entity_id = entity.id, status = %entity.status, "updating simulator status");
                slot.get().entity().set_status(entity.status);
            }
            Entry::Vacant(slot) => {
                info!(entity_id = entity.id, name = %entity.name, "registering simulator");
                let shared = Arc::new(SharedEntity::from_entity(entity));
                let mut simulator = EntitySimulator::new(
                    shared,
                    Arc::clone(&self.sink),
                    self.config.clone(),
                    StdRng::from_entropy(),
                );
                simulator.start();
                slot.insert(simulator);
            }
        }
    }

    /// Stop and deregister. Unknown ids are a logged no-op, not an error.
    pub async fn remove_by_entity_id(&self, entity_id: EntityId) {
        match self.simulators.remove(&entity_id) {
            Some((_, mut simulator)) => {
                simulator.stop().await;
                info!(entity_id, "simulator removed");
            }
            None => warn!(entity_id, "no simulator registered for entity"),
        }
    }

    /// Process-start reconciliation: one upsert per persisted entity.
    pub async fn reconcile(&self, store: &dyn EntityStore) -> Result<usize, StorageError> {
        let entities = store.find_all().await?;
        for entity in &entities {
            self.upsert(entity);
        }
        info!(count = entities.len(), "simulation registry reconciled");
        Ok(entities.len())
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.simulators.contains_key(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.simulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.simulators.is_empty()
    }
}
