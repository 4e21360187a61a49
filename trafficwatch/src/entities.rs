// trafficwatch/src/entities.rs
//
// Entity lifecycle service. Sits between the (out-of-scope) API surface and
// the entity store + simulation registry: every create/status-change/delete
// is persisted first, then mirrored into the registry.

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::ServiceError;
use crate::events::{ActivationAction, Entity, EntityId, EntityStatus};
use crate::sim::registry::SimulationRegistry;
use crate::storage::{AnomalyStore, EntityStore};

pub struct EntityService {
    store: Arc<dyn EntityStore>,
    anomalies: Arc<dyn AnomalyStore>,
    registry: Arc<SimulationRegistry>,
}

impl EntityService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        anomalies: Arc<dyn AnomalyStore>,
        registry: Arc<SimulationRegistry>,
    ) -> Self {
        Self {
            store,
            anomalies,
            registry,
        }
    }

    /// New entities start DEACTIVATED; their simulator starts ticking
    /// immediately but stays silent until activation.
    pub async fn create(&self, name: &str, location: &str) -> Result<Entity, ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::InvalidEntity("name must not be empty".into()));
        }
        if location.is_empty() {
            return Err(ServiceError::InvalidEntity(
                "location must not be empty".into(),
            ));
        }

        let saved = self
            .store
            .save(Entity {
                id: 0,
                name: name.to_string(),
                location: location.to_string(),
                status: EntityStatus::Deactivated,
            })
            .await?;
        info!(entity_id = saved.id, name = %saved.name, location = %saved.location, "entity created");
        self.registry.upsert(&saved);
        Ok(saved)
    }

    pub async fn get(&self, id: EntityId) -> Result<Entity, ServiceError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::EntityNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Entity>, ServiceError> {
        Ok(self.store.find_all().await?)
    }

    /// Apply an activation toggle. The state-machine guard rejects a toggle
    /// into the state the entity is already in; the registry only learns of
    /// transitions that passed the guard.
    pub async fn update_status(
        &self,
        id: EntityId,
        action: ActivationAction,
    ) -> Result<Entity, ServiceError> {
        let mut entity = self.get(id).await?;

        if entity.status != action.required_status() {
            error!(entity_id = id, status = %entity.status, action = %action, "rejected activation transition");
            return Err(ServiceError::InvalidActivationTransition {
                id,
                action,
                required: action.required_status(),
            });
        }

        entity.status = action.target_status();
        let saved = self.store.save(entity).await?;
        info!(entity_id = id, status = %saved.status, "entity status updated");
        self.registry.upsert(&saved);
        Ok(saved)
    }

    /// Delete the entity, stop its simulator, and drop its anomaly history.
    pub async fn delete(&self, id: EntityId) -> Result<(), ServiceError> {
        self.get(id).await?;
        self.store.delete_by_id(id).await?;
        self.anomalies.delete_by_entity_id(id).await?;
        self.registry.remove_by_entity_id(id).await;
        info!(entity_id = id, "entity deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MeasurementBus;
    use crate::config::SimulatorConfig;
    use crate::events::{AnomalyCause, AnomalyRecord, Measurement};
    use crate::storage::memory::{InMemoryAnomalyStore, InMemoryEntityStore};

    fn service() -> (EntityService, Arc<SimulationRegistry>, Arc<InMemoryAnomalyStore>) {
        let (bus, _rx) = MeasurementBus::new(64);
        let registry = Arc::new(SimulationRegistry::new(
            Arc::new(bus),
            SimulatorConfig::default(),
        ));
        let anomalies = Arc::new(InMemoryAnomalyStore::new());
        (
            EntityService::new(
                Arc::new(InMemoryEntityStore::new()),
                anomalies.clone(),
                registry.clone(),
            ),
            registry,
            anomalies,
        )
    }

    #[tokio::test]
    async fn create_persists_and_registers_a_simulator() {
        let (svc, registry, _) = service();
        let entity = svc.create("core-net", "dublin").await.unwrap();
        assert_eq!(entity.status, EntityStatus::Deactivated);
        assert!(registry.contains(entity.id));
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_blank_fields() {
        let (svc, _, _) = service();
        assert!(matches!(
            svc.create("", "dublin").await,
            Err(ServiceError::InvalidEntity(_))
        ));
        assert!(matches!(
            svc.create("core-net", "").await,
            Err(ServiceError::InvalidEntity(_))
        ));
    }

    #[tokio::test]
    async fn activation_guard_rejects_same_state_toggles() {
        let (svc, _, _) = service();
        let entity = svc.create("core-net", "dublin").await.unwrap();

        // DEACTIVATE on an already-deactivated entity is rejected.
        let err = svc
            .update_status(entity.id, ActivationAction::Deactivate)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidActivationTransition { .. }
        ));

        let activated = svc
            .update_status(entity.id, ActivationAction::Activate)
            .await
            .unwrap();
        assert_eq!(activated.status, EntityStatus::Activated);

        // ACTIVATE twice in a row is rejected as well.
        let err = svc
            .update_status(entity.id, ActivationAction::Activate)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidActivationTransition { .. }
        ));
    }

    #[tokio::test]
    async fn update_status_of_missing_entity_is_not_found() {
        let (svc, _, _) = service();
        assert!(matches!(
            svc.update_status(404, ActivationAction::Activate).await,
            Err(ServiceError::EntityNotFound(404))
        ));
    }

    #[tokio::test]
    async fn delete_removes_entity_and_simulator() {
        let (svc, registry, _) = service();
        let entity = svc.create("core-net", "dublin").await.unwrap();
        svc.delete(entity.id).await.unwrap();
        assert!(!registry.contains(entity.id));
        assert!(matches!(
            svc.get(entity.id).await,
            Err(ServiceError::EntityNotFound(_))
        ));
        // Deleting again reports not-found rather than touching the registry.
        assert!(svc.delete(entity.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_purges_anomaly_records() {
        let (svc, _, anomalies) = service();
        let entity = svc.create("core-net", "dublin").await.unwrap();

        let measurement = Measurement::new(entity.id, 950.0);
        anomalies
            .save(AnomalyRecord::from_measurement(
                &measurement,
                AnomalyCause::VolumeThreshold,
            ))
            .await
            .unwrap();
        assert_eq!(anomalies.find_by_entity_id(entity.id).await.unwrap().len(), 1);

        svc.delete(entity.id).await.unwrap();
        assert!(anomalies.find_by_entity_id(entity.id).await.unwrap().is_empty());
    }
}
