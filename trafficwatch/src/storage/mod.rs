// trafficwatch/src/storage/mod.rs
//
// External collaborator interfaces. The core only needs simple keyed
// get/put/delete semantics; production wires these to a real document store,
// the in-memory implementations back tests and the demo pipeline.

pub mod memory;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::events::{AnomalyRecord, Entity, EntityId, EntitySummary};

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Entity>, StorageError>;

    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity>, StorageError>;

    /// Persist the entity. An entity with id 0 is treated as new and gets a
    /// store-assigned identifier; the saved entity is returned either way.
    async fn save(&self, entity: Entity) -> Result<Entity, StorageError>;

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<EntitySummary>, StorageError>;

    async fn save(&self, summary: EntitySummary) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AnomalyStore: Send + Sync {
    async fn save(&self, record: AnomalyRecord) -> Result<(), StorageError>;

    /// Most recent first, capped at 100 records.
    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AnomalyRecord>, StorageError>;

    async fn delete_by_entity_id(&self, entity_id: EntityId) -> Result<(), StorageError>;
}
