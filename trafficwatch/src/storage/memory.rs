// trafficwatch/src/storage/memory.rs
//
// In-memory store implementations. Single-process stand-ins with the same
// interface a real key-value / document store adapter would implement.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::StorageError;
use crate::events::{AnomalyRecord, Entity, EntityId, EntitySummary};
use crate::storage::{AnomalyStore, EntityStore, SummaryStore};

const ANOMALY_PAGE: usize = 100;

// ── Entities ──────────────────────────────────────────────────────────────────

pub struct InMemoryEntityStore {
    entities: DashMap<EntityId, Entity>,
    next_id: AtomicU64,
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn find_all(&self) -> Result<Vec<Entity>, StorageError> {
        let mut all: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.id);
        Ok(all)
    }

    async fn find_by_id(&self, id: EntityId) -> Result<Option<Entity>, StorageError> {
        Ok(self.entities.get(&id).map(|e| e.clone()))
    }

    async fn save(&self, mut entity: Entity) -> Result<Entity, StorageError> {
        if entity.id == 0 {
            entity.id = self.next_id.fetch_add(1, Ordering::Relaxed);
        }
        self.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StorageError> {
        self.entities.remove(&id);
        Ok(())
    }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemorySummaryStore {
    summaries: DashMap<EntityId, EntitySummary>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All summaries, entity-id order. Demo/report helper; the trait surface
    /// stays keyed like the real store.
    pub fn all(&self) -> Vec<EntitySummary> {
        let mut all: Vec<EntitySummary> =
            self.summaries.iter().map(|s| s.value().clone()).collect();
        all.sort_by_key(|s| s.entity_id);
        all
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<EntitySummary>, StorageError> {
        Ok(self.summaries.get(&entity_id).map(|s| s.clone()))
    }

    async fn save(&self, summary: EntitySummary) -> Result<(), StorageError> {
        self.summaries.insert(summary.entity_id, summary);
        Ok(())
    }
}

// ── Anomaly records ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryAnomalyStore {
    records: DashMap<EntityId, Vec<AnomalyRecord>>,
}

impl InMemoryAnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.records.iter().map(|r| r.value().len()).sum()
    }
}

#[async_trait]
impl AnomalyStore for InMemoryAnomalyStore {
    async fn save(&self, record: AnomalyRecord) -> Result<(), StorageError> {
        self.records.entry(record.entity_id).or_default().push(record);
        Ok(())
    }

    async fn find_by_entity_id(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AnomalyRecord>, StorageError> {
        let mut recent: Vec<AnomalyRecord> = self
            .records
            .get(&entity_id)
            .map(|r| r.clone())
            .unwrap_or_default();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(ANOMALY_PAGE);
        Ok(recent)
    }

    async fn delete_by_entity_id(&self, entity_id: EntityId) -> Result<(), StorageError> {
        self.records.remove(&entity_id);
        Ok(())
    }
}
