// trafficwatch/src/events.rs
//
// Shared domain types flowing through trafficwatch.
// The simulation side produces Measurements; the classification side turns
// them into verdicts, anomaly records, and per-entity summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity identifiers are store-assigned (0 = not yet persisted).
pub type EntityId = u64;

// ── Entities ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Activated,
    Deactivated,
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activated => write!(f, "ACTIVATED"),
            Self::Deactivated => write!(f, "DEACTIVATED"),
        }
    }
}

/// A simulated traffic source. Persisted in the entity store; the simulation
/// subsystem reads its status to gate emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub location: String,
    pub status: EntityStatus,
}

/// Status-toggle request against one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationAction {
    Activate,
    Deactivate,
}

impl ActivationAction {
    /// Status the entity ends up in when the action is applied.
    pub fn target_status(self) -> EntityStatus {
        match self {
            Self::Activate => EntityStatus::Activated,
            Self::Deactivate => EntityStatus::Deactivated,
        }
    }

    /// Status the entity must currently hold for the action to be legal.
    pub fn required_status(self) -> EntityStatus {
        match self {
            Self::Activate => EntityStatus::Deactivated,
            Self::Deactivate => EntityStatus::Activated,
        }
    }
}

impl std::fmt::Display for ActivationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Activate => write!(f, "ACTIVATE"),
            Self::Deactivate => write!(f, "DEACTIVATE"),
        }
    }
}

// ── Measurements ──────────────────────────────────────────────────────────────

/// One traffic-size data point for an entity. Immutable once created.
/// Wire form: `{id, entity_id, size_in_bytes, timestamp}` with RFC3339 times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub size_in_bytes: f64,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(entity_id: EntityId, size_in_bytes: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id,
            size_in_bytes,
            timestamp: Utc::now(),
        }
    }
}

// ── Classification outcomes ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyCause {
    /// Size exceeded the fixed volume threshold outright.
    VolumeThreshold,
    /// Size deviated from the rolling mean by more than stddev * multiplier.
    StatisticalDeviation,
}

impl std::fmt::Display for AnomalyCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VolumeThreshold => write!(f, "volume_threshold"),
            Self::StatisticalDeviation => write!(f, "statistical_deviation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Anomaly(AnomalyCause),
    Normal,
}

impl Verdict {
    pub fn is_anomaly(self) -> bool {
        matches!(self, Self::Anomaly(_))
    }
}

/// Durable record of one anomalous measurement. Carries the measurement's
/// original timestamp, not classification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub size_in_bytes: f64,
    pub cause: AnomalyCause,
    pub timestamp: DateTime<Utc>,
}

impl AnomalyRecord {
    pub fn from_measurement(m: &Measurement, cause: AnomalyCause) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: m.entity_id,
            size_in_bytes: m.size_in_bytes,
            cause,
            timestamp: m.timestamp,
        }
    }
}

// ── Summaries ─────────────────────────────────────────────────────────────────

/// Per-entity running totals. Every classified measurement bumps exactly one
/// of the two counters and always grows the traffic accumulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: EntityId,
    pub traffic_size_in_bytes: f64,
    pub anomaly_count: u64,
    pub non_anomaly_count: u64,
    pub last_updated_at: DateTime<Utc>,
}

impl EntitySummary {
    pub fn new(entity_id: EntityId, now: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            traffic_size_in_bytes: 0.0,
            anomaly_count: 0,
            non_anomaly_count: 0,
            last_updated_at: now,
        }
    }
}
