// trafficwatch/src/errors.rs
//
// Error taxonomy. Library layers return typed errors; the binary folds them
// into anyhow at the top.

use thiserror::Error;

use crate::events::{ActivationAction, EntityId, EntityStatus};

/// Backing-store failure (entity / summary / anomaly store). Never retried
/// inside the core; retry policy belongs to the collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Classification failed after the rolling window was already updated.
/// The window write is not rolled back; rolling statistics reflect every
/// measurement seen whether or not persistence succeeded.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classification storage failure: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("entity {id} must have status {required} to {action} it")]
    InvalidActivationTransition {
        id: EntityId,
        action: ActivationAction,
        required: EntityStatus,
    },

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A simulator could not hand a measurement to the outbound channel.
/// Logged as a warning at the emission site; never stops the timer.
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("measurement channel closed")]
    ChannelClosed,
}
