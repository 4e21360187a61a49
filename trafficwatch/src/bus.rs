// trafficwatch/src/bus.rs
//
// Outbound measurement channel. In production this seat belongs to a message
// bus with at-least-once, best-effort per-key ordered delivery; in-process we
// ride a tokio mpsc channel, which gives total ordering for free.
//
// Wire format per message: `{id, entity_id, size_in_bytes, timestamp}`,
// RFC3339 timestamps. Key: entity_id (per-entity ordering).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::EmissionError;
use crate::events::Measurement;

/// Producer-side handle to the measurement channel. Simulators publish
/// through this; failures are fire-and-forget (the caller logs and moves on).
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn publish(&self, measurement: Measurement) -> Result<(), EmissionError>;
}

pub struct MeasurementBus {
    tx: mpsc::Sender<Measurement>,
    pub published: AtomicU64,
    pub dropped: AtomicU64,
}

impl MeasurementBus {
    /// Returns the producer handle plus the consumer end for the
    /// classification path.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Measurement>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MeasurementSink for MeasurementBus {
    async fn publish(&self, measurement: Measurement) -> Result<(), EmissionError> {
        debug!(
            entity_id = measurement.entity_id,
            size = measurement.size_in_bytes,
            "publishing measurement"
        );
        match self.tx.send(measurement).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(EmissionError::ChannelClosed)
            }
        }
    }
}
