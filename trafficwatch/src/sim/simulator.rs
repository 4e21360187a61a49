// trafficwatch/src/sim/simulator.rs
//
// One periodic measurement generator bound to a single entity.
//
// Lifecycle: STOPPED → start() → RUNNING → stop() → STOPPED (terminal; the
// registry builds a fresh instance instead of restarting). The tick period
// is drawn once at start, not re-randomized per tick. Deactivated entities
// keep ticking — only emission is gated on the status read.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::MeasurementSink;
use crate::config::SimulatorConfig;
use crate::events::{EntityStatus, Measurement};
use crate::sim::SharedEntity;

pub struct EntitySimulator {
    entity: Arc<SharedEntity>,
    sink: Arc<dyn MeasurementSink>,
    config: SimulatorConfig,
    rng: Option<StdRng>,
    handle: Option<JoinHandle<()>>,
}

impl EntitySimulator {
    /// The RNG is injected per instance so tests can seed it; the registry
    /// seeds from entropy.
    pub fn new(
        entity: Arc<SharedEntity>,
        sink: Arc<dyn MeasurementSink>,
        config: SimulatorConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            entity,
            sink,
            config,
            rng: Some(rng),
            handle: None,
        }
    }

    pub fn entity(&self) -> &Arc<SharedEntity> {
        &self.entity
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Begin ticking. First tick after `initial_delay_secs`, then every
    /// `period` seconds where period is drawn once from [min, max].
    pub fn start(&mut self) {
        let mut rng = match self.rng.take() {
            Some(rng) => rng,
            None => {
                warn!(entity_id = self.entity.id, "simulator already started");
                return;
            }
        };

        let period = rng.gen_range(self.config.min_period_secs..=self.config.max_period_secs);
        let initial_delay = Duration::from_secs(self.config.initial_delay_secs);
        let (min_size, max_size) = (self.config.min_size_bytes, self.config.max_size_bytes);
        let entity = Arc::clone(&self.entity);
        let sink = Arc::clone(&self.sink);

        info!(
            entity_id = entity.id,
            name = %entity.name,
            period_secs = period,
            "starting simulator"
        );

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = tokio::time::interval(Duration::from_secs(period));
            loop {
                ticker.tick().await;
                if entity.status() != EntityStatus::Activated {
                    continue;
                }
                let size = rng.gen_range(min_size..=max_size) as f64;
                let measurement = Measurement::new(entity.id, size);
                if let Err(e) = sink.publish(measurement).await {
                    // Fire-and-forget: the lost measurement is not retained
                    // and the timer keeps running.
                    warn!(entity_id = entity.id, error = %e, "measurement emission failed");
                }
            }
        }));
    }

    /// Cancel the timer and wait for the task to wind down. No tick fires
    /// after this returns. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            info!(entity_id = self.entity.id, "simulator stopped");
        }
    }
}
