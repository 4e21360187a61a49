// trafficwatch/src/engine/classifier.rs
//
// Dual-threshold anomaly classification.
//
// Per measurement:
//   1. record into the rolling window (the window's own newest point feeds
//      the statistics used right below)
//   2. load-or-init the entity summary, accumulate traffic + timestamp
//   3. volume check: size > threshold (strict) — takes precedence, the
//      statistical check is never evaluated for oversized measurements
//   4. statistical check: |size - mean| > stddev * multiplier (strict),
//      over post-insert statistics; stddev 0 cannot fire
//   5. persist anomaly record + summary, or summary alone
//
// Stateless across measurements apart from the stats store and the durable
// stores. Storage failures surface as ClassificationError; the step-1 window
// write is not rolled back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::errors::ClassificationError;
use crate::events::{AnomalyCause, AnomalyRecord, EntitySummary, Measurement, Verdict};
use crate::state::window::StatsStore;
use crate::storage::{AnomalyStore, SummaryStore};

pub struct AnomalyClassifier {
    config: DetectorConfig,
    stats: Arc<StatsStore>,
    summaries: Arc<dyn SummaryStore>,
    anomalies: Arc<dyn AnomalyStore>,
    pub total_processed: AtomicU64,
    pub total_anomalies: AtomicU64,
}

impl AnomalyClassifier {
    pub fn new(
        config: DetectorConfig,
        stats: Arc<StatsStore>,
        summaries: Arc<dyn SummaryStore>,
        anomalies: Arc<dyn AnomalyStore>,
    ) -> Self {
        Self {
            config,
            stats,
            summaries,
            anomalies,
            total_processed: AtomicU64::new(0),
            total_anomalies: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    pub async fn classify(
        &self,
        measurement: &Measurement,
    ) -> Result<Verdict, ClassificationError> {
        self.total_processed.fetch_add(1, Ordering::Relaxed);

        // The window write stands even if persistence below fails; the
        // rolling statistics reflect every measurement seen.
        self.stats
            .record(measurement.entity_id, measurement.size_in_bytes);

        let mut summary = self
            .summaries
            .find_by_entity_id(measurement.entity_id)
            .await?
            .unwrap_or_else(|| EntitySummary::new(measurement.entity_id, Utc::now()));

        summary.traffic_size_in_bytes += measurement.size_in_bytes;
        summary.last_updated_at = Utc::now();

        if let Some(cause) = self.detect(measurement) {
            summary.anomaly_count += 1;
            self.anomalies
                .save(AnomalyRecord::from_measurement(measurement, cause))
                .await?;
            self.summaries.save(summary).await?;
            self.total_anomalies.fetch_add(1, Ordering::Relaxed);
            info!(
                entity_id = measurement.entity_id,
                size = measurement.size_in_bytes,
                cause = %cause,
                "anomalous measurement"
            );
            return Ok(Verdict::Anomaly(cause));
        }

        summary.non_anomaly_count += 1;
        self.summaries.save(summary).await?;
        debug!(
            entity_id = measurement.entity_id,
            size = measurement.size_in_bytes,
            "measurement within thresholds"
        );
        Ok(Verdict::Normal)
    }

    fn detect(&self, measurement: &Measurement) -> Option<AnomalyCause> {
        if measurement.size_in_bytes > self.config.volume_threshold_bytes {
            return Some(AnomalyCause::VolumeThreshold);
        }

        let mean = self.stats.mean_of(measurement.entity_id);
        let stddev = self.stats.std_deviation_of(measurement.entity_id);
        // stddev == 0 makes the bound 0 and the strict comparison false.
        if (measurement.size_in_bytes - mean).abs() > stddev * self.config.std_dev_multiplier {
            return Some(AnomalyCause::StatisticalDeviation);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use crate::errors::StorageError;
    use crate::events::EntityId;
    use crate::storage::memory::{InMemoryAnomalyStore, InMemorySummaryStore};

    fn classifier_with(
        config: DetectorConfig,
    ) -> (
        AnomalyClassifier,
        Arc<InMemorySummaryStore>,
        Arc<InMemoryAnomalyStore>,
    ) {
        let summaries = Arc::new(InMemorySummaryStore::new());
        let anomalies = Arc::new(InMemoryAnomalyStore::new());
        let stats = Arc::new(StatsStore::new(config.window_capacity));
        (
            AnomalyClassifier::new(config, stats, summaries.clone(), anomalies.clone()),
            summaries,
            anomalies,
        )
    }

    #[tokio::test]
    async fn volume_check_takes_precedence() {
        let (c, _, anomalies) = classifier_with(DetectorConfig::default());
        // Flat history; 801 would also trip the statistical check, but the
        // record must name the volume cause.
        for _ in 0..50 {
            c.classify(&Measurement::new(1, 500.0)).await.unwrap();
        }
        let verdict = c.classify(&Measurement::new(1, 801.0)).await.unwrap();
        assert!(verdict.is_anomaly());
        assert_eq!(verdict, Verdict::Anomaly(AnomalyCause::VolumeThreshold));
        let records = anomalies.find_by_entity_id(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cause, AnomalyCause::VolumeThreshold);
    }

    #[tokio::test]
    async fn size_equal_to_volume_threshold_is_not_volume_anomalous() {
        let (c, _, _) = classifier_with(DetectorConfig::default());
        // Empty history: post-insert window is [800], stddev 0, so the
        // statistical check cannot fire either.
        let verdict = c.classify(&Measurement::new(1, 800.0)).await.unwrap();
        assert_eq!(verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn statistical_deviation_flags_outlier_below_volume_threshold() {
        let (c, _, anomalies) = classifier_with(DetectorConfig::default());
        for _ in 0..100 {
            c.stats.record(1, 500.0);
        }
        // Post-insert: n=101, mean ~501.5, stddev ~14.9; |650 - mean| ~148.5
        // clears 2 sigma by an order of magnitude while staying under 800.
        let verdict = c.classify(&Measurement::new(1, 650.0)).await.unwrap();
        assert_eq!(verdict, Verdict::Anomaly(AnomalyCause::StatisticalDeviation));
        let records = anomalies.find_by_entity_id(1).await.unwrap();
        assert_eq!(records[0].cause, AnomalyCause::StatisticalDeviation);
    }

    #[tokio::test]
    async fn small_deviation_is_normal() {
        let (c, _, _) = classifier_with(DetectorConfig::default());
        // Mean 500, stddev ~50 history; 550 deviates by ~50 against a ~100
        // bound.
        for _ in 0..50 {
            c.stats.record(1, 450.0);
            c.stats.record(1, 550.0);
        }
        let verdict = c.classify(&Measurement::new(1, 550.0)).await.unwrap();
        assert_eq!(verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn deviation_exactly_at_bound_is_normal() {
        let config = DetectorConfig {
            std_dev_multiplier: 1.0,
            ..DetectorConfig::default()
        };
        let (c, _, _) = classifier_with(config);
        c.stats.record(1, 0.0);
        // Post-insert window [400, 0]: mean 200, stddev 200;
        // |400 - 200| == 1.0 * 200 exactly, and the comparison is strict.
        let verdict = c.classify(&Measurement::new(1, 400.0)).await.unwrap();
        assert_eq!(verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn first_measurement_falls_through_to_normal() {
        let (c, _, _) = classifier_with(DetectorConfig::default());
        let verdict = c.classify(&Measurement::new(1, 700.0)).await.unwrap();
        assert!(!verdict.is_anomaly());
        assert_eq!(verdict, Verdict::Normal);
    }

    #[tokio::test]
    async fn summary_accumulates_exactly_one_counter_per_measurement() {
        let (c, summaries, _) = classifier_with(DetectorConfig::default());
        c.classify(&Measurement::new(1, 500.0)).await.unwrap();
        c.classify(&Measurement::new(1, 900.0)).await.unwrap();
        c.classify(&Measurement::new(1, 500.0)).await.unwrap();

        let summary = summaries.find_by_entity_id(1).await.unwrap().unwrap();
        assert_eq!(summary.traffic_size_in_bytes, 1900.0);
        assert_eq!(summary.anomaly_count, 1);
        assert_eq!(summary.non_anomaly_count, 2);
        assert_eq!(summary.anomaly_count + summary.non_anomaly_count, 3);
    }

    #[tokio::test]
    async fn anomaly_record_carries_measurement_timestamp() {
        let (c, _, anomalies) = classifier_with(DetectorConfig::default());
        let mut m = Measurement::new(3, 950.0);
        m.timestamp = m.timestamp - chrono::Duration::minutes(5);
        c.classify(&m).await.unwrap();
        let records = anomalies.find_by_entity_id(3).await.unwrap();
        assert_eq!(records[0].timestamp, m.timestamp);
        assert_eq!(records[0].entity_id, 3);
        assert_eq!(records[0].size_in_bytes, 950.0);
    }

    // ── Storage failure semantics ─────────────────────────────────────────────

    struct FailingSummaryStore;

    #[async_trait]
    impl SummaryStore for FailingSummaryStore {
        async fn find_by_entity_id(
            &self,
            _entity_id: EntityId,
        ) -> Result<Option<EntitySummary>, StorageError> {
            Err(StorageError::Unavailable("summary store down".into()))
        }

        async fn save(&self, _summary: EntitySummary) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("summary store down".into()))
        }
    }

    #[tokio::test]
    async fn storage_failure_propagates_but_window_write_stands() {
        let config = DetectorConfig::default();
        let stats = Arc::new(StatsStore::new(config.window_capacity));
        let c = AnomalyClassifier::new(
            config,
            stats.clone(),
            Arc::new(FailingSummaryStore),
            Arc::new(InMemoryAnomalyStore::new()),
        );

        let err = c.classify(&Measurement::new(1, 640.0)).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Storage(_)));
        // The rolling statistics are ahead of the durable summary by design.
        assert_eq!(stats.mean_of(1), 640.0);
    }

    // ── Cross-entity independence ─────────────────────────────────────────────

    struct LaggySummaryStore {
        inner: InMemorySummaryStore,
        slow_entity: EntityId,
        delay: Duration,
    }

    #[async_trait]
    impl SummaryStore for LaggySummaryStore {
        async fn find_by_entity_id(
            &self,
            entity_id: EntityId,
        ) -> Result<Option<EntitySummary>, StorageError> {
            if entity_id == self.slow_entity {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.find_by_entity_id(entity_id).await
        }

        async fn save(&self, summary: EntitySummary) -> Result<(), StorageError> {
            self.inner.save(summary).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_storage_for_one_entity_does_not_block_another() {
        let config = DetectorConfig::default();
        let stats = Arc::new(StatsStore::new(config.window_capacity));
        let c = Arc::new(AnomalyClassifier::new(
            config,
            stats,
            Arc::new(LaggySummaryStore {
                inner: InMemorySummaryStore::new(),
                slow_entity: 1,
                delay: Duration::from_secs(5),
            }),
            Arc::new(InMemoryAnomalyStore::new()),
        ));

        let slow = {
            let c = c.clone();
            async move {
                c.classify(&Measurement::new(1, 500.0)).await.unwrap();
                tokio::time::Instant::now()
            }
        };
        let fast = {
            let c = c.clone();
            async move {
                c.classify(&Measurement::new(2, 500.0)).await.unwrap();
                tokio::time::Instant::now()
            }
        };

        let (slow_done, fast_done) = tokio::join!(slow, fast);
        assert!(fast_done < slow_done, "entity 2 must not wait on entity 1");
    }
}
