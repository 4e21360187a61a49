// trafficwatch/src/state/window.rs
//
// Bounded rolling-statistics state store.
// DashMap = sharded concurrent HashMap — safe across tokio tasks with no
// global mutex. One RwLock per entity window, so measurements for different
// entities never serialize on each other.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::events::EntityId;

// ── Per-entity window ─────────────────────────────────────────────────────────

/// Fixed-capacity most-recent-first history of measurement sizes.
///
/// Pushing into a full window evicts the oldest (tail) value before the new
/// value lands at the head. Mean and variance are recomputed by full scan on
/// each call rather than tracked incrementally; the window is small and the
/// classifier wants statistics over the exact post-insert contents.
#[derive(Debug)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Capacity must be positive; fixed for the lifetime of the window.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be positive");
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push_front(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_back();
        }
        self.values.push_front(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Arithmetic mean of the current contents, 0 if empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum() / self.values.len() as f64
    }

    /// Population variance (divide by count) against the current mean,
    /// 0 if empty.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.values.len() as f64
    }

    pub fn std_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
}

// ── Stats store ───────────────────────────────────────────────────────────────

/// Entity id → rolling window, created lazily on first measurement.
pub struct StatsStore {
    windows: DashMap<EntityId, Arc<RwLock<RollingWindow>>>,
    capacity: usize,
}

impl StatsStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }

    /// Record one measurement size for the entity, creating its window on
    /// first use.
    pub fn record(&self, entity_id: EntityId, value: f64) {
        let window = self
            .windows
            .entry(entity_id)
            .or_insert_with(|| Arc::new(RwLock::new(RollingWindow::with_capacity(self.capacity))))
            .clone();
        window.write().push_front(value);
    }

    /// Current rolling mean, or 0.0 when the entity has no window yet.
    /// "No window" is a default, never an error.
    pub fn mean_of(&self, entity_id: EntityId) -> f64 {
        self.windows
            .get(&entity_id)
            .map(|w| w.read().mean())
            .unwrap_or(0.0)
    }

    /// Current rolling standard deviation, or 0.0 when no window exists.
    pub fn std_deviation_of(&self, entity_id: EntityId) -> f64 {
        self.windows
            .get(&entity_id)
            .map(|w| w.read().std_deviation())
            .unwrap_or(0.0)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_keeps_most_recent_values() {
        let mut w = RollingWindow::with_capacity(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push_front(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.sum(), 9.0); // 1.0 evicted
        w.push_front(5.0);
        assert_eq!(w.len(), 3);
        assert_eq!(w.sum(), 12.0); // 2.0 evicted next
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut w = RollingWindow::with_capacity(5);
        for v in 0..1000 {
            w.push_front(v as f64);
            assert!(w.len() <= 5);
        }
        // Last five pushed: 995..=999
        assert_eq!(w.sum(), (995..1000).sum::<i32>() as f64);
    }

    #[test]
    fn empty_window_statistics_are_zero() {
        let w = RollingWindow::with_capacity(10);
        assert_eq!(w.mean(), 0.0);
        assert_eq!(w.variance(), 0.0);
        assert_eq!(w.std_deviation(), 0.0);
    }

    #[test]
    fn statistics_for_known_contents() {
        let mut w = RollingWindow::with_capacity(10);
        // Most-recent-first contents end up as [10, 20, 30].
        w.push_front(30.0);
        w.push_front(20.0);
        w.push_front(10.0);
        assert_eq!(w.mean(), 20.0);
        assert!((w.variance() - 200.0 / 3.0).abs() < 1e-9);
        assert!((w.std_deviation() - 8.164_965_809_277_26).abs() < 1e-9);
    }

    #[test]
    fn variance_uses_current_mean() {
        let mut w = RollingWindow::with_capacity(3);
        for v in [2.0, 3.0, 4.0] {
            w.push_front(v);
        }
        assert_eq!(w.mean(), 3.0);
        assert!((w.variance() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn store_defaults_to_zero_for_unknown_entity() {
        let store = StatsStore::new(500);
        assert_eq!(store.mean_of(42), 0.0);
        assert_eq!(store.std_deviation_of(42), 0.0);
        assert_eq!(store.window_count(), 0);
    }

    #[test]
    fn store_creates_windows_lazily_and_independently() {
        let store = StatsStore::new(500);
        store.record(1, 100.0);
        store.record(1, 200.0);
        store.record(2, 700.0);
        assert_eq!(store.window_count(), 2);
        assert_eq!(store.mean_of(1), 150.0);
        assert_eq!(store.mean_of(2), 700.0);
        assert_eq!(store.std_deviation_of(1), 50.0);
        assert_eq!(store.std_deviation_of(2), 0.0);
    }
}
