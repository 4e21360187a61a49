// trafficwatch/src/config.rs
//
// Runtime configuration. Defaults mirror the tuned production values;
// everything is overridable from a JSON config file passed on the CLI.

use serde::{Deserialize, Serialize};

// ── Classification ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Rolling-window capacity per entity (values retained for statistics).
    pub window_capacity: usize,
    /// Absolute size above which any measurement is anomalous (strict >).
    pub volume_threshold_bytes: f64,
    /// Deviation-from-mean bound, scaled by the window's stddev (strict >).
    pub std_dev_multiplier: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_capacity: 500,
            volume_threshold_bytes: 800.0,
            std_dev_multiplier: 2.0,
        }
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Delay before a simulator's first tick, in seconds.
    pub initial_delay_secs: u64,
    /// Tick period is drawn once per simulator from [min, max] seconds.
    pub min_period_secs: u64,
    pub max_period_secs: u64,
    /// Synthesized sizes are drawn per tick from [min, max] bytes.
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 2,
            min_period_secs: 2,
            max_period_secs: 5,
            min_size_bytes: 100,
            max_size_bytes: 1000,
        }
    }
}

// ── Top-level ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub simulator: SimulatorConfig,
}
