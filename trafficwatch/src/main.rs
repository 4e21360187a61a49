// trafficwatch/src/main.rs
//
// trafficwatch — per-entity traffic simulation + online anomaly detection.
//
// Three operational modes:
//   simulate — run a fleet of per-entity generators and classify their
//              measurements over the in-process bus (default)
//   replay   — replay a captured JSONL measurement log at scaled speed
//   tail     — follow a live JSONL measurement feed
//
// Usage:
//   trafficwatch --mode simulate --entities fleet.json
//   trafficwatch --mode replay --path captured.jsonl --speed 10.0
//   trafficwatch --mode tail --path /var/log/traffic/feed.jsonl

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod bus;
mod config;
mod engine;
mod entities;
mod errors;
mod events;
mod sim;
mod state;
mod storage;

use bus::MeasurementBus;
use config::AppConfig;
use engine::classifier::AnomalyClassifier;
use entities::EntityService;
use events::{ActivationAction, Measurement};
use sim::registry::SimulationRegistry;
use state::window::StatsStore;
use storage::memory::{InMemoryAnomalyStore, InMemoryEntityStore, InMemorySummaryStore};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "trafficwatch",
    about   = "Per-entity traffic simulation and online anomaly detection",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "simulate")]
    mode: Mode,

    #[arg(long, help = "JSON entity seed file (simulate mode)")]
    entities: Option<PathBuf>,

    #[arg(long, default_value = "4", help = "Demo fleet size when no seed file is given")]
    fleet: usize,

    #[arg(long, default_value = "/tmp/trafficwatch_feed.jsonl",
          help = "JSONL measurement path (tail/replay modes)")]
    path: PathBuf,

    #[arg(long, default_value = "1.0", help = "Replay speed multiplier")]
    speed: f64,

    #[arg(long, help = "JSON config file (thresholds, periods)")]
    config: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Simulate, // generator fleet + classifier over the in-process bus
    Replay,   // replay a static JSONL capture at scaled speed
    Tail,     // follow a live JSONL feed
}

/// Seed entry for simulate mode.
#[derive(Debug, Deserialize)]
struct SeedEntity {
    name: String,
    location: String,
    #[serde(default)]
    activated: bool,
}

// ── Wiring ────────────────────────────────────────────────────────────────────

struct Pipeline {
    classifier: Arc<AnomalyClassifier>,
    summaries: Arc<InMemorySummaryStore>,
    anomalies: Arc<InMemoryAnomalyStore>,
}

impl Pipeline {
    fn new(config: &AppConfig) -> Self {
        let summaries = Arc::new(InMemorySummaryStore::new());
        let anomalies = Arc::new(InMemoryAnomalyStore::new());
        let stats = Arc::new(StatsStore::new(config.detector.window_capacity));
        let classifier = Arc::new(AnomalyClassifier::new(
            config.detector.clone(),
            stats,
            summaries.clone(),
            anomalies.clone(),
        ));
        Self {
            classifier,
            summaries,
            anomalies,
        }
    }

    async fn process(&self, measurement: Measurement) {
        if let Err(e) = self.classifier.classify(&measurement).await {
            error!(entity_id = measurement.entity_id, error = %e, "classification failed");
        }
    }
}

async fn print_stats_loop(pipeline: Arc<Pipeline>, registry: Option<Arc<SimulationRegistry>>, start: Instant) {
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
        let processed = pipeline.classifier.total_processed.load(Ordering::Relaxed);
        let anomalies = pipeline.classifier.total_anomalies.load(Ordering::Relaxed);
        info!(
            uptime_secs = start.elapsed().as_secs(),
            processed,
            anomalies,
            windows = pipeline.classifier.stats().window_count(),
            simulators = registry.as_ref().map(|r| r.len()).unwrap_or(0),
            "pipeline stats"
        );
    }
}

// ── Modes ─────────────────────────────────────────────────────────────────────

async fn run_simulate(cli: &Cli, config: AppConfig) -> Result<()> {
    let (bus, mut rx) = MeasurementBus::new(16_384);
    let entity_store = Arc::new(InMemoryEntityStore::new());
    let registry = Arc::new(SimulationRegistry::new(
        Arc::new(bus),
        config.simulator.clone(),
    ));
    let pipeline = Arc::new(Pipeline::new(&config));
    let service = EntityService::new(
        entity_store.clone(),
        pipeline.anomalies.clone(),
        registry.clone(),
    );

    // Process-start reconciliation against the persisted entity set. Empty
    // here unless a prior run shared the store; still exercised so that the
    // startup path matches production.
    registry.reconcile(entity_store.as_ref()).await?;

    let seeds = load_seed_entities(cli)?;
    for seed in seeds {
        let entity = service.create(&seed.name, &seed.location).await?;
        if seed.activated {
            service
                .update_status(entity.id, ActivationAction::Activate)
                .await?;
        }
    }

    info!(simulators = registry.len(), "simulation fleet running");

    let consumer = pipeline.clone();
    tokio::spawn(async move {
        while let Some(measurement) = rx.recv().await {
            let p = Arc::clone(&consumer);
            tokio::spawn(async move { p.process(measurement).await });
        }
    });

    tokio::spawn(print_stats_loop(
        pipeline.clone(),
        Some(registry.clone()),
        Instant::now(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutting down simulation fleet");
    for entity in service.list().await? {
        registry.remove_by_entity_id(entity.id).await;
    }
    print_final_report(&pipeline);
    Ok(())
}

fn load_seed_entities(cli: &Cli) -> Result<Vec<SeedEntity>> {
    if let Some(path) = &cli.entities {
        let raw = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&raw)?);
    }
    // Demo fleet: all activated so the pipeline has traffic immediately.
    Ok((1..=cli.fleet)
        .map(|i| SeedEntity {
            name: format!("sim-net-{i:02}"),
            location: format!("site-{i:02}"),
            activated: true,
        })
        .collect())
}

async fn run_replay(cli: &Cli, config: AppConfig) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(&config));
    let content = tokio::fs::read_to_string(&cli.path).await?;

    let mut measurements: Vec<Measurement> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Measurement>(line) {
            Ok(m) => measurements.push(m),
            Err(e) => warn!("parse error: {}", e),
        }
    }
    if measurements.is_empty() {
        warn!("no measurements in {}", cli.path.display());
        return Ok(());
    }
    measurements.sort_by_key(|m| m.timestamp);

    let base_ts = measurements[0].timestamp;
    let base_wall = Instant::now();
    for measurement in measurements {
        let offset_ms = (measurement.timestamp - base_ts).num_milliseconds() as f64;
        let target = base_wall + std::time::Duration::from_secs_f64(offset_ms / cli.speed / 1000.0);
        let now = Instant::now();
        if target > now {
            tokio::time::sleep(target - now).await;
        }
        pipeline.process(measurement).await;
    }

    print_final_report(&pipeline);
    Ok(())
}

async fn run_tail(cli: &Cli, config: AppConfig) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(&config));
    tokio::spawn(print_stats_loop(pipeline.clone(), None, Instant::now()));

    let file = tokio::fs::File::open(&cli.path).await?;
    let mut lines = BufReader::new(file).lines();
    while lines.next_line().await?.is_some() {} // consume existing content

    info!("tailing {}", cli.path.display());
    loop {
        match lines.next_line().await? {
            Some(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Measurement>(line) {
                    Ok(m) => pipeline.process(m).await,
                    Err(e) => warn!("parse error: {}", e),
                }
            }
            None => tokio::time::sleep(tokio::time::Duration::from_millis(50)).await,
        }
    }
}

fn print_final_report(pipeline: &Pipeline) {
    let processed = pipeline.classifier.total_processed.load(Ordering::Relaxed);
    let anomalies = pipeline.classifier.total_anomalies.load(Ordering::Relaxed);
    info!(
        processed,
        anomalies,
        anomaly_records = pipeline.anomalies.total(),
        "final classification report"
    );
    // Surface per-entity summaries for everything we saw.
    for summary in pipeline.summaries.all() {
        info!(
            entity_id = summary.entity_id,
            traffic_bytes = summary.traffic_size_in_bytes,
            anomalies = summary.anomaly_count,
            normal = summary.non_anomaly_count,
            "entity summary"
        );
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("trafficwatch=info".parse()?),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let config: AppConfig = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => AppConfig::default(),
    };

    match cli.mode {
        Mode::Simulate => run_simulate(&cli, config).await,
        Mode::Replay => run_replay(&cli, config).await,
        Mode::Tail => run_tail(&cli, config).await,
    }
}
