//! dispatch-worker — long-running dispatch loop.
//!
//! Every tick the engine decides whether the current minute is an expected
//! dispatch slot and, if so, validates the latest snapshot and delivers it.
//! A slower recovery sweep back-fills slots missed while the process was
//! down, and the history file is pruned on the same cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};

use mission_calendar::{HolidayProvider, HttpRegistry};
use mission_core::{load_dotenv, Config};
use mission_engine::{
    DispatchDecisionEngine, DispatchRequest, DispatchSink, FileSnapshotSource, SinkError,
};
use mission_history::SendHistoryStore;
use mission_schedule::TimeWindowScheduler;
use mission_validator::{CrossCheckLimits, DataValidator, FieldLimits};

// ── CLI ─────────────────────────────────────────────────────────────

/// Mission dispatch worker — holiday-aware scheduling and delivery.
#[derive(Parser, Debug)]
#[command(name = "dispatch-worker", version, about)]
struct Cli {
    /// Tick interval in seconds. Must be 60 or less so no slot minute is
    /// skipped over.
    #[arg(long, env = "DISPATCH_TICK_SECS", default_value_t = 30)]
    tick_secs: u64,

    /// Recovery sweep interval in seconds.
    #[arg(long, env = "DISPATCH_RECOVERY_INTERVAL_SECS", default_value_t = 600)]
    recovery_interval_secs: u64,

    /// Path to the collector's latest snapshot file.
    #[arg(long, env = "SNAPSHOT_PATH", default_value = "data/mission-snapshot.json")]
    snapshot_path: String,
}

// ── Sink ────────────────────────────────────────────────────────────

/// Stand-in channel adapter: logs what a real adapter would deliver.
/// Production deployments swap in a concrete [`DispatchSink`].
struct LogSink;

#[async_trait::async_trait]
impl DispatchSink for LogSink {
    async fn deliver(&self, request: &DispatchRequest) -> Result<(), SinkError> {
        info!(
            slot = %request.target_minute,
            kind = ?request.slot_kind,
            message_id = %request.message_id,
            completed = request.snapshot.total_completed,
            "delivering mission dashboard"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if cli.tick_secs == 0 || cli.tick_secs > 60 {
        anyhow::bail!(
            "tick interval must be between 1 and 60 seconds, got {}",
            cli.tick_secs
        );
    }

    let registry = HttpRegistry::new(&config.registry)
        .map_err(|e| anyhow::anyhow!("registry client init failed: {e}"))?;
    let provider = Arc::new(HolidayProvider::new(Arc::new(registry)));

    let history = Arc::new(SendHistoryStore::open(&config.history.path)?);
    info!(path = %config.history.path.display(), "send history opened");

    let validator = DataValidator::new(
        config.validator.freshness_max_minutes,
        FieldLimits::default(),
        CrossCheckLimits::default(),
    );

    let engine = DispatchDecisionEngine::new(
        TimeWindowScheduler::with_defaults(),
        provider,
        history.clone(),
        validator,
        Arc::new(LogSink),
        Arc::new(FileSnapshotSource::new(&cli.snapshot_path)),
    );

    let lookback = chrono::Duration::minutes(config.history.recovery_lookback_minutes);
    let retention = chrono::Duration::hours(config.history.retention_hours);

    let mut tick = tokio::time::interval(Duration::from_secs(cli.tick_secs));
    let mut recovery = tokio::time::interval(Duration::from_secs(cli.recovery_interval_secs));

    info!(
        tick_secs = cli.tick_secs,
        recovery_interval_secs = cli.recovery_interval_secs,
        lookback_minutes = config.history.recovery_lookback_minutes,
        "dispatch-worker starting"
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Local::now().naive_local();
                let outcome = engine.tick(now).await;
                if outcome.is_dispatched() {
                    info!(outcome = ?outcome, "tick dispatched");
                }
            }
            _ = recovery.tick() => {
                let now = Local::now().naive_local();
                let report = engine.run_recovery(now, lookback).await;
                if report.examined > 0 {
                    info!(
                        examined = report.examined,
                        recovered = report.recovered,
                        "recovery sweep finished"
                    );
                }
                match history.prune_older_than(retention, now) {
                    Ok(pruned) if pruned > 0 => info!(pruned, "pruned old send records"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "history prune failed"),
                }
                let status = engine.status(now).await;
                info!(
                    window = %status.current_window,
                    next_slot = %status.next_expected_slot,
                    samples = status.samples,
                    "engine status"
                );
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for shutdown signal");
                }
                info!("dispatch-worker shutting down");
                break;
            }
        }
    }

    Ok(())
}
