//! EdgePHM edge node
//!
//! Runs the adaptive monitoring engine against a live or recorded stream of
//! motor readings and appends the metrics / drift streams.
//!
//! # Usage
//!
//! ```bash
//! # Tail the simulator's live readings file (default: ./live_readings.csv)
//! edge-phm --csv-tail live_readings.csv
//!
//! # Pipe the simulator straight in
//! simulation --ticks 3000 --format json | edge-phm --stdin --json
//!
//! # Replay a recorded CSV at 10x the tick rate
//! edge-phm --replay history.csv --speed 10
//! ```
//!
//! Commands: touch `recalibrate.flag` or `repair.flag` in the flag directory.
//!
//! # Environment Variables
//!
//! - `EDGE_PHM_CONFIG`: Path to the TOML configuration
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edge_phm::config::{defaults, validation, MonitorConfig};
use edge_phm::pipeline::{
    command_channel, CommandReceiver, CsvRecordSink, CsvTailSource, FlagFileWatcher,
    JsonLinesSink, ProcessingLoop, ReadingSource, RecordSink, ReplaySource, StdinSource,
};
use edge_phm::MonitorEngine;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "edge-phm")]
#[command(about = "EdgePHM adaptive health monitoring node")]
#[command(version)]
#[command(group(ArgGroup::new("input").args(["stdin", "csv_tail", "replay"])))]
struct CliArgs {
    /// Read JSON readings from stdin, one object per line
    #[arg(long)]
    stdin: bool,

    /// Tail a readings CSV that a producer keeps appending to
    #[arg(long, value_name = "PATH")]
    csv_tail: Option<PathBuf>,

    /// Replay a recorded readings CSV, then exit
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Replay speed as a multiple of the tick rate (0 = as fast as possible)
    #[arg(long, default_value_t = 0.0)]
    speed: f64,

    /// TOML configuration file
    #[arg(long, env = "EDGE_PHM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Metrics stream file (overrides output.metrics_path)
    #[arg(long, value_name = "PATH")]
    metrics_out: Option<PathBuf>,

    /// Drift stream file (overrides output.drift_path)
    #[arg(long, value_name = "PATH")]
    drift_out: Option<PathBuf>,

    /// Directory watched for command flag files (overrides output.flag_dir)
    #[arg(long, value_name = "DIR")]
    flag_dir: Option<PathBuf>,

    /// Write records as JSON lines to stdout instead of CSV files
    #[arg(long)]
    json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    Processor,
    FlagWatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Processor => write!(f, "Processor"),
            TaskName::FlagWatcher => write!(f, "FlagWatcher"),
        }
    }
}

/// Monitor tasks until all finish; a failed task cancels the rest.
///
/// The processor finishing (end of input) also stops the flag watcher.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task)) => {
                info!(task = %task, "Task completed");
                if matches!(task, TaskName::Processor) {
                    cancel_token.cancel();
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Task failed");
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "Task panicked");
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }
    info!("All tasks completed");
    Ok(())
}

// ============================================================================
// Pipeline Runner
// ============================================================================

async fn run_pipeline<S: ReadingSource>(
    mut source: S,
    config: MonitorConfig,
    sink: Box<dyn RecordSink>,
    commands: CommandReceiver,
    watcher: FlagFileWatcher,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let watcher_cancel = cancel_token.clone();
    task_set.spawn(async move {
        watcher.run(watcher_cancel).await;
        Ok(TaskName::FlagWatcher)
    });

    let proc_cancel = cancel_token.clone();
    task_set.spawn(async move {
        let engine = MonitorEngine::new(&config);
        let output = ProcessingLoop::new(engine, sink, commands, proc_cancel)
            .with_progress_every(config.engine.progress_log_every)
            .run(&mut source)
            .await;

        let snapshot = output.engine.snapshot();
        info!(
            state = %snapshot.state,
            tick = snapshot.tick,
            mu = ?snapshot.baseline.mu,
            sigma = ?snapshot.baseline.sigma,
            drift_events = snapshot.drift_events,
            "Final engine state"
        );
        if output.stats.sink_errors > 0 {
            warn!(errors = output.stats.sink_errors, "Some records could not be written");
        }
        Ok(TaskName::Processor)
    });

    run_supervisor(&mut task_set, cancel_token).await
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout may carry the record stream; logs go to stderr
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(args: &CliArgs) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MonitorConfig::load(),
    };

    if let Some(path) = &args.metrics_out {
        config.output.metrics_path = path.clone();
    }
    if let Some(path) = &args.drift_out {
        config.output.drift_path = path.clone();
    }
    if let Some(dir) = &args.flag_dir {
        config.output.flag_dir = dir.clone();
    }

    for w in validation::validate_operating_ranges(&config) {
        warn!("{}", w);
    }
    Ok(config)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!(
        calibration = config.calibration.sample_count,
        delta = config.drift.delta,
        alpha = config.smoothing.alpha,
        tick_ms = config.engine.tick_interval_ms,
        "EdgePHM edge node starting"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    let sink: Box<dyn RecordSink> = if args.json {
        Box::new(JsonLinesSink::stdout())
    } else {
        info!(
            metrics = %config.output.metrics_path.display(),
            drift = %config.output.drift_path.display(),
            "Writing CSV streams"
        );
        Box::new(CsvRecordSink::new(
            config.output.metrics_path.clone(),
            config.output.drift_path.clone(),
        ))
    };

    let (command_tx, command_rx) = command_channel();
    let watcher = FlagFileWatcher::new(
        config.output.flag_dir.clone(),
        config.engine.tick_interval(),
        command_tx,
    );
    let tick_interval = config.engine.tick_interval();

    if args.stdin {
        info!("Reading JSON readings from stdin");
        run_pipeline(StdinSource::new(), config, sink, command_rx, watcher, cancel_token).await
    } else if let Some(path) = args.replay.clone() {
        let delay = if args.speed > 0.0 {
            Duration::from_secs_f64(tick_interval.as_secs_f64() / args.speed)
        } else {
            Duration::ZERO
        };
        let source = ReplaySource::from_csv(&path, delay)?;
        info!(path = %path.display(), readings = source.remaining(), "Replaying readings");
        run_pipeline(source, config, sink, command_rx, watcher, cancel_token).await
    } else {
        let path = args
            .csv_tail
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::READINGS_PATH));
        info!(path = %path.display(), "Tailing readings file");
        let source = CsvTailSource::new(path, tick_interval);
        run_pipeline(source, config, sink, command_rx, watcher, cancel_token).await
    }
}
