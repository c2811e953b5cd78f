//! Tick-driven processing loop shared by every input mode.
//!
//! One iteration per source event: process the reading, write its records,
//! then apply the commands raised since the previous processed tick. Pacing
//! belongs to the source; the loop itself never sleeps.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::CommandReceiver;
use super::sink::RecordSink;
use super::source::{ReadingEvent, ReadingSource};
use crate::engine::{MonitorEngine, TickOutcome};

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub readings_processed: u64,
    pub invalid_readings: u64,
    pub pending_polls: u64,
    pub metrics_written: u64,
    pub drift_events: u64,
    pub commands_applied: u64,
    pub sink_errors: u64,
}

/// What the loop hands back after it stops.
pub struct LoopOutput<K> {
    pub stats: LoopStats,
    pub engine: MonitorEngine,
    pub sink: K,
}

/// Owns the engine, the output sink and the command receiver for one run.
pub struct ProcessingLoop<K: RecordSink> {
    engine: MonitorEngine,
    sink: K,
    commands: CommandReceiver,
    cancel_token: CancellationToken,
    progress_every: u64,
}

impl<K: RecordSink> ProcessingLoop<K> {
    pub fn new(
        engine: MonitorEngine,
        sink: K,
        commands: CommandReceiver,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            sink,
            commands,
            cancel_token,
            progress_every: crate::config::defaults::PROGRESS_LOG_EVERY,
        }
    }

    /// Log a progress line every `n` processed readings (0 disables).
    pub fn with_progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    /// Run until the source is exhausted, fails, or the token is cancelled.
    pub async fn run<S: ReadingSource>(mut self, source: &mut S) -> LoopOutput<K> {
        let mut stats = LoopStats::default();

        info!(source = source.source_name(), "Processing readings");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = source.next_reading() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!(error = %e, "Reading source failed");
                            break;
                        }
                    }
                }
            };

            let reading = match event {
                ReadingEvent::Reading(r) => r,
                ReadingEvent::Pending => {
                    stats.pending_polls += 1;
                    continue;
                }
                ReadingEvent::Eof => {
                    info!(
                        processed = stats.readings_processed,
                        "Source reached end"
                    );
                    break;
                }
            };

            let outcome = match self.engine.process(&reading) {
                Ok(o) => o,
                Err(e) => {
                    // Commands stay queued for the next valid reading
                    warn!(error = %e, "Skipping reading");
                    stats.invalid_readings += 1;
                    continue;
                }
            };
            stats.readings_processed += 1;
            self.emit(&outcome, &mut stats);

            let pending = self.commands.drain();
            if !pending.is_empty() {
                stats.commands_applied += pending.in_order().count() as u64;
                self.engine.apply_commands(pending);
            }

            if self.progress_every > 0 && outcome.tick % self.progress_every == 0 {
                let (collected, required) = self.engine.calibration_progress();
                info!(
                    tick = outcome.tick,
                    state = %self.engine.state(),
                    raw = outcome.sample.raw,
                    smoothed = outcome.sample.smoothed,
                    calibration_collected = collected,
                    calibration_required = required,
                    "Progress"
                );
            }
        }

        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "Final sink flush failed");
            stats.sink_errors += 1;
        }

        info!(
            processed = stats.readings_processed,
            invalid = stats.invalid_readings,
            metrics = stats.metrics_written,
            drift_events = stats.drift_events,
            commands = stats.commands_applied,
            "Processing loop finished"
        );

        LoopOutput {
            stats,
            engine: self.engine,
            sink: self.sink,
        }
    }

    fn emit(&mut self, outcome: &TickOutcome, stats: &mut LoopStats) {
        if let Some(ref metrics) = outcome.metrics {
            match self.sink.write_metrics(metrics) {
                Ok(()) => stats.metrics_written += 1,
                Err(e) => {
                    warn!(tick = outcome.tick, error = %e, "Failed to write metrics record");
                    stats.sink_errors += 1;
                }
            }
        }
        if let Some(ref drift) = outcome.drift {
            stats.drift_events += 1;
            if let Err(e) = self.sink.write_drift(drift) {
                warn!(tick = outcome.tick, error = %e, "Failed to write drift event");
                stats.sink_errors += 1;
            }
        }
        if outcome.calibration_completed {
            debug!(tick = outcome.tick, "Calibration window closed");
        }
    }
}
