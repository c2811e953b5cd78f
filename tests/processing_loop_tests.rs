//! Processing loop integration tests
//!
//! Runs the tick loop end to end with in-memory and file-backed sources and
//! sinks: record emission, command delivery between ticks, invalid readings,
//! and cancellation.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use edge_phm::config::CalibrationConfig;
use edge_phm::pipeline::{
    command_channel, CommandSender, CsvRecordSink, CsvTailSource, MemorySink, ProcessingLoop,
    ReadingEvent, ReadingSource, ReplaySource,
};
use edge_phm::types::{DRIFT_CSV_HEADER, METRICS_CSV_HEADER};
use edge_phm::{Command, MonitorConfig, MonitorEngine, OperatingState, Reading};

fn engine_with_window(sample_count: usize) -> MonitorEngine {
    MonitorEngine::new(&MonitorConfig {
        calibration: CalibrationConfig { sample_count },
        ..MonitorConfig::default()
    })
}

fn nominal_readings(n: usize) -> Vec<Reading> {
    (0..n)
        .map(|i| Reading::new(i as i64, 5.0, 35.0, 0.5))
        .collect()
}

/// Replays readings and raises a command just before a given one is handed out.
struct ScriptedSource {
    inner: ReplaySource,
    sender: CommandSender,
    at: usize,
    command: Command,
    served: usize,
}

#[async_trait]
impl ReadingSource for ScriptedSource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        if self.served == self.at {
            self.sender.send(self.command);
        }
        self.served += 1;
        self.inner.next_reading().await
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

#[tokio::test]
async fn replay_emits_metrics_after_calibration() {
    let (_tx, rx) = command_channel();
    let mut source = ReplaySource::new(nominal_readings(300), Duration::ZERO);

    let output = ProcessingLoop::new(
        MonitorEngine::default(),
        MemorySink::new(),
        rx,
        CancellationToken::new(),
    )
    .run(&mut source)
    .await;

    assert_eq!(output.stats.readings_processed, 300);
    assert_eq!(output.stats.metrics_written, 100);
    assert_eq!(output.stats.drift_events, 0);
    assert_eq!(output.stats.sink_errors, 0);

    let ticks: Vec<u64> = output.sink.metrics.iter().map(|m| m.tick).collect();
    assert_eq!(ticks.first(), Some(&201));
    assert_eq!(ticks.last(), Some(&300));
    assert!(output
        .sink
        .metrics
        .iter()
        .all(|m| m.state == OperatingState::Normal));
    assert_eq!(output.engine.state(), OperatingState::Normal);
}

#[tokio::test]
async fn invalid_readings_are_skipped() {
    let (_tx, rx) = command_channel();
    let mut readings = nominal_readings(30);
    readings[12].vibration = f64::NAN;
    readings[25].current = f64::INFINITY;
    let mut source = ReplaySource::new(readings, Duration::ZERO);

    let output = ProcessingLoop::new(engine_with_window(10), MemorySink::new(), rx, CancellationToken::new())
        .run(&mut source)
        .await;

    assert_eq!(output.stats.invalid_readings, 2);
    assert_eq!(output.stats.readings_processed, 28);
    assert_eq!(output.stats.metrics_written, 18);
    // Engine tick counts processed readings only
    assert_eq!(output.engine.tick(), 28);
}

#[tokio::test]
async fn force_repair_lands_on_next_metrics_row() {
    let (tx, rx) = command_channel();
    let mut source = ScriptedSource {
        inner: ReplaySource::new(nominal_readings(40), Duration::ZERO),
        sender: tx,
        // Raised while reading 25 is in flight, applied after it
        at: 25,
        command: Command::ForceRepair,
        served: 0,
    };

    let output = ProcessingLoop::new(engine_with_window(10), MemorySink::new(), rx, CancellationToken::new())
        .run(&mut source)
        .await;

    assert_eq!(output.stats.commands_applied, 1);
    let states: Vec<(u64, OperatingState)> = output
        .sink
        .metrics
        .iter()
        .map(|m| (m.tick, m.state))
        .collect();
    let repairs: Vec<u64> = states
        .iter()
        .filter(|(_, s)| *s == OperatingState::Repair)
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(repairs, vec![27], "states: {states:?}");
    assert_eq!(output.engine.state(), OperatingState::Normal);
}

#[tokio::test]
async fn recalibrate_pauses_metrics_for_a_fresh_window() {
    let (tx, rx) = command_channel();
    let mut source = ScriptedSource {
        inner: ReplaySource::new(nominal_readings(60), Duration::ZERO),
        sender: tx,
        at: 20,
        command: Command::Recalibrate,
        served: 0,
    };

    let output = ProcessingLoop::new(engine_with_window(10), MemorySink::new(), rx, CancellationToken::new())
        .run(&mut source)
        .await;

    // Ticks 11..=21 evaluated, recalibration applied after tick 21,
    // ticks 22..=31 refill the window, 32..=60 evaluated again
    let ticks: Vec<u64> = output.sink.metrics.iter().map(|m| m.tick).collect();
    assert!(ticks.contains(&21));
    assert!(!ticks.iter().any(|t| (22..=31).contains(t)), "{ticks:?}");
    assert!(ticks.contains(&32));
    assert_eq!(output.stats.metrics_written, 11 + 29);
    assert_eq!(output.engine.snapshot().calibrations, 2);
}

#[tokio::test]
async fn cancellation_stops_a_pending_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_tx, rx) = command_channel();
    let mut source = CsvTailSource::new(dir.path().join("not_yet.csv"), Duration::from_millis(5));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        canceller.cancel();
    });

    let output = tokio::time::timeout(
        Duration::from_secs(5),
        ProcessingLoop::new(MonitorEngine::default(), MemorySink::new(), rx, cancel).run(&mut source),
    )
    .await
    .expect("loop stops on cancel");

    assert!(output.stats.pending_polls > 0);
    assert_eq!(output.stats.readings_processed, 0);
    assert_eq!(output.engine.state(), OperatingState::Calibrating);
}

#[tokio::test]
async fn csv_replay_to_csv_streams() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("history.csv");
    let mut csv = String::from("timestamp,tick,current,temperature,vibration,rpm\n");
    for i in 0..15 {
        csv.push_str(&format!("2026-10-19T06:00:{i:02},{i},5.000,35.000,0.500,1500.00\n"));
    }
    std::fs::write(&input, csv).expect("write input");

    let metrics_path = dir.path().join("out").join("metrics_hi_ttf.csv");
    let drift_path = dir.path().join("out").join("metrics_drift.csv");

    let (_tx, rx) = command_channel();
    let mut source = ReplaySource::from_csv(&input, Duration::ZERO).expect("readable csv");
    let output = ProcessingLoop::new(
        engine_with_window(10),
        CsvRecordSink::new(&metrics_path, &drift_path),
        rx,
        CancellationToken::new(),
    )
    .run(&mut source)
    .await;
    assert_eq!(output.stats.metrics_written, 5);

    let text = std::fs::read_to_string(&metrics_path).expect("metrics stream");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], METRICS_CSV_HEADER);
    assert_eq!(lines.len(), 6);
    for line in &lines[1..] {
        assert_eq!(line.split(',').count(), 8);
        assert!(line.ends_with(",Normal"), "{line}");
    }
    assert_eq!(lines[1].split(',').nth(1), Some("11"));

    // Nothing drifted, so the drift stream was never created
    assert!(!drift_path.exists());
    assert_eq!(DRIFT_CSV_HEADER, "timestamp,raw");
}
