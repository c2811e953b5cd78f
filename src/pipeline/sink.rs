//! Record sinks: where metrics rows and drift events go.
//!
//! - [`CsvRecordSink`]: append-only metrics / drift CSV files
//! - [`JsonLinesSink`]: tagged JSON lines to any writer (stdout by default)
//! - [`MemorySink`]: in-memory capture for tests and embedding

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::types::{DriftEvent, MetricsRecord, DRIFT_CSV_HEADER, METRICS_CSV_HEADER};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for the engine's output streams.
pub trait RecordSink: Send {
    fn write_metrics(&mut self, record: &MetricsRecord) -> Result<(), SinkError>;

    fn write_drift(&mut self, event: &DriftEvent) -> Result<(), SinkError>;

    /// Push buffered output to its destination.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_metrics(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
        (**self).write_metrics(record)
    }

    fn write_drift(&mut self, event: &DriftEvent) -> Result<(), SinkError> {
        (**self).write_drift(event)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

// ============================================================================
// CSV Sink
// ============================================================================

/// Appends metrics and drift rows to two CSV files.
///
/// A file's header is written only when the file is created (or empty), so
/// restarts keep appending to the same streams. Rows are flushed after each
/// write so readers tailing the files see complete lines.
pub struct CsvRecordSink {
    metrics: CsvStream,
    drift: CsvStream,
}

struct CsvStream {
    path: PathBuf,
    header: &'static str,
    writer: Option<BufWriter<File>>,
}

impl CsvStream {
    fn new(path: PathBuf, header: &'static str) -> Self {
        Self {
            path,
            header,
            writer: None,
        }
    }

    /// Open lazily so a stream that never receives a row never creates a file.
    fn writer(&mut self) -> Result<&mut BufWriter<File>, SinkError> {
        let writer = match self.writer.take() {
            Some(w) => w,
            None => self.open()?,
        };
        Ok(self.writer.insert(writer))
    }

    fn open(&self) -> Result<BufWriter<File>, SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let is_new = file.metadata().map_err(io_err)?.len() == 0;
        let mut writer = BufWriter::new(file);
        if is_new {
            writeln!(writer, "{}", self.header).map_err(io_err)?;
        }
        info!(path = %self.path.display(), new_file = is_new, "Opened output stream");
        Ok(writer)
    }

    fn append(&mut self, row: &str) -> Result<(), SinkError> {
        let path = self.path.clone();
        let writer = self.writer()?;
        writeln!(writer, "{row}")
            .and_then(|()| writer.flush())
            .map_err(|source| SinkError::Io { path, source })
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(w) = self.writer.as_mut() {
            w.flush().map_err(|source| SinkError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl CsvRecordSink {
    pub fn new(metrics_path: impl Into<PathBuf>, drift_path: impl Into<PathBuf>) -> Self {
        Self {
            metrics: CsvStream::new(metrics_path.into(), METRICS_CSV_HEADER),
            drift: CsvStream::new(drift_path.into(), DRIFT_CSV_HEADER),
        }
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics.path
    }

    pub fn drift_path(&self) -> &Path {
        &self.drift.path
    }
}

impl RecordSink for CsvRecordSink {
    fn write_metrics(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
        self.metrics.append(&record.to_csv_row())
    }

    fn write_drift(&mut self, event: &DriftEvent) -> Result<(), SinkError> {
        self.drift.append(&event.to_csv_row())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.metrics.flush()?;
        self.drift.flush()
    }
}

// ============================================================================
// JSON Lines Sink
// ============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonRecord<'a> {
    Metrics(&'a MetricsRecord),
    Drift(&'a DriftEvent),
}

/// Writes one JSON object per record, tagged `"type": "metrics" | "drift"`.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, record: &JsonRecord<'_>) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write_metrics(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
        self.emit(&JsonRecord::Metrics(record))
    }

    fn write_drift(&mut self, event: &DriftEvent) -> Result<(), SinkError> {
        self.emit(&JsonRecord::Drift(event))
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub metrics: Vec<MetricsRecord>,
    pub drift: Vec<DriftEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn write_metrics(&mut self, record: &MetricsRecord) -> Result<(), SinkError> {
        self.metrics.push(record.clone());
        Ok(())
    }

    fn write_drift(&mut self, event: &DriftEvent) -> Result<(), SinkError> {
        self.drift.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperatingState;
    use chrono::TimeZone;

    fn metrics(tick: u64) -> MetricsRecord {
        MetricsRecord {
            timestamp: chrono::Utc
                .with_ymd_and_hms(2026, 10, 19, 8, 0, 0)
                .single()
                .expect("valid date"),
            tick,
            raw: 0.68,
            smoothed: 0.68,
            derivative: 0.0,
            ttf_estimate: 320.0,
            risk_percent: 32.0,
            state: OperatingState::Normal,
        }
    }

    #[test]
    fn test_csv_header_written_once_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let metrics_path = dir.path().join("metrics.csv");
        let drift_path = dir.path().join("drift.csv");

        {
            let mut sink = CsvRecordSink::new(&metrics_path, &drift_path);
            sink.write_metrics(&metrics(201)).expect("write");
        }
        {
            let mut sink = CsvRecordSink::new(&metrics_path, &drift_path);
            sink.write_metrics(&metrics(202)).expect("write");
        }

        let text = std::fs::read_to_string(&metrics_path).expect("metrics file");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METRICS_CSV_HEADER);
        assert!(lines[1].starts_with("2026-10-19T08:00:00Z,201,0.68000"));
        assert!(lines[2].contains(",202,"));
        // No drift written, no drift file created
        assert!(!drift_path.exists());
    }

    #[test]
    fn test_json_lines_are_tagged() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write_metrics(&metrics(5)).expect("write");
        sink.write_drift(&DriftEvent {
            timestamp: metrics(5).timestamp,
            tick: 5,
            raw: 0.2,
        })
        .expect("write");
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines[0]["type"], "metrics");
        assert_eq!(lines[0]["state"], "Normal");
        assert_eq!(lines[0]["timestamp"], "2026-10-19T08:00:00Z");
        assert_eq!(lines[1]["type"], "drift");
        assert_eq!(lines[1]["tick"], 5);
    }
}
