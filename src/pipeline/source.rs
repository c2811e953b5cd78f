//! Reading source abstraction.
//!
//! Provides a unified trait for pulling sensor readings into the processing
//! loop: a readings CSV that a producer keeps appending to (tail), stdin
//! (JSON lines), and pre-loaded readings (replay).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::types::Reading;

/// Events produced by a reading source.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingEvent {
    /// A new reading is available.
    Reading(Reading),
    /// Nothing new this tick; ask again later.
    Pending,
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where readings come from.
///
/// Implementations handle format parsing and pacing internally. The
/// processing loop calls [`next_reading`](ReadingSource::next_reading) in a
/// `select!` with cancellation.
#[async_trait]
pub trait ReadingSource: Send + 'static {
    /// Wait for the next tick and return what the source has.
    ///
    /// Returns `Err` only on unrecoverable errors.
    async fn next_reading(&mut self) -> Result<ReadingEvent>;

    /// Human-readable name for logging (e.g. "csv-tail", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// CSV Parsing
// ============================================================================

/// Column positions of the reading fields in a readings CSV.
///
/// Located by header name (case-insensitive), so producers may add or
/// reorder columns freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingColumns {
    tick: usize,
    current: usize,
    temperature: usize,
    vibration: usize,
    width: usize,
}

impl ReadingColumns {
    pub fn from_header(header: &str) -> Result<Self> {
        let names: Vec<String> = split_csv_line(header)
            .into_iter()
            .map(|n| n.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| anyhow!("readings header is missing column '{name}': {header}"))
        };
        Ok(Self {
            tick: find("tick")?,
            current: find("current")?,
            temperature: find("temperature")?,
            vibration: find("vibration")?,
            width: names.len(),
        })
    }

    /// Parse one data row.
    pub fn parse_row(&self, line: &str) -> Result<Reading> {
        let fields = split_csv_line(line);
        if fields.len() < self.width {
            bail!(
                "expected {} fields, found {}: {}",
                self.width,
                fields.len(),
                line
            );
        }
        let number = |idx: usize, name: &str| -> Result<f64> {
            fields[idx]
                .trim()
                .parse::<f64>()
                .with_context(|| format!("bad {name} value '{}'", fields[idx]))
        };
        let tick_field = fields[self.tick].trim();
        // Producers that write floats for every column still get an integer tick
        let tick = match tick_field.parse::<i64>() {
            Ok(t) => t,
            Err(_) => number(self.tick, "tick")? as i64,
        };
        Ok(Reading {
            tick,
            current: number(self.current, "current")?,
            temperature: number(self.temperature, "temperature")?,
            vibration: number(self.vibration, "vibration")?,
        })
    }
}

/// Split a CSV line, honouring double-quoted fields and `""` escapes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

/// Parse a complete readings CSV document (header plus rows).
///
/// Rows that fail to parse are logged and skipped.
pub fn parse_readings_csv(contents: &str) -> Result<Vec<Reading>> {
    let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| anyhow!("readings CSV is empty"))?;
    let columns = ReadingColumns::from_header(header)?;

    let mut readings = Vec::new();
    for (row, line) in lines.enumerate() {
        match columns.parse_row(line) {
            Ok(r) => readings.push(r),
            Err(e) => warn!(row = row + 1, error = %e, "Skipping malformed readings row"),
        }
    }
    Ok(readings)
}

/// Load every reading from a CSV file.
pub fn load_readings_csv(path: &Path) -> Result<Vec<Reading>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_readings_csv(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

// ============================================================================
// CSV Tail Source (live producer file)
// ============================================================================

/// Bytes read from the end of the file when looking for the newest row.
const TAIL_WINDOW_BYTES: u64 = 8 * 1024;

/// Polls a readings CSV that a producer appends to and yields its newest row.
///
/// One poll per tick interval. A row is delivered once: if the newest row's
/// tick equals the last delivered tick the poll reports `Pending`, as it does
/// when the file does not exist yet or has no data rows.
pub struct CsvTailSource {
    path: PathBuf,
    interval: Duration,
    columns: Option<ReadingColumns>,
    last_tick: Option<i64>,
    polled_once: bool,
}

impl CsvTailSource {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            columns: None,
            last_tick: None,
            polled_once: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the header (once) and the newest complete data row.
    async fn poll(&mut self) -> Result<Option<Reading>> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to open {}", self.path.display()))
            }
        };
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(None);
        }

        let columns = match self.columns {
            Some(c) => c,
            None => {
                let mut head = vec![0u8; len.min(TAIL_WINDOW_BYTES) as usize];
                file.read_exact(&mut head).await?;
                let head = String::from_utf8_lossy(&head);
                // Header still being written
                let Some((header, _)) = head.split_once('\n') else {
                    return Ok(None);
                };
                let c = ReadingColumns::from_header(header)?;
                self.columns = Some(c);
                c
            }
        };

        let start = len.saturating_sub(TAIL_WINDOW_BYTES);
        file.seek(std::io::SeekFrom::Start(start)).await?;
        let mut tail = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut tail).await?;
        let tail = String::from_utf8_lossy(&tail);

        // Only newline-terminated rows are complete
        let Some(complete) = tail.rfind('\n').map(|end| &tail[..end]) else {
            return Ok(None);
        };
        let Some(last) = complete.lines().rev().find(|l| !l.trim().is_empty()) else {
            return Ok(None);
        };
        if start == 0 && complete.lines().filter(|l| !l.trim().is_empty()).count() <= 1 {
            // Header only
            return Ok(None);
        }

        match columns.parse_row(last) {
            Ok(reading) => Ok(Some(reading)),
            Err(e) => {
                debug!(error = %e, "Newest readings row not parseable yet");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReadingSource for CsvTailSource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        if self.polled_once {
            tokio::time::sleep(self.interval).await;
        }
        self.polled_once = true;

        match self.poll().await? {
            Some(reading) if self.last_tick != Some(reading.tick) => {
                self.last_tick = Some(reading.tick);
                Ok(ReadingEvent::Reading(reading))
            }
            _ => Ok(ReadingEvent::Pending),
        }
    }

    fn source_name(&self) -> &str {
        "csv-tail"
    }
}

// ============================================================================
// Stdin Source (JSON readings, one per line)
// ============================================================================

/// Reads JSON-formatted readings from stdin.
///
/// Used with the simulator:
/// `simulation --ticks 2000 | edge-phm --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingSource for StdinSource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(ReadingEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Reading>(line) {
                Ok(reading) => return Ok(ReadingEvent::Reading(reading)),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed stdin reading");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Replay Source (pre-loaded readings)
// ============================================================================

/// Replays pre-loaded readings with an optional delay between them.
pub struct ReplaySource {
    readings: std::vec::IntoIter<Reading>,
    delay: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(readings: Vec<Reading>, delay: Duration) -> Self {
        Self {
            readings: readings.into_iter(),
            delay,
            yielded_first: false,
        }
    }

    pub fn from_csv(path: &Path, delay: Duration) -> Result<Self> {
        Ok(Self::new(load_readings_csv(path)?, delay))
    }

    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

#[async_trait]
impl ReadingSource for ReplaySource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        // No delay before the first reading
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.readings.next() {
            Some(r) => {
                self.yielded_first = true;
                Ok(ReadingEvent::Reading(r))
            }
            None => Ok(ReadingEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}
