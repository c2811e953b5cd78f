//! Per-tick output records
//!
//! The metrics and drift streams are append-only. Column order and decimal
//! precision are fixed so that downstream readers can parse them without a
//! schema negotiation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::OperatingState;

/// Metrics stream header, in column order
pub const METRICS_CSV_HEADER: &str =
    "timestamp,tick,raw,smoothed,derivative,ttf_estimate,risk_percent,state";

/// Drift stream header, in column order
pub const DRIFT_CSV_HEADER: &str = "timestamp,raw";

/// ISO-8601 timestamp with second precision (`2026-10-19T08:15:02Z`)
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

/// Health index triple for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthIndexSample {
    /// Clamped health index computed from the raw reading
    pub raw: f64,
    /// Exponentially smoothed health index
    pub smoothed: f64,
    /// Tick-over-tick change of the smoothed index
    pub derivative: f64,
}

/// One row of the metrics stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Engine tick (count of processed readings)
    pub tick: u64,
    pub raw: f64,
    pub smoothed: f64,
    pub derivative: f64,
    /// Estimated ticks until failure, floored at 1
    pub ttf_estimate: f64,
    /// Failure risk in percent, 0-100
    pub risk_percent: f64,
    pub state: OperatingState,
}

impl MetricsRecord {
    /// Render as a metrics stream row (no trailing newline)
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{:.5},{:.5},{:.5},{:.2},{:.1},{}",
            format_timestamp(&self.timestamp),
            self.tick,
            self.raw,
            self.smoothed,
            self.derivative,
            self.ttf_estimate,
            self.risk_percent,
            self.state
        )
    }
}

/// One row of the drift stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Engine tick on which the detector fired (not part of the CSV row)
    pub tick: u64,
    /// Raw health index that triggered the detection
    pub raw: f64,
}

impl DriftEvent {
    /// Render as a drift stream row (no trailing newline)
    pub fn to_csv_row(&self) -> String {
        format!("{},{:.5}", format_timestamp(&self.timestamp), self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 2)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_metrics_row_precision_and_order() {
        let record = MetricsRecord {
            timestamp: ts(),
            tick: 201,
            raw: 0.6,
            smoothed: 0.612_345_6,
            derivative: -0.000_012_3,
            ttf_estimate: 612.346_1,
            risk_percent: 38.765,
            state: OperatingState::Normal,
        };
        assert_eq!(
            record.to_csv_row(),
            "2026-10-19T08:15:02Z,201,0.60000,0.61235,-0.00001,612.35,38.8,Normal"
        );
        assert_eq!(METRICS_CSV_HEADER.split(',').count(), 8);
    }

    #[test]
    fn test_drift_row() {
        let event = DriftEvent {
            timestamp: ts(),
            tick: 512,
            raw: 0.2,
        };
        assert_eq!(event.to_csv_row(), "2026-10-19T08:15:02Z,0.20000");
    }

    #[test]
    fn test_json_timestamp_has_second_precision() {
        let event = DriftEvent {
            timestamp: ts(),
            tick: 1,
            raw: 0.5,
        };
        let json = serde_json::to_string(&event).expect("serializable");
        assert!(json.contains("\"2026-10-19T08:15:02Z\""));
    }
}
