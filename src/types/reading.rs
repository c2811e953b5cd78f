//! Sensor reading types

use serde::{Deserialize, Serialize};

/// One sample from the monitored motor, as produced by the upstream process.
///
/// Units are the simulator's engineering units: amperes, degrees Celsius and
/// mm/s RMS. Immutable once received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Producer-side tick counter
    pub tick: i64,
    /// Motor current (A)
    pub current: f64,
    /// Winding temperature (°C)
    pub temperature: f64,
    /// Vibration velocity (mm/s)
    pub vibration: f64,
}

impl Reading {
    pub fn new(tick: i64, current: f64, temperature: f64, vibration: f64) -> Self {
        Self {
            tick,
            current,
            temperature,
            vibration,
        }
    }

    /// Name of the first non-finite channel, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        if !self.current.is_finite() {
            Some("current")
        } else if !self.temperature.is_finite() {
            Some("temperature")
        } else if !self.vibration.is_finite() {
            Some("vibration")
        } else {
            None
        }
    }
}
