//! Health index computation
//!
//! Weighted, normalized load of the three monitored channels subtracted from
//! full health:
//!
//! ```text
//! hi = clamp(1 - (0.4·current/10 + 0.3·temperature/100 + 0.3·vibration/10), 0, 1)
//! ```
//!
//! Pure function of the reading; non-finite channels are rejected by the
//! engine before this is called.

use crate::config::HealthIndexConfig;
use crate::types::Reading;

/// Health index with the built-in weights.
pub fn compute(current: f64, temperature: f64, vibration: f64) -> f64 {
    HealthIndexModel::default().compute(current, temperature, vibration)
}

/// Weighted health index formula with configurable weights and scales.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthIndexModel {
    current_weight: f64,
    current_scale: f64,
    temperature_weight: f64,
    temperature_scale: f64,
    vibration_weight: f64,
    vibration_scale: f64,
}

impl Default for HealthIndexModel {
    fn default() -> Self {
        Self::from_config(&HealthIndexConfig::default())
    }
}

impl HealthIndexModel {
    pub fn from_config(config: &HealthIndexConfig) -> Self {
        Self {
            current_weight: config.current_weight,
            current_scale: config.current_scale,
            temperature_weight: config.temperature_weight,
            temperature_scale: config.temperature_scale,
            vibration_weight: config.vibration_weight,
            vibration_scale: config.vibration_scale,
        }
    }

    /// Clamped health index for one set of channel values.
    pub fn compute(&self, current: f64, temperature: f64, vibration: f64) -> f64 {
        let load = self.current_weight * current / self.current_scale
            + self.temperature_weight * temperature / self.temperature_scale
            + self.vibration_weight * vibration / self.vibration_scale;
        (1.0 - load).clamp(0.0, 1.0)
    }

    pub fn compute_reading(&self, reading: &Reading) -> f64 {
        self.compute(reading.current, reading.temperature, reading.vibration)
    }
}
