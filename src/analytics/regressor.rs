//! Online time-to-failure regression.
//!
//! Linear model over two features, the smoothed health index and its
//! derivative, trained one sample per tick with plain SGD on squared loss.
//! The target is the proximity to failure `max(0, 1 - smoothed)`; the model
//! output is mapped to a tick horizon:
//!
//! ```text
//! ttf = max(1, horizon · (1 - prediction))
//! ```

use serde::{Deserialize, Serialize};

/// Number of model features: `[smoothed, derivative]`.
pub const NUM_FEATURES: usize = 2;

/// Model output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TtfPrediction {
    /// Raw model output (proximity to failure, nominally 0-1)
    pub prediction: f64,
    /// Estimated ticks to failure, floored at 1
    pub ttf_estimate: f64,
}

/// Failure risk in percent, computed from the trend alone (model-independent).
pub fn risk_percent(smoothed: f64) -> f64 {
    ((1.0 - smoothed) * 100.0).clamp(0.0, 100.0)
}

/// Learning target for one tick.
pub fn proximity_target(smoothed: f64) -> f64 {
    (1.0 - smoothed).max(0.0)
}

/// Incrementally trained linear regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtfRegressor {
    weights: [f64; NUM_FEATURES],
    bias: f64,
    learning_rate: f64,
    horizon: f64,
    samples_seen: u64,
}

impl TtfRegressor {
    pub fn new(learning_rate: f64, horizon: f64) -> Self {
        Self {
            weights: [0.0; NUM_FEATURES],
            bias: 0.0,
            learning_rate,
            horizon,
            samples_seen: 0,
        }
    }

    /// `w · x + b`
    pub fn predict(&self, features: &[f64; NUM_FEATURES]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// One SGD step on squared loss.
    ///
    /// The gradient of `(p - y)^2` is `2 (p - y)`; weights move by
    /// `lr · 2 (p - y) · x`, the bias by `lr · 2 (p - y)`.
    pub fn learn(&mut self, features: &[f64; NUM_FEATURES], target: f64) {
        let residual = self.predict(features) - target;
        let gradient = 2.0 * residual;
        for (w, x) in self.weights.iter_mut().zip(features) {
            *w -= self.learning_rate * gradient * x;
        }
        self.bias -= self.learning_rate * gradient;
        self.samples_seen += 1;
    }

    /// Learn from the current tick, then predict it.
    pub fn update(&mut self, smoothed: f64, derivative: f64) -> TtfPrediction {
        let features = [smoothed, derivative];
        self.learn(&features, proximity_target(smoothed));
        let prediction = self.predict(&features);
        TtfPrediction {
            prediction,
            ttf_estimate: self.ttf_from_prediction(prediction),
        }
    }

    pub fn ttf_from_prediction(&self, prediction: f64) -> f64 {
        (self.horizon * (1.0 - prediction)).max(1.0)
    }

    pub fn weights(&self) -> [f64; NUM_FEATURES] {
        self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }
}
