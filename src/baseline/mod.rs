//! Baseline Module - Calibrated Health Index Envelope
//!
//! Learns what "healthy" looks like for the monitored asset and keeps that
//! picture current while the asset runs normally.
//!
//! ## Lifecycle
//!
//! 1. **Calibration**: raw health index samples are buffered until exactly
//!    `sample_count` have been seen since the last reset.
//! 2. **Lock**: `mu` = mean, `sigma` = population standard deviation of
//!    exactly those samples. The buffer is dropped.
//! 3. **Adaptive tracking**: in Normal and Repair states the envelope follows
//!    the smoothed index:
//!    `mu ← (1-r)·mu + r·s`, then `sigma ← (1-r)·sigma + r·|s - mu|`.
//! 4. **Reset**: a recalibration command clears everything and returns to 1.
//!
//! Thresholds are `mu ∓ k·sigma` with strict comparisons, so a zero sigma
//! turns any non-zero deviation into a Failure or Repair decision.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BaselineConfig, CalibrationConfig};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Baseline not calibrated")]
    NotCalibrated,

    #[error("Baseline already calibrated (mu={mu:.5}, sigma={sigma:.5})")]
    AlreadyCalibrated { mu: f64, sigma: f64 },

    #[error("Insufficient calibration samples: have {have}, need {need}")]
    InsufficientSamples { have: usize, need: usize },

    #[error("Non-finite calibration sample: {0}")]
    NonFiniteSample(f64),
}

// ============================================================================
// Baseline Snapshot
// ============================================================================

/// Current baseline parameters; both set together or both absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
}

impl Baseline {
    pub fn is_calibrated(&self) -> bool {
        self.mu.is_some() && self.sigma.is_some()
    }
}

/// Where a smoothed value falls relative to the baseline envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deviation {
    /// Strictly below `mu - k·sigma`
    Below,
    /// Strictly above `mu + k·sigma`
    Above,
    Within,
}

// ============================================================================
// Baseline Estimator
// ============================================================================

/// Calibrated mean/std of the health index, adaptively drifted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEstimator {
    /// Samples required to lock the baseline
    sample_count: usize,

    /// Weight of the smoothed index in each adaptive update
    adaptation_rate: f64,

    /// Sigma multiplier for the envelope
    deviation_multiplier: f64,

    /// Raw samples since the last reset; empty once calibrated
    calibration: Vec<f64>,

    mu: Option<f64>,
    sigma: Option<f64>,

    /// Adaptive updates applied since calibration
    adaptations: u64,
}

impl BaselineEstimator {
    pub fn new(calibration: &CalibrationConfig, baseline: &BaselineConfig) -> Self {
        Self {
            sample_count: calibration.sample_count,
            adaptation_rate: baseline.adaptation_rate,
            deviation_multiplier: baseline.deviation_multiplier,
            calibration: Vec::with_capacity(calibration.sample_count),
            mu: None,
            sigma: None,
            adaptations: 0,
        }
    }

    /// Buffer one raw calibration sample.
    ///
    /// Returns `true` when the buffer holds the full calibration window and
    /// [`finalize`](Self::finalize) can lock the baseline. Samples beyond the
    /// window are not buffered.
    pub fn add_sample(&mut self, raw: f64) -> Result<bool, BaselineError> {
        if let (Some(mu), Some(sigma)) = (self.mu, self.sigma) {
            return Err(BaselineError::AlreadyCalibrated { mu, sigma });
        }
        if !raw.is_finite() {
            return Err(BaselineError::NonFiniteSample(raw));
        }
        if self.calibration.len() < self.sample_count {
            self.calibration.push(raw);
        }
        Ok(self.is_ready())
    }

    /// True when the calibration window is full and not yet locked.
    pub fn is_ready(&self) -> bool {
        self.mu.is_none() && self.calibration.len() >= self.sample_count
    }

    /// Lock `mu`/`sigma` from the buffered window and drop the buffer.
    pub fn finalize(&mut self) -> Result<Baseline, BaselineError> {
        if let (Some(mu), Some(sigma)) = (self.mu, self.sigma) {
            return Err(BaselineError::AlreadyCalibrated { mu, sigma });
        }
        if self.calibration.len() < self.sample_count || self.calibration.is_empty() {
            return Err(BaselineError::InsufficientSamples {
                have: self.calibration.len(),
                need: self.sample_count.max(1),
            });
        }

        let mu = self.calibration.iter().mean();
        // Mean of squared deviations: exactly 0 for a constant window
        let sigma = self
            .calibration
            .iter()
            .map(|x| (x - mu).powi(2))
            .mean()
            .sqrt();

        info!(
            mu,
            sigma,
            samples = self.calibration.len(),
            "Baseline calibrated"
        );

        self.mu = Some(mu);
        self.sigma = Some(sigma);
        self.adaptations = 0;
        self.calibration = Vec::new();
        Ok(self.baseline())
    }

    /// Move the envelope towards the current smoothed index.
    pub fn adapt(&mut self, smoothed: f64) -> Result<(), BaselineError> {
        let (Some(mu), Some(sigma)) = (self.mu, self.sigma) else {
            return Err(BaselineError::NotCalibrated);
        };
        let rate = self.adaptation_rate;
        let mu_new = mu + rate * (smoothed - mu);
        let sigma_new = sigma + rate * ((smoothed - mu_new).abs() - sigma);
        self.mu = Some(mu_new);
        self.sigma = Some(sigma_new);
        self.adaptations += 1;
        Ok(())
    }

    /// Classify a smoothed value against `mu ∓ k·sigma` (strict).
    pub fn classify(&self, smoothed: f64) -> Result<Deviation, BaselineError> {
        let (Some(mu), Some(sigma)) = (self.mu, self.sigma) else {
            return Err(BaselineError::NotCalibrated);
        };
        let band = self.deviation_multiplier * sigma;
        Ok(if smoothed < mu - band {
            Deviation::Below
        } else if smoothed > mu + band {
            Deviation::Above
        } else {
            Deviation::Within
        })
    }

    /// Forget the baseline and start a fresh calibration window.
    pub fn reset(&mut self) {
        debug!(had_baseline = self.mu.is_some(), "Baseline reset");
        self.mu = None;
        self.sigma = None;
        self.adaptations = 0;
        self.calibration.clear();
        self.calibration.reserve(self.sample_count);
    }

    pub fn baseline(&self) -> Baseline {
        Baseline {
            mu: self.mu,
            sigma: self.sigma,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.mu.is_some()
    }

    /// `(collected, required)` for the current calibration window.
    pub fn progress(&self) -> (usize, usize) {
        if self.is_calibrated() {
            (self.sample_count, self.sample_count)
        } else {
            (self.calibration.len(), self.sample_count)
        }
    }

    pub fn buffered_samples(&self) -> usize {
        self.calibration.len()
    }

    pub fn adaptations(&self) -> u64 {
        self.adaptations
    }
}

// ============================================================================
// Tests
// ============================================================================
