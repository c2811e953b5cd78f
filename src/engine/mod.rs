//! Monitor Engine - per-tick orchestration and operating state machine
//!
//! One [`MonitorEngine`] owns every piece of mutable analytics state for one
//! asset: the smoother, drift detector, TTF regressor, baseline and the current
//! [`OperatingState`]. It is fed one reading per tick by the host and never
//! sleeps, spawns or locks.
//!
//! ## Per-tick algorithm
//!
//! ```text
//! reading ─► health index ─► smoother ──────────────────────────────┐
//!                │                                                   │
//!                ├─ uncalibrated: buffer ─► window full? lock ─► Normal
//!                │
//!                └─ calibrated: drift(raw) ─► regressor(smoothed, d) ─► state
//!                                                  │
//!                               MetricsRecord (+ DriftEvent on drift)
//! ```
//!
//! Commands are applied after the tick through
//! [`apply_commands`](MonitorEngine::apply_commands), recalibrate before
//! force-repair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analytics::regressor::risk_percent;
use crate::analytics::{ConceptDriftDetector, HealthIndexModel, SignalSmoother, TtfRegressor};
use crate::baseline::{Baseline, BaselineError, BaselineEstimator, Deviation};
use crate::config::MonitorConfig;
use crate::types::{
    Command, DriftEvent, HealthIndexSample, MetricsRecord, OperatingState, PendingCommands,
    Reading,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid reading at producer tick {tick}: {channel} is {value}")]
    InvalidReading {
        tick: i64,
        channel: &'static str,
        value: f64,
    },

    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),
}

// ============================================================================
// Tick Outcome
// ============================================================================

/// Everything one processed reading produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Engine tick (1-based count of processed readings)
    pub tick: u64,
    pub sample: HealthIndexSample,
    /// State after per-tick evaluation (commands not yet applied)
    pub state: OperatingState,
    /// `None` on calibration ticks
    pub metrics: Option<MetricsRecord>,
    pub drift: Option<DriftEvent>,
    /// The calibration window completed on this tick
    pub calibration_completed: bool,
}

/// Serializable view of the engine for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub tick: u64,
    pub state: OperatingState,
    pub baseline: Baseline,
    pub calibration_collected: usize,
    pub calibration_required: usize,
    pub smoothed: Option<f64>,
    pub drift_window: usize,
    pub drift_events: u64,
    pub ttf_weights: [f64; 2],
    pub ttf_bias: f64,
    pub calibrations: u64,
    pub repair_override: bool,
}

// ============================================================================
// Monitor Engine
// ============================================================================

#[derive(Debug, Clone)]
pub struct MonitorEngine {
    health_index: HealthIndexModel,
    smoother: SignalSmoother,
    detector: ConceptDriftDetector,
    regressor: TtfRegressor,
    baseline: BaselineEstimator,
    state: OperatingState,
    /// Processed readings
    tick: u64,
    /// Set by force-repair; the next evaluated tick reports Repair
    repair_override: bool,
    drift_events: u64,
    calibrations: u64,
}

impl MonitorEngine {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            health_index: HealthIndexModel::from_config(&config.health_index),
            smoother: SignalSmoother::new(config.smoothing.alpha),
            detector: ConceptDriftDetector::from_config(&config.drift),
            regressor: TtfRegressor::new(
                config.regression.learning_rate,
                config.regression.ttf_horizon,
            ),
            baseline: BaselineEstimator::new(&config.calibration, &config.baseline),
            state: OperatingState::Calibrating,
            tick: 0,
            repair_override: false,
            drift_events: 0,
            calibrations: 0,
        }
    }

    /// Process one reading stamped with the current wall-clock time.
    pub fn process(&mut self, reading: &Reading) -> Result<TickOutcome, EngineError> {
        self.process_at(reading, Utc::now())
    }

    /// Process one reading; emitted records carry `now` as their timestamp.
    ///
    /// A reading with a non-finite channel, or one whose health index is not
    /// finite, is rejected before any state changes.
    pub fn process_at(
        &mut self,
        reading: &Reading,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, EngineError> {
        if let Some(channel) = reading.first_non_finite() {
            let value = match channel {
                "current" => reading.current,
                "temperature" => reading.temperature,
                _ => reading.vibration,
            };
            return Err(EngineError::InvalidReading {
                tick: reading.tick,
                channel,
                value,
            });
        }

        // Extreme weights or scales can overflow the load to NaN
        let raw = self.health_index.compute_reading(reading);
        if !raw.is_finite() {
            return Err(EngineError::InvalidReading {
                tick: reading.tick,
                channel: "health_index",
                value: raw,
            });
        }

        self.tick += 1;
        let (smoothed, derivative) = self.smoother.update(raw);
        let sample = HealthIndexSample {
            raw,
            smoothed,
            derivative,
        };

        if !self.baseline.is_calibrated() {
            let calibration_completed = self.calibrate(raw)?;
            return Ok(TickOutcome {
                tick: self.tick,
                sample,
                state: self.state,
                metrics: None,
                drift: None,
                calibration_completed,
            });
        }

        let drift_detected = self.detector.update(raw);
        let prediction = self.regressor.update(smoothed, derivative);
        let risk = risk_percent(smoothed);

        let evaluated = if drift_detected {
            OperatingState::Drift
        } else {
            match self.baseline.classify(smoothed)? {
                Deviation::Below => OperatingState::Failure,
                Deviation::Above => OperatingState::Repair,
                Deviation::Within => OperatingState::Normal,
            }
        };
        let next = if self.repair_override {
            self.repair_override = false;
            debug!(tick = self.tick, evaluated = %evaluated, "Forced repair overrides evaluation");
            OperatingState::Repair
        } else {
            evaluated
        };
        self.transition(next);

        if self.state.adapts_baseline() {
            self.baseline.adapt(smoothed)?;
        }

        let drift = if drift_detected {
            self.drift_events += 1;
            warn!(
                tick = self.tick,
                raw,
                window = self.detector.width(),
                "Drift detected"
            );
            Some(DriftEvent {
                timestamp: now,
                tick: self.tick,
                raw,
            })
        } else {
            None
        };

        let metrics = MetricsRecord {
            timestamp: now,
            tick: self.tick,
            raw,
            smoothed,
            derivative,
            ttf_estimate: prediction.ttf_estimate,
            risk_percent: risk,
            state: self.state,
        };

        Ok(TickOutcome {
            tick: self.tick,
            sample,
            state: self.state,
            metrics: Some(metrics),
            drift,
            calibration_completed: false,
        })
    }

    /// Buffer one calibration sample; lock the baseline when the window fills.
    fn calibrate(&mut self, raw: f64) -> Result<bool, EngineError> {
        if !self.baseline.add_sample(raw)? {
            return Ok(false);
        }
        let baseline = self.baseline.finalize()?;
        self.calibrations += 1;
        self.repair_override = false;
        info!(
            tick = self.tick,
            mu = baseline.mu.unwrap_or_default(),
            sigma = baseline.sigma.unwrap_or_default(),
            "Calibration complete"
        );
        self.transition(OperatingState::Normal);
        Ok(true)
    }

    fn transition(&mut self, next: OperatingState) {
        if next != self.state {
            debug!(tick = self.tick, from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Apply the commands observed since the previous tick.
    pub fn apply_commands(&mut self, commands: PendingCommands) {
        for command in commands.in_order() {
            match command {
                Command::Recalibrate => self.recalibrate(),
                Command::ForceRepair => self.force_repair(),
            }
        }
    }

    /// Drop the baseline and drift window and collect a fresh calibration
    /// window. The smoother and TTF model keep their state.
    pub fn recalibrate(&mut self) {
        info!(tick = self.tick, from = %self.state, "Recalibration requested");
        self.baseline.reset();
        self.detector.reset();
        self.repair_override = false;
        self.transition(OperatingState::Recalibrating);
    }

    /// Mark the asset as repaired. Baseline and drift window are untouched.
    pub fn force_repair(&mut self) {
        info!(tick = self.tick, from = %self.state, "Forced repair received");
        // Only an evaluated tick can be overridden; during calibration the
        // window completion decides the next state.
        self.repair_override = self.baseline.is_calibrated();
        self.transition(OperatingState::Repair);
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline.baseline()
    }

    /// Readings processed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// `(collected, required)` samples of the current calibration window.
    pub fn calibration_progress(&self) -> (usize, usize) {
        self.baseline.progress()
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_calibrated()
    }

    pub fn drift_detector(&self) -> &ConceptDriftDetector {
        &self.detector
    }

    pub fn regressor(&self) -> &TtfRegressor {
        &self.regressor
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let (calibration_collected, calibration_required) = self.calibration_progress();
        EngineSnapshot {
            tick: self.tick,
            state: self.state,
            baseline: self.baseline(),
            calibration_collected,
            calibration_required,
            smoothed: self.smoother.current(),
            drift_window: self.detector.width(),
            drift_events: self.drift_events,
            ttf_weights: self.regressor.weights(),
            ttf_bias: self.regressor.bias(),
            calibrations: self.calibrations,
            repair_override: self.repair_override,
        }
    }
}

impl Default for MonitorEngine {
    fn default() -> Self {
        Self::new(&MonitorConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;

    fn small_engine(sample_count: usize) -> MonitorEngine {
        let config = MonitorConfig {
            calibration: CalibrationConfig { sample_count },
            ..MonitorConfig::default()
        };
        MonitorEngine::new(&config)
    }

    fn nominal(tick: i64) -> Reading {
        Reading::new(tick, 5.0, 35.0, 0.5)
    }

    #[test]
    fn test_calibration_ticks_emit_nothing() {
        let mut engine = small_engine(5);
        for i in 0..4 {
            let out = engine.process(&nominal(i)).expect("finite reading");
            assert!(out.metrics.is_none());
            assert!(!out.calibration_completed);
            assert_eq!(out.state, OperatingState::Calibrating);
        }
        let out = engine.process(&nominal(4)).expect("finite reading");
        assert!(out.calibration_completed);
        assert!(out.metrics.is_none());
        assert_eq!(out.state, OperatingState::Normal);
        assert_eq!(engine.calibration_progress(), (5, 5));

        let out = engine.process(&nominal(5)).expect("finite reading");
        let metrics = out.metrics.expect("post-calibration tick");
        assert_eq!(metrics.tick, 6);
        assert_eq!(metrics.state, OperatingState::Normal);
    }

    #[test]
    fn test_non_finite_reading_rejected_without_side_effects() {
        let mut engine = small_engine(5);
        let err = engine
            .process(&Reading::new(3, 5.0, f64::NAN, 0.5))
            .expect_err("NaN temperature");
        match err {
            EngineError::InvalidReading { tick, channel, .. } => {
                assert_eq!(tick, 3);
                assert_eq!(channel, "temperature");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.calibration_progress(), (0, 5));
    }

    #[test]
    fn test_overflowing_health_index_rejected_without_side_effects() {
        let mut config = MonitorConfig::default();
        config.calibration.sample_count = 5;
        config.health_index.current_scale = 1e-300;
        config.health_index.temperature_scale = 1e-300;
        assert!(config.validate().is_ok());
        let mut engine = MonitorEngine::new(&config);

        // +inf current load, -inf temperature load
        let err = engine
            .process(&Reading::new(9, 1e300, -1e300, 0.5))
            .expect_err("NaN health index");
        match err {
            EngineError::InvalidReading { tick, channel, value } => {
                assert_eq!(tick, 9);
                assert_eq!(channel, "health_index");
                assert!(value.is_nan());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(engine.tick(), 0);
        assert_eq!(engine.snapshot().smoothed, None);
        assert_eq!(engine.calibration_progress(), (0, 5));
    }

    #[test]
    fn test_force_repair_while_calibrating_yields_to_calibration() {
        let mut engine = small_engine(3);
        engine.process(&nominal(0)).expect("finite reading");
        engine.force_repair();
        assert_eq!(engine.state(), OperatingState::Repair);
        assert!(!engine.snapshot().repair_override);

        engine.process(&nominal(1)).expect("finite reading");
        let out = engine.process(&nominal(2)).expect("finite reading");
        assert!(out.calibration_completed);
        assert_eq!(engine.state(), OperatingState::Normal);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut engine = small_engine(2);
        engine.process(&nominal(0)).expect("finite reading");
        let json = serde_json::to_string(&engine.snapshot()).expect("serializable");
        assert!(json.contains("\"state\":\"Calibrating\""));
        assert!(json.contains("\"calibration_collected\":1"));
    }
}
