//! System-wide default constants.
//!
//! Grouped by subsystem. Each value is the built-in default of the matching
//! `MonitorConfig` field.

// ============================================================================
// Engine
// ============================================================================

/// Interval between ticks (ms).
pub const TICK_INTERVAL_MS: u64 = 1_000;

/// Log a progress line every N processed readings.
pub const PROGRESS_LOG_EVERY: u64 = 60;

// ============================================================================
// Health Index
// ============================================================================

/// Weight of the normalized current in the health index.
pub const HI_CURRENT_WEIGHT: f64 = 0.4;
/// Normalization scale for current (A).
pub const HI_CURRENT_SCALE: f64 = 10.0;
/// Weight of the normalized temperature in the health index.
pub const HI_TEMPERATURE_WEIGHT: f64 = 0.3;
/// Normalization scale for temperature (°C).
pub const HI_TEMPERATURE_SCALE: f64 = 100.0;
/// Weight of the normalized vibration in the health index.
pub const HI_VIBRATION_WEIGHT: f64 = 0.3;
/// Normalization scale for vibration (mm/s).
pub const HI_VIBRATION_SCALE: f64 = 10.0;

// ============================================================================
// Calibration / Baseline
// ============================================================================

/// Samples in one calibration window.
pub const CALIBRATION_COUNT: usize = 200;

/// EWMA weight of the smoothed index when the baseline tracks it.
pub const BASELINE_ADAPTATION_RATE: f64 = 0.01;

/// Sigma multiplier for the Failure / Repair bands.
pub const DEVIATION_MULTIPLIER: f64 = 2.0;

// ============================================================================
// Smoothing
// ============================================================================

/// EWMA alpha for the health index trend.
pub const SMOOTHING_ALPHA: f64 = 0.15;

// ============================================================================
// Drift Detection
// ============================================================================

/// Confidence parameter of the adaptive window bound.
pub const DRIFT_DELTA: f64 = 0.002;

/// Minimum size of each sub-window considered for a cut.
pub const DRIFT_MIN_WINDOW_LENGTH: usize = 5;

/// Observations required before the detector starts testing cuts.
pub const DRIFT_GRACE_PERIOD: usize = 10;

/// Buckets kept per size level in the exponential histogram.
pub const DRIFT_MAX_BUCKETS: usize = 5;

// ============================================================================
// Regression
// ============================================================================

/// SGD learning rate of the time-to-failure model.
pub const REGRESSION_LEARNING_RATE: f64 = 0.01;

/// Ticks corresponding to a model output of zero.
///
/// `ttf = max(1, TTF_HORIZON * (1 - prediction))`
pub const TTF_HORIZON: f64 = 1_000.0;

// ============================================================================
// Output
// ============================================================================

/// Default metrics stream file.
pub const METRICS_PATH: &str = "metrics_hi_ttf.csv";

/// Default drift stream file.
pub const DRIFT_PATH: &str = "metrics_drift.csv";

/// Directory scanned for command marker files.
pub const FLAG_DIR: &str = ".";

/// Marker file requesting a recalibration.
pub const RECALIBRATE_FLAG_FILE: &str = "recalibrate.flag";

/// Marker file requesting a forced repair.
pub const REPAIR_FLAG_FILE: &str = "repair.flag";

// ============================================================================
// Input
// ============================================================================

/// Readings file tailed when no input is given on the command line.
pub const READINGS_PATH: &str = "live_readings.csv";
