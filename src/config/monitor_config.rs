//! Monitor Configuration - every engine constant as an operator-tunable TOML value
//!
//! Each struct implements `Default` with the built-in constants from
//! [`super::defaults`], so a missing file or a missing section never changes
//! behaviour.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable holding an explicit config path.
pub const CONFIG_ENV_VAR: &str = "EDGE_PHM_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "edge_phm.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitored asset.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$EDGE_PHM_CONFIG`
/// 2. `./edge_phm.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Tick scheduling
    #[serde(default)]
    pub engine: EngineConfig,

    /// Health index formula
    #[serde(default)]
    pub health_index: HealthIndexConfig,

    /// Calibration window
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Trend smoothing
    #[serde(default)]
    pub smoothing: SmoothingConfig,

    /// Concept drift detector
    #[serde(default)]
    pub drift: DriftConfig,

    /// Time-to-failure regressor
    #[serde(default)]
    pub regression: RegressionConfig,

    /// Adaptive baseline and state thresholds
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Output streams and command markers
    #[serde(default)]
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$EDGE_PHM_CONFIG` environment variable
    /// 2. `./edge_phm.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./edge_phm.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings (with a suggestion when one is
    /// close enough) and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Monitor config saved");
        Ok(())
    }

    /// Validate all parameters for internal consistency.
    ///
    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.engine.tick_interval_ms == 0 {
            errors.push("engine.tick_interval_ms must be > 0".to_string());
        }

        let hi = &self.health_index;
        for (name, weight) in [
            ("health_index.current_weight", hi.current_weight),
            ("health_index.temperature_weight", hi.temperature_weight),
            ("health_index.vibration_weight", hi.vibration_weight),
        ] {
            Self::check_finite_non_negative(weight, name, &mut errors);
        }
        for (name, scale) in [
            ("health_index.current_scale", hi.current_scale),
            ("health_index.temperature_scale", hi.temperature_scale),
            ("health_index.vibration_scale", hi.vibration_scale),
        ] {
            Self::check_positive(scale, name, &mut errors);
        }

        if self.calibration.sample_count < 2 {
            errors.push(format!(
                "calibration.sample_count must be >= 2 (got {})",
                self.calibration.sample_count
            ));
        }

        let alpha = self.smoothing.alpha;
        if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
            errors.push(format!("smoothing.alpha must be in (0, 1] (got {alpha})"));
        }

        let delta = self.drift.delta;
        if !delta.is_finite() || delta <= 0.0 || delta >= 1.0 {
            errors.push(format!("drift.delta must be in (0, 1) (got {delta})"));
        }
        if self.drift.min_window_length == 0 {
            errors.push("drift.min_window_length must be > 0".to_string());
        }
        if self.drift.max_buckets < 2 {
            errors.push(format!(
                "drift.max_buckets must be >= 2 (got {})",
                self.drift.max_buckets
            ));
        }

        Self::check_positive(self.regression.learning_rate, "regression.learning_rate", &mut errors);
        Self::check_positive(self.regression.ttf_horizon, "regression.ttf_horizon", &mut errors);

        let rate = self.baseline.adaptation_rate;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            errors.push(format!("baseline.adaptation_rate must be in [0, 1] (got {rate})"));
        }
        Self::check_positive(
            self.baseline.deviation_multiplier,
            "baseline.deviation_multiplier",
            &mut errors,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        // NaN fails every comparison
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name} must be finite and > 0 (got {value})"));
        }
    }

    fn check_finite_non_negative(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() || value < 0.0 {
            errors.push(format!("{name} must be finite and >= 0 (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Engine Config
// ============================================================================

/// Tick scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between ticks (ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Progress log cadence (processed readings).
    #[serde(default = "default_progress_log_every")]
    pub progress_log_every: u64,
}

fn default_tick_interval_ms() -> u64 { defaults::TICK_INTERVAL_MS }
fn default_progress_log_every() -> u64 { defaults::PROGRESS_LOG_EVERY }

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_log_every: default_progress_log_every(),
        }
    }
}

// ============================================================================
// Health Index Config
// ============================================================================

/// Weights and normalization scales of the health index.
///
/// `hi = clamp(1 - (wc*current/sc + wt*temperature/st + wv*vibration/sv), 0, 1)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIndexConfig {
    #[serde(default = "default_current_weight")]
    pub current_weight: f64,
    #[serde(default = "default_current_scale")]
    pub current_scale: f64,
    #[serde(default = "default_temperature_weight")]
    pub temperature_weight: f64,
    #[serde(default = "default_temperature_scale")]
    pub temperature_scale: f64,
    #[serde(default = "default_vibration_weight")]
    pub vibration_weight: f64,
    #[serde(default = "default_vibration_scale")]
    pub vibration_scale: f64,
}

fn default_current_weight() -> f64 { defaults::HI_CURRENT_WEIGHT }
fn default_current_scale() -> f64 { defaults::HI_CURRENT_SCALE }
fn default_temperature_weight() -> f64 { defaults::HI_TEMPERATURE_WEIGHT }
fn default_temperature_scale() -> f64 { defaults::HI_TEMPERATURE_SCALE }
fn default_vibration_weight() -> f64 { defaults::HI_VIBRATION_WEIGHT }
fn default_vibration_scale() -> f64 { defaults::HI_VIBRATION_SCALE }

impl Default for HealthIndexConfig {
    fn default() -> Self {
        Self {
            current_weight: default_current_weight(),
            current_scale: default_current_scale(),
            temperature_weight: default_temperature_weight(),
            temperature_scale: default_temperature_scale(),
            vibration_weight: default_vibration_weight(),
            vibration_scale: default_vibration_scale(),
        }
    }
}

// ============================================================================
// Calibration Config
// ============================================================================

/// Calibration window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Raw health index samples collected before the baseline is computed.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
}

fn default_sample_count() -> usize { defaults::CALIBRATION_COUNT }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
        }
    }
}

// ============================================================================
// Smoothing Config
// ============================================================================

/// Exponential smoothing of the health index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Weight of the newest sample, in (0, 1].
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_alpha() -> f64 { defaults::SMOOTHING_ALPHA }

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
        }
    }
}

// ============================================================================
// Drift Config
// ============================================================================

/// Adaptive-window concept drift detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Confidence parameter; smaller values make the detector less sensitive.
    #[serde(default = "default_delta")]
    pub delta: f64,

    /// Minimum observations on each side of a candidate cut.
    #[serde(default = "default_min_window_length")]
    pub min_window_length: usize,

    /// Observations before the first cut is tested.
    #[serde(default = "default_grace_period")]
    pub grace_period: usize,

    /// Buckets kept per size level before two are merged.
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
}

fn default_delta() -> f64 { defaults::DRIFT_DELTA }
fn default_min_window_length() -> usize { defaults::DRIFT_MIN_WINDOW_LENGTH }
fn default_grace_period() -> usize { defaults::DRIFT_GRACE_PERIOD }
fn default_max_buckets() -> usize { defaults::DRIFT_MAX_BUCKETS }

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            min_window_length: default_min_window_length(),
            grace_period: default_grace_period(),
            max_buckets: default_max_buckets(),
        }
    }
}

// ============================================================================
// Regression Config
// ============================================================================

/// Online time-to-failure model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// SGD step size for weights and bias.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Ticks mapped to a model output of zero.
    #[serde(default = "default_ttf_horizon")]
    pub ttf_horizon: f64,
}

fn default_learning_rate() -> f64 { defaults::REGRESSION_LEARNING_RATE }
fn default_ttf_horizon() -> f64 { defaults::TTF_HORIZON }

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            ttf_horizon: default_ttf_horizon(),
        }
    }
}

// ============================================================================
// Baseline Config
// ============================================================================

/// Adaptive baseline tracking and state thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Weight of the smoothed index in each baseline update.
    #[serde(default = "default_adaptation_rate")]
    pub adaptation_rate: f64,

    /// Sigma multiplier for the Failure / Repair bands.
    #[serde(default = "default_deviation_multiplier")]
    pub deviation_multiplier: f64,
}

fn default_adaptation_rate() -> f64 { defaults::BASELINE_ADAPTATION_RATE }
fn default_deviation_multiplier() -> f64 { defaults::DEVIATION_MULTIPLIER }

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            adaptation_rate: default_adaptation_rate(),
            deviation_multiplier: default_deviation_multiplier(),
        }
    }
}

// ============================================================================
// Output Config
// ============================================================================

/// Output stream locations and command marker directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Append-only metrics CSV.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,

    /// Append-only drift CSV.
    #[serde(default = "default_drift_path")]
    pub drift_path: PathBuf,

    /// Directory watched for `recalibrate.flag` / `repair.flag`.
    #[serde(default = "default_flag_dir")]
    pub flag_dir: PathBuf,
}

fn default_metrics_path() -> PathBuf { PathBuf::from(defaults::METRICS_PATH) }
fn default_drift_path() -> PathBuf { PathBuf::from(defaults::DRIFT_PATH) }
fn default_flag_dir() -> PathBuf { PathBuf::from(defaults::FLAG_DIR) }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_path: default_metrics_path(),
            drift_path: default_drift_path(),
            flag_dir: default_flag_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration.sample_count, 200);
        assert!((config.drift.delta - 0.002).abs() < f64::EPSILON);
        assert!((config.smoothing.alpha - 0.15).abs() < f64::EPSILON);
        assert!((config.regression.learning_rate - 0.01).abs() < f64::EPSILON);
        assert!((config.baseline.adaptation_rate - 0.01).abs() < f64::EPSILON);
        assert!((config.baseline.deviation_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.engine.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
[smoothing]
alpha = 0.3
"#,
        )
        .expect("valid config");
        assert!((config.smoothing.alpha - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.calibration.sample_count, 200);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = MonitorConfig::default();
        config.smoothing.alpha = 0.0;
        config.drift.delta = 1.5;
        config.calibration.sample_count = 1;
        config.baseline.deviation_multiplier = f64::NAN;

        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MonitorConfig::default();
        let text = config.to_toml().expect("serializable");
        let parsed = MonitorConfig::from_toml_str(&text).expect("parses back");
        assert_eq!(parsed, config);
    }
}
