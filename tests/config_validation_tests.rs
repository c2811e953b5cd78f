//! Config Validation Tests
//!
//! Typo detection on raw TOML, hard validation of parameter ranges, and the
//! advisory operating-range warnings. Exercised independently from the
//! engine.

use edge_phm::config::validation::{
    known_config_keys, suggest_correction, validate_operating_ranges, validate_unknown_keys,
};
use edge_phm::config::{ConfigError, MonitorConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_smoothing_alpha_warns_with_suggestion() {
    let toml_str = r#"
[smoothing]
alpah = 0.2
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("alpah"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("smoothing.alpha"));
    assert!(warnings[0].to_string().contains("did you mean 'smoothing.alpha'"));
}

#[test]
fn typo_in_drift_section_warns() {
    let toml_str = r#"
[drift]
detla = 0.002
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("drift.delta"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[engine]
tick_interval_ms = 500
progress_log_every = 120

[health_index]
current_weight = 0.4
current_scale = 10.0
temperature_weight = 0.3
temperature_scale = 100.0
vibration_weight = 0.3
vibration_scale = 10.0

[calibration]
sample_count = 200

[smoothing]
alpha = 0.15

[drift]
delta = 0.002
min_window_length = 5
grace_period = 10
max_buckets = 5

[regression]
learning_rate = 0.01
ttf_horizon = 1000.0

[baseline]
adaptation_rate = 0.01
deviation_multiplier = 2.0

[output]
metrics_path = "metrics_hi_ttf.csv"
drift_path = "metrics_drift.csv"
flag_dir = "."
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(
        warnings.is_empty(),
        "Valid config should produce 0 warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
    let config = MonitorConfig::from_toml_str(toml_str).expect("valid config");
    assert_eq!(config.engine.tick_interval_ms, 500);
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[telemetry]
endpoint = "http://localhost"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.iter().any(|w| w.field == "telemetry"));
    assert!(warnings.iter().any(|w| w.field == "telemetry.endpoint"));
}

#[test]
fn multiple_typos_all_warned() {
    let toml_str = r#"
[smoothing]
alpah = 0.2

[baseline]
adaptation_rat = 0.02
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2, "Expected 2 warnings for 2 typos");
}

#[test]
fn unknown_keys_do_not_fail_the_load() {
    let config = MonitorConfig::from_toml_str("[smoothing]\nalpah = 0.9\n")
        .expect("unknown keys only warn");
    // Misspelled key ignored, default kept
    assert_eq!(config.smoothing.alpha, MonitorConfig::default().smoothing.alpha);
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
    let config = MonitorConfig::from_toml_str("").expect("empty config uses defaults");
    assert_eq!(config, MonitorConfig::default());
}

#[test]
fn known_keys_set_is_complete() {
    let toml_str = MonitorConfig::default()
        .to_toml()
        .expect("Default config should serialize");
    let warnings = validate_unknown_keys(&toml_str);
    assert!(
        warnings.is_empty(),
        "Default config serialization should produce 0 unknown-key warnings, got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let known = known_config_keys();
    assert!(suggest_correction("zzz_completely_invalid_xyz_12345", &known).is_none());
}

// ============================================================================
// Hard Validation
// ============================================================================

fn validation_errors(toml_str: &str) -> Vec<String> {
    match MonitorConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn alpha_out_of_range_is_error() {
    let errors = validation_errors("[smoothing]\nalpha = 1.5\n");
    assert!(errors.iter().any(|e| e.contains("smoothing.alpha")));

    let errors = validation_errors("[smoothing]\nalpha = 0.0\n");
    assert!(errors.iter().any(|e| e.contains("smoothing.alpha")));
}

#[test]
fn alpha_of_one_is_valid() {
    let config = MonitorConfig::from_toml_str("[smoothing]\nalpha = 1.0\n").expect("valid");
    assert_eq!(config.smoothing.alpha, 1.0);
}

#[test]
fn all_violations_reported_together() {
    let errors = validation_errors(
        r#"
[calibration]
sample_count = 1

[drift]
delta = 1.0

[baseline]
deviation_multiplier = -1.0
"#,
    );
    assert_eq!(errors.len(), 3, "got {errors:?}");
    assert!(errors.iter().any(|e| e.contains("calibration.sample_count")));
    assert!(errors.iter().any(|e| e.contains("drift.delta")));
    assert!(errors.iter().any(|e| e.contains("baseline.deviation_multiplier")));
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = MonitorConfig::from_toml_str("[smoothing\nalpha = ").expect_err("broken toml");
    assert!(matches!(err, ConfigError::Parse(..)));
}

#[test]
fn load_from_file_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("edge_phm.toml");

    let mut config = MonitorConfig::default();
    config.calibration.sample_count = 50;
    config.drift.delta = 0.01;
    config.save_to_file(&path).expect("save");

    let loaded = MonitorConfig::load_from_file(&path).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = MonitorConfig::load_from_file(&dir.path().join("absent.toml"))
        .expect_err("missing file");
    assert!(matches!(err, ConfigError::Io(..)));
}

// ============================================================================
// Advisory Range Checks
// ============================================================================

#[test]
fn defaults_have_no_range_warnings() {
    let warnings = validate_operating_ranges(&MonitorConfig::default());
    assert!(
        warnings.is_empty(),
        "got: {:?}",
        warnings.iter().map(|w| &w.field).collect::<Vec<_>>()
    );
}

#[test]
fn unbalanced_weights_warn() {
    let mut config = MonitorConfig::default();
    config.health_index.vibration_weight = 0.5;
    let warnings = validate_operating_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "health_index"));
    // Still a legal configuration
    assert!(config.validate().is_ok());
}

#[test]
fn short_calibration_window_warns() {
    let mut config = MonitorConfig::default();
    config.calibration.sample_count = 10;
    let warnings = validate_operating_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "calibration.sample_count"));
}

#[test]
fn grace_period_below_two_min_windows_warns() {
    let mut config = MonitorConfig::default();
    config.drift.min_window_length = 20;
    config.drift.grace_period = 10;
    let warnings = validate_operating_ranges(&config);
    assert!(warnings.iter().any(|w| w.field == "drift.grace_period"));
}
