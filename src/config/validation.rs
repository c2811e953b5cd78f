//! Config validation: unknown-key detection with Levenshtein suggestions
//! and advisory range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, "; did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for MonitorConfig.
///
/// Maintained by hand to match the struct hierarchy in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [engine]
        "engine",
        "engine.tick_interval_ms",
        "engine.progress_log_every",
        // [health_index]
        "health_index",
        "health_index.current_weight",
        "health_index.current_scale",
        "health_index.temperature_weight",
        "health_index.temperature_scale",
        "health_index.vibration_weight",
        "health_index.vibration_scale",
        // [calibration]
        "calibration",
        "calibration.sample_count",
        // [smoothing]
        "smoothing",
        "smoothing.alpha",
        // [drift]
        "drift",
        "drift.delta",
        "drift.min_window_length",
        "drift.grace_period",
        "drift.max_buckets",
        // [regression]
        "regression",
        "regression.learning_rate",
        "regression.ttf_horizon",
        // [baseline]
        "baseline",
        "baseline.adaptation_rate",
        "baseline.deviation_multiplier",
        // [output]
        "output",
        "output.metrics_path",
        "output.drift_path",
        "output.flag_dir",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails on unknown keys; parse errors are left for serde to report.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(&key, &known);
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Advisory Range Checks
// ============================================================================

/// Flag settings that are legal but unlikely to be intended.
///
/// Hard violations are reported by [`super::MonitorConfig::validate`]; this
/// only produces warnings.
pub fn validate_operating_ranges(config: &super::MonitorConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let hi = &config.health_index;
    let weight_sum = hi.current_weight + hi.temperature_weight + hi.vibration_weight;
    if (weight_sum - 1.0).abs() > 1e-6 {
        warnings.push(ValidationWarning {
            field: "health_index".to_string(),
            message: format!(
                "health_index weights sum to {weight_sum:.3} (expected 1.0); full-scale readings will not map to a health index of 0"
            ),
            suggestion: None,
        });
    }

    let drift = &config.drift;
    if drift.grace_period < 2 * drift.min_window_length {
        warnings.push(ValidationWarning {
            field: "drift.grace_period".to_string(),
            message: format!(
                "drift.grace_period ({}) is below 2 x min_window_length ({}); no cut can be tested until the window reaches {}",
                drift.grace_period,
                drift.min_window_length,
                2 * drift.min_window_length
            ),
            suggestion: None,
        });
    }

    if config.engine.tick_interval_ms < 50 {
        warnings.push(ValidationWarning {
            field: "engine.tick_interval_ms".to_string(),
            message: format!(
                "engine.tick_interval_ms = {} will poll the reading source more than 20 times per second",
                config.engine.tick_interval_ms
            ),
            suggestion: None,
        });
    }

    if config.calibration.sample_count < 30 {
        warnings.push(ValidationWarning {
            field: "calibration.sample_count".to_string(),
            message: format!(
                "calibration.sample_count = {} gives a noisy baseline sigma",
                config.calibration.sample_count
            ),
            suggestion: None,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("alpha", "alpha"), 0);
        assert_eq!(levenshtein("alpah", "alpha"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("delta", ""), 5);
    }

    #[test]
    fn test_walk_nested_keys() {
        let value: toml::Value = "[drift]\ndelta = 0.01\n".parse().expect("valid toml");
        let keys = walk_toml_keys(&value, "");
        assert_eq!(keys, vec!["drift".to_string(), "drift.delta".to_string()]);
    }
}
