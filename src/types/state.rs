//! Operating state of the monitored asset

use serde::{Deserialize, Serialize};

/// State machine label produced by the monitor engine.
///
/// ```text
/// Calibrating ──► Normal ◄──► {Drift, Failure, Repair}
///                   ▲
///   (any) ──► Recalibrating ──┘   (after a fresh calibration window)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum OperatingState {
    /// Initial baseline window is still filling
    #[default]
    Calibrating,
    /// Smoothed health index inside the baseline band
    Normal,
    /// Distribution shift detected on the raw health index this tick
    Drift,
    /// Smoothed health index below the lower baseline band
    Failure,
    /// Smoothed health index above the upper band, or repair forced by operator
    Repair,
    /// Operator requested a new baseline; window is refilling
    Recalibrating,
}

impl OperatingState {
    /// Stable name written to the metrics stream
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingState::Calibrating => "Calibrating",
            OperatingState::Normal => "Normal",
            OperatingState::Drift => "Drift",
            OperatingState::Failure => "Failure",
            OperatingState::Repair => "Repair",
            OperatingState::Recalibrating => "Recalibrating",
        }
    }

    /// States in which the baseline keeps tracking the smoothed index
    pub fn adapts_baseline(&self) -> bool {
        matches!(self, OperatingState::Normal | OperatingState::Repair)
    }

    /// True while a calibration window is being collected
    pub fn is_calibrating(&self) -> bool {
        matches!(
            self,
            OperatingState::Calibrating | OperatingState::Recalibrating
        )
    }

    /// Parse from the stream name (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "calibrating" => Some(OperatingState::Calibrating),
            "normal" => Some(OperatingState::Normal),
            "drift" => Some(OperatingState::Drift),
            "failure" => Some(OperatingState::Failure),
            "repair" => Some(OperatingState::Repair),
            "recalibrating" => Some(OperatingState::Recalibrating),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for state in [
            OperatingState::Calibrating,
            OperatingState::Normal,
            OperatingState::Drift,
            OperatingState::Failure,
            OperatingState::Repair,
            OperatingState::Recalibrating,
        ] {
            assert_eq!(OperatingState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(OperatingState::from_str("Falha"), None);
    }

    #[test]
    fn test_adapts_baseline_only_in_normal_and_repair() {
        assert!(OperatingState::Normal.adapts_baseline());
        assert!(OperatingState::Repair.adapts_baseline());
        assert!(!OperatingState::Drift.adapts_baseline());
        assert!(!OperatingState::Failure.adapts_baseline());
        assert!(!OperatingState::Calibrating.adapts_baseline());
        assert!(!OperatingState::Recalibrating.adapts_baseline());
    }
}
