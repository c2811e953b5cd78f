//! EdgePHM: adaptive edge analytics for rotating machinery
//!
//! Turns a stream of motor readings (current, temperature, vibration) into a
//! per-tick health index, trend, time-to-failure estimate, failure risk and
//! operating state, learning the asset's healthy envelope on the device.
//!
//! ## Architecture
//!
//! - **Analytics**: health index, EWMA smoother, ADWIN drift detector, online TTF regressor
//! - **Baseline**: calibrated mean/std of the health index with adaptive tracking
//! - **Engine**: per-tick orchestration and the operating state machine
//! - **Pipeline**: reading sources, record sinks, command delivery, tick loop

pub mod config;
pub mod types;
pub mod analytics;
pub mod baseline;
pub mod engine;
pub mod pipeline;

// Re-export configuration
pub use config::{ConfigError, MonitorConfig};

// Re-export commonly used types
pub use types::{
    Command, DriftEvent, HealthIndexSample, MetricsRecord, OperatingState, PendingCommands,
    Reading,
};

// Re-export analytics components
pub use analytics::{ConceptDriftDetector, HealthIndexModel, SignalSmoother, TtfRegressor};

// Re-export baseline components
pub use baseline::{Baseline, BaselineError, BaselineEstimator};

// Re-export the engine
pub use engine::{EngineError, EngineSnapshot, MonitorEngine, TickOutcome};
