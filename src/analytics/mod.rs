//! Edge Analytics Module
//!
//! Streaming building blocks fused by the monitor engine. Every component is
//! incremental: one call per tick, O(1) or O(log n) work, no history replay.
//!
//! ## Components
//!
//! - [`health_index`]: raw sensor channels → normalized health index in [0, 1]
//! - [`SignalSmoother`]: EWMA trend and its tick-over-tick derivative
//! - [`ConceptDriftDetector`]: adaptive-windowing change detector on the raw index
//! - [`TtfRegressor`]: online linear model for time-to-failure

pub mod health_index;
pub mod smoother;
pub mod drift;
pub mod regressor;

pub use health_index::HealthIndexModel;
pub use smoother::SignalSmoother;
pub use drift::ConceptDriftDetector;
pub use regressor::{TtfPrediction, TtfRegressor};
