//! Shared data structures for the edge monitoring pipeline
//!
//! - `Reading`: one raw sensor sample per tick (input boundary)
//! - `OperatingState`: the state machine label fused from all analytics
//! - `HealthIndexSample`, `MetricsRecord`, `DriftEvent`: per-tick outputs
//! - `Command`, `PendingCommands`: out-of-band operator signals

mod reading;
mod state;
mod records;
mod command;

pub use reading::*;
pub use state::*;
pub use records::*;
pub use command::*;
