//! Processing Pipeline Module
//!
//! Everything between the engine and the outside world:
//!
//! ```text
//! ReadingSource ──► ProcessingLoop ──► MonitorEngine ──► RecordSink
//!                        ▲
//!   FlagFileWatcher ─► CommandSender ─► CommandReceiver (drained per tick)
//! ```
//!
//! - [`source`]: where readings come from (CSV tail, stdin JSON, replay)
//! - [`sink`]: where metrics and drift records go (CSV, JSON lines, memory)
//! - [`commands`]: edge-triggered recalibrate / force-repair delivery
//! - [`processing_loop`]: the tick loop with cancellation and statistics

pub mod commands;
pub mod processing_loop;
pub mod sink;
pub mod source;

pub use commands::{command_channel, CommandReceiver, CommandSender, FlagFileWatcher};
pub use processing_loop::{LoopOutput, LoopStats, ProcessingLoop};
pub use sink::{CsvRecordSink, JsonLinesSink, MemorySink, RecordSink, SinkError};
pub use source::{CsvTailSource, ReadingEvent, ReadingSource, ReplaySource, StdinSource};
