//! Run sinks.
//!
//! - [`MemorySink`]: keeps runs in memory, for tests and development
//! - [`JsonLinesSink`]: appends one JSON object per run to a file

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesSink;
pub use memory::{MemorySink, RecordedRun};
