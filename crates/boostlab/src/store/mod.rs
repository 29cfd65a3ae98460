//! Collaborator implementations.
//!
//! - [`MemoryStore`] - Every collaborator trait, in memory (tests, embedding)
//! - [`CsvDirectorySource`] / [`JsonFileStore`] / [`FileModelSink`] /
//!   [`JsonLinesProgressLog`] - Files under a working directory
//! - [`TracingProgressSink`] - Progress as `tracing` events

pub mod fs;
pub mod memory;

pub use fs::{CsvDirectorySource, FileModelSink, JsonFileStore, JsonLinesProgressLog, TracingProgressSink};
pub use memory::{MemoryStore, RunRecord};
