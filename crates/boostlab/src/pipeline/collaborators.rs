//! Interfaces to everything outside the training core.
//!
//! The orchestrator only sees these traits, injected as trait objects through
//! [`Collaborators`]. Implementations live in [`crate::store`].

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::TrainingError;
use crate::model::GBDTModel;

use super::results::{DatasetInfo, PreprocessingInfo, TrainingResult, TuningInfo};
use super::status::RunStatus;

/// Result type for collaborator writes.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a persistence collaborator. Never aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Severity of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Resolves a dataset identifier.
pub trait DatasetSource: Send + Sync {
    /// # Errors
    ///
    /// [`TrainingError::DatasetNotFound`] when the identifier does not resolve.
    fn read(&self, identifier: &str) -> Result<Dataset, TrainingError>;
}

/// Receives every status transition of a run.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, run_id: &str, status: RunStatus) -> StoreResult<()>;
}

/// Receives human-readable progress messages. Must not fail.
pub trait ProgressSink: Send + Sync {
    fn log_progress(&self, run_id: &str, message: &str, level: LogLevel);
}

/// Persists run documents. Every method is an idempotent upsert.
pub trait ResultStore: Send + Sync {
    fn save_dataset_info(&self, run_id: &str, info: &DatasetInfo) -> StoreResult<()>;

    fn save_preprocessing_info(&self, run_id: &str, info: &PreprocessingInfo) -> StoreResult<()>;

    fn save_tuning_info(&self, run_id: &str, info: &TuningInfo) -> StoreResult<()>;

    fn save_result(&self, run_id: &str, result: &TrainingResult) -> StoreResult<()>;

    fn mark_failed(&self, run_id: &str, message: &str, phase: RunStatus) -> StoreResult<()>;
}

/// Stores the fitted model and returns where it went.
pub trait ModelSink: Send + Sync {
    fn write_model(&self, run_id: &str, model: &GBDTModel) -> StoreResult<String>;
}

/// Progress goes to both sinks.
impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
    fn log_progress(&self, run_id: &str, message: &str, level: LogLevel) {
        self.0.log_progress(run_id, message, level);
        self.1.log_progress(run_id, message, level);
    }
}

/// Everything a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub source: &'a dyn DatasetSource,
    pub status: &'a dyn StatusSink,
    pub progress: &'a dyn ProgressSink,
    pub store: &'a dyn ResultStore,
    pub models: &'a dyn ModelSink,
}

impl<'a> Collaborators<'a> {
    /// Use one object for every role (e.g. an in-memory store in tests).
    pub fn uniform<T>(all: &'a T) -> Self
    where
        T: DatasetSource + StatusSink + ProgressSink + ResultStore + ModelSink,
    {
        Self {
            source: all,
            status: all,
            progress: all,
            store: all,
            models: all,
        }
    }
}
