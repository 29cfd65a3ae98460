//! Training orchestration.
//!
//! # Key Types
//!
//! - [`TrainingOrchestrator`] - Runs a [`TrainRequest`](crate::config::TrainRequest) through every phase
//! - [`RunStatus`] / [`PhaseTracker`] - The run state machine
//! - [`Collaborators`] - Injected dataset source, sinks and stores
//! - [`TrainingResult`] - Model, evaluation and artifacts of a completed run

pub mod collaborators;
pub mod orchestrator;
pub mod results;
pub mod status;

pub use collaborators::{
    Collaborators, DatasetSource, LogLevel, ModelSink, ProgressSink, ResultStore, StatusSink, StoreError, StoreResult,
};
pub use orchestrator::TrainingOrchestrator;
pub use results::{DatasetInfo, PreprocessingInfo, TrainingResult, TuningInfo};
pub use status::{PhaseTracker, RunStatus, TransitionError};
