//! boostlab: gradient-boosted tree training pipeline.
//!
//! Turns an uploaded table into a trained, evaluated GBDT model: column type
//! inference and a reproducible feature transform, a stratified train/test
//! split, grid search with k-fold cross-validation and early stopping, a final
//! fit, and held-out evaluation with feature importance and a lift chart.
//!
//! # Key Types
//!
//! - [`TrainingOrchestrator`] - Runs a [`TrainRequest`] through every phase
//! - [`GBDTModel`] / [`BoosterParams`] - The boosted-tree model and its parameters
//! - [`Objective`] / [`Metric`] - Training objectives and evaluation metrics
//! - [`Dataset`] - Column-oriented input table
//!
//! # Running a request
//!
//! Collaborators (dataset source, status and progress sinks, result store,
//! model sink) are injected as trait objects, see [`pipeline`]. The
//! [`store`] module has in-memory and filesystem implementations.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod explainability;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod repr;
pub mod store;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{PipelineSettings, TrainRequest};
pub use error::{Result, TrainingError};

pub use model::{BoosterParams, GBDTModel};

pub use training::{Metric, MetricFn, Objective, ObjectiveFn, ParamGrid, ParamSet};

pub use data::{Cell, Column, Dataset};

pub use pipeline::{Collaborators, RunStatus, TrainingOrchestrator, TrainingResult};

pub use utils::Parallelism;
