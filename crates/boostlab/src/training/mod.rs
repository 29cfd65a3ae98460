//! Training: objectives, metrics, tree growth, cross-validation and grid search.
//!
//! # Key Types
//!
//! - [`GBDTTrainer`] / [`BoostingSession`] - The boosting loop
//! - [`Objective`] / [`Metric`] - Losses and evaluation metrics
//! - [`ParamGrid`] / [`SearchSpace`] / [`GridSearch`] - Hyperparameter search
//! - [`cross_validate`] - K-fold CV with early stopping on the mean fold score

pub mod callback;
pub mod cv;
pub mod eval;
pub mod grower;
pub mod metrics;
pub mod objectives;
pub mod params;
pub mod search;
pub mod trainer;

pub use callback::EarlyStopping;
pub use cv::{CvOutcome, CvParams, cross_validate, fold_assignments};
pub use eval::EvalSet;
pub use metrics::{Metric, MetricFn};
pub use objectives::{GradsTuple, Objective, ObjectiveFn};
pub use params::{GridValues, ParamGrid, ParamSet, ParamValue, SearchSpace};
pub use search::{CandidateResult, GridSearch, TuningOutcome, TuningProgress};
pub use trainer::{BoostingSession, GBDTTrainer};
