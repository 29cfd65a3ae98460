//! Error taxonomy for training runs.
//!
//! Every failure a run can hit maps onto one [`TrainingError`] variant. The
//! first five variants describe bad input (a caller can fix them by changing
//! the request or the dataset); [`TrainingError::TrainingFailure`] covers
//! everything that goes wrong inside the pipeline itself.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TrainingError> = std::result::Result<T, E>;

/// A failed training run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    /// The dataset identifier does not resolve to a readable dataset.
    #[error("dataset not found: {identifier}")]
    DatasetNotFound { identifier: String },

    /// A requested feature or target column is absent from the dataset.
    #[error("column not found: {column}")]
    ColumnNotFound { column: String },

    /// The target column has missing cells.
    #[error("target column '{column}' has {missing} missing value(s)")]
    MissingTarget { column: String, missing: usize },

    /// Too few rows (or too few rows in some class) for the requested split or folds.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The parameter grid failed validation. All problems are reported at once.
    #[error("invalid parameter grid: {}", .0.join("; "))]
    InvalidParameterGrid(Vec<String>),

    /// A request field is out of range or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other failure during training or evaluation.
    #[error("training failed: {0}")]
    TrainingFailure(String),
}

impl TrainingError {
    /// Whether this error was caused by caller input rather than the pipeline.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::TrainingFailure(_))
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatasetNotFound { .. } => "dataset_not_found",
            Self::ColumnNotFound { .. } => "column_not_found",
            Self::MissingTarget { .. } => "missing_target",
            Self::InsufficientData(_) => "insufficient_data",
            Self::InvalidParameterGrid(_) => "invalid_parameter_grid",
            Self::InvalidRequest(_) => "invalid_request",
            Self::TrainingFailure(_) => "training_failure",
        }
    }

    pub(crate) fn failure(message: impl std::fmt::Display) -> Self {
        Self::TrainingFailure(message.to_string())
    }
}

// =============================================================================
// Conversions from component errors
// =============================================================================

impl From<crate::model::ParamValidationError> for TrainingError {
    fn from(e: crate::model::ParamValidationError) -> Self {
        Self::failure(e)
    }
}

impl From<crate::model::PersistError> for TrainingError {
    fn from(e: crate::model::PersistError) -> Self {
        Self::failure(e)
    }
}

impl From<crate::explainability::ExplainError> for TrainingError {
    fn from(e: crate::explainability::ExplainError) -> Self {
        Self::failure(e)
    }
}

impl From<crate::data::CsvError> for TrainingError {
    fn from(e: crate::data::CsvError) -> Self {
        Self::failure(format!("cannot read dataset: {e}"))
    }
}

impl From<crate::pipeline::StoreError> for TrainingError {
    fn from(e: crate::pipeline::StoreError) -> Self {
        Self::failure(e)
    }
}
