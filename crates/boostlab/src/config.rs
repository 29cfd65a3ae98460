//! Run configuration.
//!
//! [`TrainRequest`] is what a caller submits (JSON, serde defaults for every
//! optional field). [`PipelineSettings`] holds the engine knobs that are not
//! part of a request.

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::preprocess::ImputationPolicy;
use crate::training::{MetricFn, Objective, ParamGrid, ParamSet};
use crate::utils::Parallelism;

// =============================================================================
// TrainRequest
// =============================================================================

/// A request to train one model.
///
/// # Example
///
/// ```
/// use boostlab::config::TrainRequest;
///
/// let request = TrainRequest::from_json_str(
///     r#"{"model_name": "churn", "dataset": "churn.csv",
///         "target_column": "churned", "feature_columns": ["age", "plan"]}"#,
/// )
/// .unwrap();
/// assert_eq!(request.cv_folds, 3);
/// assert!(request.tune_parameters);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(on(String, into))]
pub struct TrainRequest {
    pub model_name: String,

    /// Dataset identifier resolved by the dataset source.
    #[serde(alias = "csv_filename")]
    pub dataset: String,

    pub target_column: String,

    pub feature_columns: Vec<String>,

    /// Held-out fraction in (0, 1). Default: 0.2.
    #[serde(default = "defaults::test_size")]
    #[builder(default = defaults::test_size())]
    pub test_size: f64,

    /// Folds for cross-validation. Default: 3.
    #[serde(default = "defaults::cv_folds")]
    #[builder(default = defaults::cv_folds())]
    pub cv_folds: usize,

    /// Search the grid (true) or cross-validate the default parameters only.
    #[serde(default = "defaults::tune_parameters")]
    #[builder(default = defaults::tune_parameters())]
    pub tune_parameters: bool,

    /// Patience in rounds; 0 disables early stopping. Default: 50.
    #[serde(default = "defaults::early_stopping_rounds")]
    #[builder(default = defaults::early_stopping_rounds())]
    pub early_stopping_rounds: u32,

    #[serde(default)]
    #[builder(default)]
    pub objective: Objective,

    /// Grid to search. `None` with tuning on uses [`ParamGrid::default_grid`].
    #[serde(default, alias = "custom_param_grid", skip_serializing_if = "Option::is_none")]
    pub param_grid: Option<ParamGrid>,

    #[serde(default = "defaults::seed")]
    #[builder(default = defaults::seed())]
    pub seed: u64,
}

mod defaults {
    pub fn test_size() -> f64 {
        0.2
    }
    pub fn cv_folds() -> usize {
        3
    }
    pub fn tune_parameters() -> bool {
        true
    }
    pub fn early_stopping_rounds() -> u32 {
        50
    }
    pub fn seed() -> u64 {
        42
    }
}

impl TrainRequest {
    /// Parse a JSON request.
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidRequest`] for malformed JSON or missing fields.
    pub fn from_json_str(json: &str) -> Result<Self, TrainingError> {
        serde_json::from_str(json).map_err(|e| TrainingError::InvalidRequest(e.to_string()))
    }

    /// Check field ranges and the feature list.
    ///
    /// # Errors
    ///
    /// [`TrainingError::InvalidRequest`] describing the first problem found.
    pub fn validate(&self) -> Result<(), TrainingError> {
        let invalid = |msg: String| Err(TrainingError::InvalidRequest(msg));
        if self.target_column.is_empty() {
            return invalid("target_column must not be empty".into());
        }
        if self.feature_columns.is_empty() {
            return invalid("feature_columns must not be empty".into());
        }
        if self.feature_columns.contains(&self.target_column) {
            return invalid(format!(
                "target column '{}' cannot also be a feature",
                self.target_column
            ));
        }
        for (i, name) in self.feature_columns.iter().enumerate() {
            if self.feature_columns[..i].contains(name) {
                return invalid(format!("feature '{name}' listed more than once"));
            }
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return invalid(format!("test_size must be in (0, 1), got {}", self.test_size));
        }
        if self.cv_folds < 2 {
            return invalid(format!("cv_folds must be at least 2, got {}", self.cv_folds));
        }
        Ok(())
    }

    /// Fixed booster parameters every candidate is merged onto.
    pub fn base_params(&self, settings: &PipelineSettings) -> ParamSet {
        ParamSet::new()
            .with("objective", self.objective.name())
            .with("eval_metric", self.objective.default_metric().name())
            .with("seed", self.seed as i64)
            .with("max_bin", settings.max_bin)
            .with("nthread", -1)
    }
}

/// Parameters cross-validated when tuning is off.
pub fn default_params() -> ParamSet {
    ParamSet::new()
        .with("max_depth", 6)
        .with("learning_rate", 0.1)
        .with("subsample", 1.0)
        .with("colsample_bytree", 1.0)
        .with("gamma", 0)
        .with("min_child_weight", 1)
}

// =============================================================================
// PipelineSettings
// =============================================================================

/// Engine settings shared by every run.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PipelineSettings {
    /// Boosting-round ceiling while searching the grid. Default: 500.
    #[builder(default = 500)]
    pub max_rounds: u32,

    /// Boosting-round ceiling when tuning is off. Default: 200.
    #[builder(default = 200)]
    pub default_rounds: u32,

    /// Lift chart bins. Default: 10.
    #[builder(default = 10)]
    pub lift_bins: usize,

    /// Report tuning progress every this many candidates. Default: 5.
    #[builder(default = 5)]
    pub progress_every: usize,

    /// Histogram bins per feature. Default: 256.
    #[builder(default = 256)]
    pub max_bin: u32,

    /// Missing-value policy for numeric columns. Default: sentinel -9999.
    #[builder(default)]
    pub imputation: ImputationPolicy,

    /// Whether CV folds may train on the rayon pool. Default: parallel.
    #[builder(default)]
    pub parallelism: Parallelism,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
