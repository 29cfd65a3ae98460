//! Documents produced by a run.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::TrainingError;
use crate::evaluation::Evaluation;
use crate::model::GBDTModel;
use crate::preprocess::{ColumnTypes, PipelineStep, TargetEncoding, TransformArtifact};
use crate::preprocess::classify::DATETIME_FORMAT;
use crate::training::{CandidateResult, Metric, Objective, ParamGrid, ParamSet, TuningOutcome};

/// Shape and quality summary of the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub n_rows: usize,
    pub n_columns: usize,
    pub missing_counts: BTreeMap<String, usize>,
    pub column_types: ColumnTypes,
    pub target_column: String,
    /// Rows per label; empty for regression targets.
    pub target_distribution: BTreeMap<String, usize>,
}

impl DatasetInfo {
    pub fn describe(dataset: &Dataset, target: &str, column_types: &ColumnTypes, objective: Objective) -> Self {
        let missing_counts = dataset
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.missing_count()))
            .collect();

        let mut target_distribution = BTreeMap::new();
        if objective.is_classification()
            && let Some(column) = dataset.column(target)
        {
            for label in column.cells().iter().filter_map(|c| c.category_string(DATETIME_FORMAT)) {
                *target_distribution.entry(label).or_insert(0) += 1;
            }
        }

        Self {
            n_rows: dataset.n_rows(),
            n_columns: dataset.n_columns(),
            missing_counts,
            column_types: column_types.clone(),
            target_column: target.to_string(),
            target_distribution,
        }
    }
}

/// Everything needed to reproduce the feature transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingInfo {
    pub column_types: ColumnTypes,
    pub transform: TransformArtifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_encoding: Option<TargetEncoding>,
    pub feature_names: Vec<String>,
    pub pipeline: Vec<PipelineStep>,
}

/// Record of the hyperparameter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningInfo {
    /// `"grid_search"`, or `"defaults"` when tuning was off.
    pub method: String,
    pub grid: ParamGrid,
    pub metric: Metric,
    pub cv_folds: usize,
    pub early_stopping_rounds: u32,
    pub max_rounds: u32,
    pub n_candidates: usize,
    pub candidates: Vec<CandidateResult>,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub best_score_std: f64,
    pub best_rounds: u32,
}

impl TuningInfo {
    pub fn from_outcome(
        method: &str,
        grid: ParamGrid,
        cv_folds: usize,
        early_stopping_rounds: u32,
        max_rounds: u32,
        outcome: &TuningOutcome,
    ) -> Self {
        Self {
            method: method.to_string(),
            grid,
            metric: outcome.metric,
            cv_folds,
            early_stopping_rounds,
            max_rounds,
            n_candidates: outcome.n_candidates,
            candidates: outcome.candidates.clone(),
            best_params: outcome.best_params.clone(),
            best_score: outcome.best_score,
            best_score_std: outcome.best_score_std,
            best_rounds: outcome.best_rounds,
        }
    }
}

/// Final output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub run_id: String,
    pub model_name: String,
    pub objective: Objective,
    /// Winning grid values (or the defaults when tuning was off).
    pub best_params: ParamSet,
    /// Base parameters merged with `best_params`, as used for the final fit.
    pub final_params: ParamSet,
    pub n_rounds: u32,
    pub cv_score: f64,
    pub cv_score_std: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub evaluation: Evaluation,
    pub model: GBDTModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    pub transform: TransformArtifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_encoding: Option<TargetEncoding>,
}

impl TrainingResult {
    /// Transform new data with the stored artifacts and predict.
    ///
    /// Predictions are on the objective's output scale (probabilities for
    /// binary classification). The dataset only needs the feature columns.
    pub fn predict(&self, dataset: &Dataset) -> Result<Array1<f32>, TrainingError> {
        let features = self.transform.transform(dataset)?;
        self.model.predict(features.view())
    }

    /// Held-out value of the tuning metric.
    pub fn test_score(&self) -> f64 {
        self.evaluation.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{ImputationPolicy, classify_columns};
    use crate::testing::synthetic_mixed_dataset;

    #[test]
    fn describe_counts_missing_and_labels() {
        let ds = synthetic_mixed_dataset(40, 3);
        let features: Vec<String> = ["num_a", "num_b", "cat_a", "cat_b"].map(String::from).to_vec();
        let c = classify_columns(&ds, &features).unwrap();
        let info = DatasetInfo::describe(&ds, "target", &c.groups, Objective::BinaryLogistic);
        assert_eq!(info.n_rows, 40);
        assert_eq!(info.n_columns, 5);
        assert_eq!(info.missing_counts["num_b"], 5);
        assert_eq!(info.target_distribution["1"], 20);
        assert_eq!(info.target_distribution["0"], 20);

        let info = DatasetInfo::describe(&ds, "target", &c.groups, Objective::SquaredError);
        assert!(info.target_distribution.is_empty());

        let (transform, _) = crate::preprocess::TransformArtifact::fit_transform(&c, ImputationPolicy::default());
        let pre = PreprocessingInfo {
            column_types: c.groups.clone(),
            feature_names: transform.feature_names(),
            pipeline: transform.pipeline_definition(),
            transform,
            target_encoding: None,
        };
        let json = serde_json::to_value(&pre).unwrap();
        assert!(json.get("target_encoding").is_none());
        assert_eq!(json["feature_names"].as_array().map(Vec::len), Some(4));
    }
}
