//! GBDT model: a trained forest with its parameters and metadata.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::explainability::{ExplainError, FeatureImportance, ImportanceType, compute_forest_importance};
use crate::repr::Forest;
use crate::training::{GBDTTrainer, Objective, ObjectiveFn};

use super::BoosterParams;

/// Model metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub n_features: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    /// Boosting rounds the model was fit with.
    pub n_rounds: u32,
}

/// High-level GBDT model with training, prediction and feature importance.
///
/// Access components via [`forest()`](Self::forest), [`meta()`](Self::meta),
/// and [`params()`](Self::params).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GBDTModel {
    forest: Forest,
    meta: ModelMeta,
    params: BoosterParams,
}

impl GBDTModel {
    /// Fit a model for exactly `n_rounds` boosting rounds.
    ///
    /// # Errors
    ///
    /// [`TrainingError::TrainingFailure`] if training cannot start (shape
    /// mismatch, empty data, targets outside the objective's domain).
    pub fn fit(
        features: ArrayView2<f32>,
        targets: ArrayView1<f32>,
        params: &BoosterParams,
        n_rounds: u32,
    ) -> Result<Self, TrainingError> {
        let forest = GBDTTrainer::new(params.clone()).train(features, targets, n_rounds)?;
        tracing::debug!(
            n_rows = features.nrows(),
            n_features = features.ncols(),
            n_trees = forest.n_trees(),
            "model fit"
        );
        Ok(Self {
            forest,
            meta: ModelMeta {
                n_features: features.ncols(),
                feature_names: None,
                n_rounds,
            },
            params: params.clone(),
        })
    }

    /// Create a model from all its parts.
    pub fn from_parts(forest: Forest, meta: ModelMeta, params: BoosterParams) -> Self {
        Self { forest, meta, params }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn objective(&self) -> Objective {
        self.params.objective
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    pub fn n_features(&self) -> usize {
        self.meta.n_features
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.meta.feature_names = Some(names);
        self
    }

    /// Drop per-node gain/cover statistics (smaller model files, no importance).
    pub fn without_node_stats(mut self) -> Self {
        self.forest = self.forest.without_stats();
        self
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Raw margins for a `(n_rows, n_features)` matrix.
    pub fn predict_margin(&self, features: ArrayView2<f32>) -> Result<Array1<f32>, TrainingError> {
        if features.ncols() != self.meta.n_features {
            return Err(TrainingError::failure(format!(
                "model expects {} features, got {}",
                self.meta.n_features,
                features.ncols()
            )));
        }
        Ok(self.forest.predict_margins(features))
    }

    /// Predictions on the objective's output scale (probabilities for
    /// `binary:logistic`).
    pub fn predict(&self, features: ArrayView2<f32>) -> Result<Array1<f32>, TrainingError> {
        let objective = self.objective();
        Ok(self.predict_margin(features)?.mapv_into(|m| objective.transform(m)))
    }

    // =========================================================================
    // Explainability
    // =========================================================================

    /// Per-feature importance scores, indexed by feature position.
    pub fn feature_importance(&self, kind: ImportanceType) -> Result<FeatureImportance, ExplainError> {
        compute_forest_importance(&self.forest, self.meta.n_features, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{random_dense_f32, synthetic_binary_targets};
    use ndarray::Array2;

    fn fitted() -> (GBDTModel, Array2<f32>) {
        let x = random_dense_f32(120, 3, 21, -1.0, 1.0);
        let y = synthetic_binary_targets(x.view(), 22, 0.1);
        let params = BoosterParams::builder().max_depth(3).build().unwrap();
        (GBDTModel::fit(x.view(), y.view(), &params, 10).unwrap(), x)
    }

    #[test]
    fn predictions_are_probabilities() {
        let (model, x) = fitted();
        assert_eq!(model.n_trees(), 10);
        assert_eq!(model.meta().n_rounds, 10);
        let probs = model.predict(x.view()).unwrap();
        assert_eq!(probs.len(), 120);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn rejects_wrong_width() {
        let (model, _) = fitted();
        let narrow = Array2::<f32>::zeros((4, 2));
        assert!(model.predict(narrow.view()).is_err());
    }

    #[test]
    fn importance_needs_node_stats() {
        let (model, _) = fitted();
        assert!(model.feature_importance(ImportanceType::Gain).is_ok());
        let stripped = model.without_node_stats();
        assert!(matches!(
            stripped.feature_importance(ImportanceType::Gain),
            Err(ExplainError::MissingNodeStats(ImportanceType::Gain))
        ));
        // Split counts only need the tree structure.
        assert!(stripped.feature_importance(ImportanceType::Split).is_ok());
    }
}
