//! Held-out evaluation of a fitted model.
//!
//! Produces the primary metric of the objective, a few secondary metrics,
//! feature importance keyed by feature name and a lift chart.

pub mod lift;

use std::collections::BTreeMap;

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::explainability::{IMPORTANCE_PREFERENCE, ImportanceType, importance_with_fallback};
use crate::model::GBDTModel;
use crate::training::{Metric, MetricFn};

pub use lift::{LiftBin, lift_chart};

/// Everything computed on the held-out rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Primary metric of the objective (AUC for binary classification).
    pub metric: Metric,
    pub score: f64,
    /// Primary and secondary metrics by name.
    pub metrics: BTreeMap<String, f64>,
    pub importance_type: ImportanceType,
    /// Every feature by name; features never split on score 0.
    pub feature_importance: BTreeMap<String, f64>,
    pub lift_chart: Vec<LiftBin>,
    /// Predictions on the objective's output scale, in held-out row order.
    pub predictions: Vec<f32>,
}

impl Evaluation {
    /// Feature names ordered by descending importance (ties by name).
    pub fn ranked_features(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, &score)| (name.as_str(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Metrics reported for an objective, primary first.
fn reported_metrics(model: &GBDTModel) -> &'static [Metric] {
    if model.objective().is_classification() {
        &[Metric::Auc, Metric::LogLoss, Metric::Accuracy]
    } else {
        &[Metric::Rmse, Metric::Mae]
    }
}

/// Evaluate `model` on held-out rows.
///
/// # Errors
///
/// [`TrainingError::TrainingFailure`] if the matrix width does not match the
/// model or the target length does not match the rows.
pub fn evaluate(
    model: &GBDTModel,
    features: ArrayView2<f32>,
    targets: ArrayView1<f32>,
    feature_names: &[String],
    lift_bins: usize,
) -> Result<Evaluation, TrainingError> {
    if targets.len() != features.nrows() {
        return Err(TrainingError::failure(format!(
            "{} targets for {} evaluation rows",
            targets.len(),
            features.nrows()
        )));
    }
    let predictions = model.predict(features)?.to_vec();
    let targets = targets.to_vec();

    let metric = model.params().metric();
    let score = metric.compute(&predictions, &targets);
    let mut metrics = BTreeMap::from([(metric.name().to_string(), score)]);
    for m in reported_metrics(model) {
        metrics
            .entry(m.name().to_string())
            .or_insert_with(|| m.compute(&predictions, &targets));
    }

    let importance = importance_with_fallback(model.forest(), model.n_features(), &IMPORTANCE_PREFERENCE);
    let lift_chart = lift_chart(&predictions, &targets, lift_bins);

    tracing::debug!(
        metric = %metric,
        score,
        importance = %importance.kind(),
        lift_bins = lift_chart.len(),
        "held-out evaluation"
    );

    Ok(Evaluation {
        metric,
        score,
        metrics,
        importance_type: importance.kind(),
        feature_importance: importance.to_named(Some(feature_names)),
        lift_chart,
        predictions,
    })
}
