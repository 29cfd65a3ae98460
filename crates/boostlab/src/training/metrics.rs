//! Evaluation metrics.
//!
//! All metrics take predictions on the output scale (probabilities for
//! binary classification) and targets of the same length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A metric over predictions and targets.
pub trait MetricFn {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64;

    fn higher_is_better(&self) -> bool;

    fn name(&self) -> &'static str;
}

// =============================================================================
// LogLoss (Binary Cross-Entropy)
// =============================================================================

/// Binary cross-entropy: -mean(y*log(p) + (1-y)*log(1-p))
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLoss;

impl MetricFn for LogLoss {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }
        const EPS: f64 = 1e-15;
        let sum: f64 = predictions
            .iter()
            .zip(targets)
            .map(|(&p, &y)| {
                let p = (p as f64).clamp(EPS, 1.0 - EPS);
                let y = y as f64;
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum();
        sum / predictions.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "logloss"
    }
}

// =============================================================================
// Accuracy
// =============================================================================

/// Share of rows where `p >= 0.5` matches the label.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl MetricFn for Accuracy {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }
        let correct = predictions
            .iter()
            .zip(targets)
            .filter(|&(&p, &y)| (p >= 0.5) == (y > 0.5))
            .count();
        correct as f64 / predictions.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "accuracy"
    }
}

// =============================================================================
// AUC
// =============================================================================

/// Area under the ROC curve via rank statistics. Tied predictions share the
/// average rank. Returns 0.5 when only one class is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auc;

impl MetricFn for Auc {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        compute_auc(predictions, targets)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "auc"
    }
}

fn compute_auc(predictions: &[f32], labels: &[f32]) -> f64 {
    let n = predictions.len();

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| predictions[b].total_cmp(&predictions[a]));

    let n_pos = labels.iter().filter(|&&l| l > 0.5).count();
    let n_neg = n - n_pos;

    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;

    while i < n {
        let mut j = i + 1;
        while j < n && predictions[indices[i]] == predictions[indices[j]] {
            j += 1;
        }

        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let positives = indices[i..j].iter().filter(|&&idx| labels[idx] > 0.5).count();
        rank_sum_pos += avg_rank * positives as f64;

        i = j;
    }

    let n_pos_f = n_pos as f64;
    let n_neg_f = n_neg as f64;
    let sum_ascending_ranks = n_pos_f * (n as f64 + 1.0) - rank_sum_pos;

    (sum_ascending_ranks - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg_f)
}

// =============================================================================
// Regression
// =============================================================================

/// Root mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl MetricFn for Rmse {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }
        let sse: f64 = predictions
            .iter()
            .zip(targets)
            .map(|(&p, &y)| {
                let d = p as f64 - y as f64;
                d * d
            })
            .sum();
        (sse / predictions.len() as f64).sqrt()
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl MetricFn for Mae {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }
        let sae: f64 = predictions
            .iter()
            .zip(targets)
            .map(|(&p, &y)| (p as f64 - y as f64).abs())
            .sum();
        sae / predictions.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}

// =============================================================================
// Metric
// =============================================================================

/// Metric selector used in configuration and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Auc,
    LogLoss,
    Accuracy,
    Rmse,
    Mae,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Auc,
        Metric::LogLoss,
        Metric::Accuracy,
        Metric::Rmse,
        Metric::Mae,
    ];

    fn inner(self) -> &'static dyn MetricFn {
        match self {
            Metric::Auc => &Auc,
            Metric::LogLoss => &LogLoss,
            Metric::Accuracy => &Accuracy,
            Metric::Rmse => &Rmse,
            Metric::Mae => &Mae,
        }
    }

    /// Strict improvement test. NaN never improves on anything.
    #[inline]
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        if self.higher_is_better() {
            candidate > incumbent
        } else {
            candidate < incumbent
        }
    }
}

impl MetricFn for Metric {
    fn compute(&self, predictions: &[f32], targets: &[f32]) -> f64 {
        self.inner().compute(predictions, targets)
    }

    fn higher_is_better(&self) -> bool {
        self.inner().higher_is_better()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unsupported metric '{s}'"))
    }
}
