//! Training objectives: gradients, base scores and output transforms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::metrics::Metric;

/// First and second order gradient of the loss for one row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradsTuple {
    pub grad: f32,
    pub hess: f32,
}

/// A differentiable training loss.
pub trait ObjectiveFn {
    /// Fill `grads` from raw margins and targets.
    fn compute_gradients(&self, margins: &[f32], targets: &[f32], grads: &mut [GradsTuple]);

    /// Constant initial margin minimizing the loss on `targets`.
    fn base_score(&self, targets: &[f32]) -> f32;

    /// Map a raw margin to the prediction scale.
    fn transform(&self, margin: f32) -> f32;

    /// Check that targets are in the objective's domain.
    fn validate_targets(&self, targets: &[f32]) -> Result<(), String>;
}

// =============================================================================
// Logistic Loss
// =============================================================================

/// Binary cross-entropy on log-odds margins.
///
/// - Gradient: `σ(pred) - y`
/// - Hessian: `σ(pred) * (1 - σ(pred))`, floored at `1e-6`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticLoss;

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl ObjectiveFn for LogisticLoss {
    fn compute_gradients(&self, margins: &[f32], targets: &[f32], grads: &mut [GradsTuple]) {
        const HESS_MIN: f32 = 1e-6;
        debug_assert_eq!(margins.len(), targets.len());
        for ((pair, &m), &y) in grads.iter_mut().zip(margins).zip(targets) {
            let p = sigmoid(m);
            pair.grad = p - y;
            pair.hess = (p * (1.0 - p)).max(HESS_MIN);
        }
    }

    fn base_score(&self, targets: &[f32]) -> f32 {
        if targets.is_empty() {
            return 0.0;
        }
        let mean = targets.iter().map(|&y| y as f64).sum::<f64>() / targets.len() as f64;
        let p = mean.clamp(1e-6, 1.0 - 1e-6);
        (p / (1.0 - p)).ln() as f32
    }

    #[inline]
    fn transform(&self, margin: f32) -> f32 {
        sigmoid(margin)
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), String> {
        match targets.iter().find(|&&y| y != 0.0 && y != 1.0) {
            Some(y) => Err(format!(
                "binary:logistic requires labels in {{0, 1}}, found {y}"
            )),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Squared Loss
// =============================================================================

/// Half squared error: gradient `pred - y`, hessian `1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredLoss;

impl ObjectiveFn for SquaredLoss {
    fn compute_gradients(&self, margins: &[f32], targets: &[f32], grads: &mut [GradsTuple]) {
        for ((pair, &m), &y) in grads.iter_mut().zip(margins).zip(targets) {
            pair.grad = m - y;
            pair.hess = 1.0;
        }
    }

    fn base_score(&self, targets: &[f32]) -> f32 {
        if targets.is_empty() {
            return 0.0;
        }
        (targets.iter().map(|&y| y as f64).sum::<f64>() / targets.len() as f64) as f32
    }

    #[inline]
    fn transform(&self, margin: f32) -> f32 {
        margin
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), String> {
        match targets.iter().find(|y| !y.is_finite()) {
            Some(y) => Err(format!("reg:squarederror requires finite targets, found {y}")),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Objective
// =============================================================================

/// Supported training objectives, named as in the request API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    #[default]
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "reg:squarederror")]
    SquaredError,
}

impl Objective {
    pub const ALL: [Objective; 2] = [Objective::BinaryLogistic, Objective::SquaredError];

    pub fn name(self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::SquaredError => "reg:squarederror",
        }
    }

    /// Whether splits and folds should stratify on the target.
    pub fn is_classification(self) -> bool {
        matches!(self, Objective::BinaryLogistic)
    }

    /// Metric used for tuning and held-out scoring when none is configured.
    pub fn default_metric(self) -> Metric {
        match self {
            Objective::BinaryLogistic => Metric::Auc,
            Objective::SquaredError => Metric::Rmse,
        }
    }

    fn inner(self) -> &'static dyn ObjectiveFn {
        match self {
            Objective::BinaryLogistic => &LogisticLoss,
            Objective::SquaredError => &SquaredLoss,
        }
    }
}

impl ObjectiveFn for Objective {
    fn compute_gradients(&self, margins: &[f32], targets: &[f32], grads: &mut [GradsTuple]) {
        self.inner().compute_gradients(margins, targets, grads)
    }

    fn base_score(&self, targets: &[f32]) -> f32 {
        self.inner().base_score(targets)
    }

    fn transform(&self, margin: f32) -> f32 {
        self.inner().transform(margin)
    }

    fn validate_targets(&self, targets: &[f32]) -> Result<(), String> {
        self.inner().validate_targets(targets)
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported objective '{0}' (expected one of: binary:logistic, reg:squarederror)")]
pub struct UnknownObjective(pub String);

impl FromStr for Objective {
    type Err = UnknownObjective;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Objective::ALL
            .into_iter()
            .find(|o| o.name() == s)
            .ok_or_else(|| UnknownObjective(s.to_string()))
    }
}
