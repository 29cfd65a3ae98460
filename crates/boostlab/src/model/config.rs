//! Booster hyperparameters with builder pattern.
//!
//! [`BoosterParams`] is the typed form of a [`ParamSet`]: it uses the `bon`
//! crate for builder generation and validates at build time.
//!
//! # Example
//!
//! ```
//! use boostlab::model::BoosterParams;
//! use boostlab::training::Objective;
//!
//! let params = BoosterParams::builder()
//!     .objective(Objective::BinaryLogistic)
//!     .max_depth(4)
//!     .learning_rate(0.1)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.max_depth, 4);
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::training::grower::{GainParams, GrowerParams};
use crate::training::params::{ParamSet, ParamValue, canonical_name, validate_param_value};
use crate::training::{Metric, Objective};

// =============================================================================
// Validation Errors
// =============================================================================

/// Parameter validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamValidationError {
    #[error("lambda must be >= 0, got {0}")]
    InvalidLambda(f32),

    #[error("alpha must be >= 0, got {0}")]
    InvalidAlpha(f32),

    #[error("gamma must be >= 0, got {0}")]
    InvalidGamma(f32),

    #[error("min_child_weight must be >= 0, got {0}")]
    InvalidMinChildWeight(f32),

    #[error("subsample must be in (0, 1], got {0}")]
    InvalidSubsample(f32),

    #[error("colsample_bytree must be in (0, 1], got {0}")]
    InvalidColsampleBytree(f32),

    #[error("learning_rate must be in (0, 1], got {0}")]
    InvalidLearningRate(f32),

    #[error("max_bin must be in [2, 65535], got {0}")]
    InvalidMaxBin(u32),

    #[error("metric {metric} does not apply to objective {objective}")]
    MetricMismatch { metric: Metric, objective: Objective },
}

// =============================================================================
// BoosterParams
// =============================================================================

/// Typed hyperparameters for one booster.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct BoosterParams {
    /// Training loss. Default: `binary:logistic`.
    #[builder(default)]
    pub objective: Objective,

    /// Evaluation metric. `None` uses the objective's default.
    pub eval_metric: Option<Metric>,

    /// Shrinkage applied to each tree. Default: 0.3.
    #[builder(default = 0.3)]
    pub learning_rate: f32,

    /// Maximum tree depth; 0 means unlimited. Default: 6.
    #[builder(default = 6)]
    pub max_depth: u32,

    /// Minimum hessian sum per child. Default: 1.0.
    #[builder(default = 1.0)]
    pub min_child_weight: f32,

    /// Minimum loss reduction to split. Default: 0.0.
    #[builder(default = 0.0)]
    pub gamma: f32,

    /// L2 regularization. Default: 1.0.
    #[builder(default = 1.0)]
    pub lambda: f32,

    /// L1 regularization. Default: 0.0.
    #[builder(default = 0.0)]
    pub alpha: f32,

    /// Row sampling ratio per tree. Default: 1.0.
    #[builder(default = 1.0)]
    pub subsample: f32,

    /// Feature sampling ratio per tree. Default: 1.0.
    #[builder(default = 1.0)]
    pub colsample_bytree: f32,

    /// Maximum histogram bins per feature. Default: 256.
    #[builder(default = 256)]
    pub max_bin: u32,

    /// Random seed for sampling. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,
}

impl<S: booster_params_builder::IsComplete> BoosterParamsBuilder<S> {
    /// Build and validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParamValidationError`] for out-of-range values.
    pub fn build(self) -> Result<BoosterParams, ParamValidationError> {
        let params = self.__build_internal();
        params.validate()?;
        Ok(params)
    }
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self::builder().build().expect("default params are valid")
    }
}

impl BoosterParams {
    pub fn validate(&self) -> Result<(), ParamValidationError> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ParamValidationError::InvalidLearningRate(self.learning_rate));
        }
        if !(self.lambda >= 0.0) {
            return Err(ParamValidationError::InvalidLambda(self.lambda));
        }
        if !(self.alpha >= 0.0) {
            return Err(ParamValidationError::InvalidAlpha(self.alpha));
        }
        if !(self.gamma >= 0.0) {
            return Err(ParamValidationError::InvalidGamma(self.gamma));
        }
        if !(self.min_child_weight >= 0.0) {
            return Err(ParamValidationError::InvalidMinChildWeight(self.min_child_weight));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ParamValidationError::InvalidSubsample(self.subsample));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(ParamValidationError::InvalidColsampleBytree(self.colsample_bytree));
        }
        if !(2..=u16::MAX as u32).contains(&self.max_bin) {
            return Err(ParamValidationError::InvalidMaxBin(self.max_bin));
        }
        if let Some(metric) = self.eval_metric {
            let classification_only = matches!(metric, Metric::Auc | Metric::LogLoss | Metric::Accuracy);
            if classification_only && !self.objective.is_classification() {
                return Err(ParamValidationError::MetricMismatch {
                    metric,
                    objective: self.objective,
                });
            }
        }
        Ok(())
    }

    /// Metric used for early stopping and scoring.
    pub fn metric(&self) -> Metric {
        self.eval_metric.unwrap_or_else(|| self.objective.default_metric())
    }

    pub(crate) fn grower_params(&self) -> GrowerParams {
        GrowerParams {
            gain: GainParams {
                lambda: self.lambda,
                alpha: self.alpha,
                min_split_gain: self.gamma,
                min_child_weight: self.min_child_weight,
            },
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
        }
    }

    /// Build from a merged parameter set.
    ///
    /// Accepts the tunable parameters (and their aliases) plus `objective`,
    /// `eval_metric`, `seed`, `max_bin` and `nthread`; unset fields keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// [`TrainingError::TrainingFailure`] for unknown names, wrongly typed
    /// values, or values that fail validation.
    pub fn from_param_set(set: &ParamSet) -> Result<Self, TrainingError> {
        let mut params = Self::default();
        for (name, value) in set.iter() {
            params.apply(name, value).map_err(TrainingError::TrainingFailure)?;
        }
        params.validate().map_err(TrainingError::failure)?;
        Ok(params)
    }

    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<(), String> {
        let text = || {
            value
                .as_str()
                .ok_or_else(|| format!("'{name}' must be a string, got {value}"))
        };
        let uint = || {
            value
                .as_int()
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| format!("'{name}' must be a non-negative integer, got {value}"))
        };

        match name {
            "objective" => self.objective = text()?.parse().map_err(|e| format!("{e}"))?,
            "eval_metric" => self.eval_metric = Some(text()?.parse()?),
            "seed" => self.seed = uint()?,
            "max_bin" => {
                self.max_bin = u32::try_from(uint()?).map_err(|_| format!("'max_bin' out of range: {value}"))?
            }
            // Thread count is governed by the rayon pool; -1 means "all".
            "nthread" => {
                value
                    .as_int()
                    .ok_or_else(|| format!("'nthread' must be an integer, got {value}"))?;
            }
            _ => {
                let canonical = canonical_name(name).ok_or_else(|| format!("unknown booster parameter '{name}'"))?;
                validate_param_value(name, value)?;
                let number = value.as_f64().unwrap_or_default();
                match canonical {
                    "max_depth" => self.max_depth = number.min(u32::MAX as f64) as u32,
                    "learning_rate" => self.learning_rate = number as f32,
                    "subsample" => self.subsample = number as f32,
                    "colsample_bytree" => self.colsample_bytree = number as f32,
                    "min_child_weight" => self.min_child_weight = number as f32,
                    "gamma" => self.gamma = number as f32,
                    "alpha" => self.alpha = number as f32,
                    "lambda" => self.lambda = number as f32,
                    other => return Err(format!("unknown booster parameter '{other}'")),
                }
            }
        }
        Ok(())
    }
}
