//! Exhaustive grid search over a [`SearchSpace`].

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::model::BoosterParams;

use super::cv::{CvOutcome, CvParams, cross_validate};
use super::metrics::Metric;
use super::params::{ParamSet, SearchSpace};

/// One evaluated grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in enumeration order.
    pub index: usize,
    /// The grid values of this candidate (without the fixed base params).
    pub params: ParamSet,
    pub outcome: CvOutcome,
}

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub metric: Metric,
    /// Grid values of the winning candidate.
    pub best_params: ParamSet,
    pub best_score: f64,
    pub best_score_std: f64,
    /// Boosting rounds selected by early stopping for the winner.
    pub best_rounds: u32,
    pub n_candidates: usize,
    pub candidates: Vec<CandidateResult>,
}

/// Snapshot passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningProgress {
    pub evaluated: usize,
    pub total: usize,
    pub best_score: f64,
}

impl TuningProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.evaluated as f64 / self.total as f64
        }
    }
}

/// Grid search driver.
///
/// Every candidate is merged over `base` (candidate values win), turned into
/// [`BoosterParams`] and cross-validated. The first candidate with the
/// strictly best mean score wins; ties keep the earlier candidate.
pub struct GridSearch<'a> {
    base: &'a ParamSet,
    space: &'a SearchSpace,
    cv: CvParams,
    progress_every: usize,
}

impl<'a> GridSearch<'a> {
    pub fn new(base: &'a ParamSet, space: &'a SearchSpace, cv: CvParams) -> Self {
        Self {
            base,
            space,
            cv,
            progress_every: 5,
        }
    }

    /// Report progress after every `n`th candidate.
    pub fn progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    /// Cross-validate every candidate on the given training rows.
    pub fn run(
        &self,
        features: ArrayView2<f32>,
        targets: ArrayView1<f32>,
        on_progress: impl FnMut(TuningProgress),
    ) -> Result<TuningOutcome, TrainingError> {
        self.search(
            |params| cross_validate(features, targets, params, &self.cv),
            on_progress,
        )
    }

    /// Run the search with a custom evaluation function.
    pub fn search(
        &self,
        mut evaluate: impl FnMut(&BoosterParams) -> Result<CvOutcome, TrainingError>,
        mut on_progress: impl FnMut(TuningProgress),
    ) -> Result<TuningOutcome, TrainingError> {
        let metric = BoosterParams::from_param_set(self.base)?.metric();
        let total = self.space.n_candidates();
        let mut candidates = Vec::with_capacity(total);
        let mut best: Option<usize> = None;

        for (index, grid_point) in self.space.candidates().enumerate() {
            let params = BoosterParams::from_param_set(&self.base.merged_with(&grid_point))?;
            let outcome = evaluate(&params)?;
            tracing::debug!(
                candidate = index + 1,
                total,
                params = %grid_point,
                score = outcome.mean_score,
                std = outcome.std_score,
                rounds = outcome.best_rounds,
                "candidate evaluated"
            );

            // A NaN incumbent (a diverged fold score) loses to any real score.
            let improved = match best.map(|b| candidates_score(&candidates, b)) {
                None => true,
                Some(incumbent) if incumbent.is_nan() => !outcome.mean_score.is_nan(),
                Some(incumbent) => metric.is_better(outcome.mean_score, incumbent),
            };
            candidates.push(CandidateResult {
                index,
                params: grid_point,
                outcome,
            });
            if improved {
                best = Some(index);
            }

            let evaluated = index + 1;
            if evaluated % self.progress_every == 0 {
                on_progress(TuningProgress {
                    evaluated,
                    total,
                    best_score: best.map_or(f64::NAN, |b| candidates_score(&candidates, b)),
                });
            }
        }

        let best = best.ok_or_else(|| TrainingError::failure("parameter grid produced no candidates"))?;
        let winner = &candidates[best];
        Ok(TuningOutcome {
            metric,
            best_params: winner.params.clone(),
            best_score: winner.outcome.mean_score,
            best_score_std: winner.outcome.std_score,
            best_rounds: winner.outcome.best_rounds,
            n_candidates: total,
            candidates,
        })
    }
}

fn candidates_score(candidates: &[CandidateResult], index: usize) -> f64 {
    candidates[index].outcome.mean_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::{ParamGrid, ParamValue};
    use crate::utils::Parallelism;

    fn cv() -> CvParams {
        CvParams {
            n_folds: 3,
            max_rounds: 10,
            early_stopping_rounds: 3,
            seed: 42,
            stratified: true,
            parallelism: Parallelism::Sequential,
        }
    }

    fn outcome(score: f64) -> CvOutcome {
        CvOutcome {
            mean_score: score,
            std_score: 0.01,
            best_rounds: 7,
            rounds_trained: 10,
        }
    }

    fn depth_space(depths: &[i64]) -> SearchSpace {
        ParamGrid::new()
            .with_values("max_depth", depths.iter().copied())
            .validate()
            .unwrap()
    }

    #[test]
    fn picks_highest_auc() {
        let base = ParamSet::new().with("objective", "binary:logistic");
        let space = depth_space(&[3, 5, 7]);
        let scores = [0.70, 0.85, 0.80];
        let search = GridSearch::new(&base, &space, cv());
        let result = search
            .search(|p| Ok(outcome(scores[(p.max_depth as usize - 3) / 2])), |_| {})
            .unwrap();
        assert_eq!(result.best_params.get("max_depth"), Some(&ParamValue::Int(5)));
        assert_eq!(result.best_score, 0.85);
        assert_eq!(result.best_rounds, 7);
        assert_eq!(result.candidates.len(), 3);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let base = ParamSet::new();
        let space = depth_space(&[3, 5]);
        let result = GridSearch::new(&base, &space, cv())
            .search(|_| Ok(outcome(0.8)), |_| {})
            .unwrap();
        assert_eq!(result.best_params.get("max_depth"), Some(&ParamValue::Int(3)));
    }

    #[test]
    fn lower_is_better_for_regression() {
        let base = ParamSet::new().with("objective", "reg:squarederror");
        let space = depth_space(&[3, 5]);
        let result = GridSearch::new(&base, &space, cv())
            .search(|p| Ok(outcome(p.max_depth as f64)), |_| {})
            .unwrap();
        assert_eq!(result.metric, Metric::Rmse);
        assert_eq!(result.best_score, 3.0);
    }

    #[test]
    fn nan_first_candidate_is_replaced() {
        let base = ParamSet::new();
        let space = depth_space(&[3, 5]);
        let result = GridSearch::new(&base, &space, cv())
            .search(
                |p| Ok(outcome(if p.max_depth == 3 { f64::NAN } else { 0.6 })),
                |_| {},
            )
            .unwrap();
        assert_eq!(result.best_params.get("max_depth"), Some(&ParamValue::Int(5)));
        assert_eq!(result.best_score, 0.6);
    }

    #[test]
    fn progress_reported_every_nth_candidate() {
        let base = ParamSet::new();
        let space = ParamGrid::new()
            .with_values("max_depth", [1, 2, 3, 4, 5, 6, 7])
            .validate()
            .unwrap();
        let mut reports = Vec::new();
        GridSearch::new(&base, &space, cv())
            .progress_every(3)
            .search(|_| Ok(outcome(0.5)), |p| reports.push(p.evaluated))
            .unwrap();
        assert_eq!(reports, vec![3, 6]);
    }

    #[test]
    fn evaluation_errors_propagate() {
        let base = ParamSet::new();
        let space = depth_space(&[3]);
        let err = GridSearch::new(&base, &space, cv())
            .search(|_| Err(TrainingError::InsufficientData("tiny".into())), |_| {})
            .unwrap_err();
        assert_eq!(err, TrainingError::InsufficientData("tiny".into()));
    }

    #[test]
    fn run_cross_validates_for_real() {
        let x = crate::testing::random_dense_f32(90, 2, 3, -1.0, 1.0);
        let y = crate::testing::synthetic_binary_targets(x.view(), 4, 0.1);
        let base = ParamSet::new().with("objective", "binary:logistic").with("seed", 42);
        let space = depth_space(&[2, 3]);
        let result = GridSearch::new(&base, &space, cv())
            .run(x.view(), y.view(), |_| {})
            .unwrap();
        assert_eq!(result.n_candidates, 2);
        assert!(result.best_score > 0.5);
    }
}
