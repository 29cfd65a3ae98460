//! Gradient boosting loop.
//!
//! [`GBDTTrainer::begin`] prepares a [`BoostingSession`] (bin cuts, binned
//! matrix, base score); each [`BoostingSession::boost_round`] computes
//! gradients, samples rows and features, grows one tree and updates the
//! training margins. Sessions can be driven round by round, which is what
//! cross-validation does to train folds in lockstep.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::{BinCuts, BinnedMatrix};
use crate::error::TrainingError;
use crate::model::BoosterParams;
use crate::repr::{Forest, Tree};

use super::grower::{GrowerParams, TreeGrower};
use super::objectives::{GradsTuple, Objective, ObjectiveFn};

/// Trains forests with fixed [`BoosterParams`].
#[derive(Debug, Clone)]
pub struct GBDTTrainer {
    params: BoosterParams,
}

impl GBDTTrainer {
    pub fn new(params: BoosterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// Start a boosting session on `(n_rows, n_features)` features.
    ///
    /// # Errors
    ///
    /// [`TrainingError::TrainingFailure`] when shapes disagree, there are no
    /// rows or features, or targets fall outside the objective's domain.
    pub fn begin<'a>(
        &self,
        features: ArrayView2<'a, f32>,
        targets: ArrayView1<'_, f32>,
    ) -> Result<BoostingSession<'a>, TrainingError> {
        let (n_rows, n_features) = features.dim();
        if n_rows != targets.len() {
            return Err(TrainingError::failure(format!(
                "feature rows ({n_rows}) do not match targets ({})",
                targets.len()
            )));
        }
        if n_rows == 0 || n_features == 0 {
            return Err(TrainingError::failure(format!(
                "cannot train on a {n_rows}x{n_features} matrix"
            )));
        }
        let targets = targets.to_vec();
        let objective = self.params.objective;
        objective.validate_targets(&targets).map_err(TrainingError::TrainingFailure)?;

        let cuts = BinCuts::from_features(features, self.params.max_bin as usize);
        let binned = BinnedMatrix::from_features(features, &cuts);
        let base_score = objective.base_score(&targets);

        Ok(BoostingSession {
            features,
            targets,
            objective,
            cuts,
            binned,
            grower: self.params.grower_params(),
            subsample: self.params.subsample,
            colsample_bytree: self.params.colsample_bytree,
            margins: vec![base_score; n_rows],
            grads: vec![GradsTuple::default(); n_rows],
            forest: Forest::new(base_score),
            rng: Xoshiro256PlusPlus::seed_from_u64(self.params.seed),
        })
    }

    /// Train exactly `n_rounds` trees.
    pub fn train(
        &self,
        features: ArrayView2<'_, f32>,
        targets: ArrayView1<'_, f32>,
        n_rounds: u32,
    ) -> Result<Forest, TrainingError> {
        let mut session = self.begin(features, targets)?;
        for _ in 0..n_rounds {
            session.boost_round();
        }
        Ok(session.into_forest())
    }
}

/// In-progress training state for one dataset.
pub struct BoostingSession<'a> {
    features: ArrayView2<'a, f32>,
    targets: Vec<f32>,
    objective: Objective,
    cuts: BinCuts,
    binned: BinnedMatrix,
    grower: GrowerParams,
    subsample: f32,
    colsample_bytree: f32,
    margins: Vec<f32>,
    grads: Vec<GradsTuple>,
    forest: Forest,
    rng: Xoshiro256PlusPlus,
}

impl BoostingSession<'_> {
    /// Grow one tree and add it to the forest.
    pub fn boost_round(&mut self) -> &Tree {
        self.objective
            .compute_gradients(&self.margins, &self.targets, &mut self.grads);
        let rows = self.sample_rows();
        let features = self.sample_features();

        let tree = TreeGrower::new(&self.binned, &self.cuts, self.grower).grow(&self.grads, &rows, &features);
        for (margin, row) in self.margins.iter_mut().zip(self.features.axis_iter(Axis(0))) {
            *margin += tree.predict_row(row);
        }
        self.forest.push(tree);
        &self.forest.trees()[self.forest.n_trees() - 1]
    }

    pub fn n_rounds(&self) -> usize {
        self.forest.n_trees()
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Training margins after the rounds so far.
    pub fn margins(&self) -> &[f32] {
        &self.margins
    }

    fn sample_rows(&mut self) -> Vec<u32> {
        let n_rows = self.targets.len() as u32;
        if self.subsample >= 1.0 {
            return (0..n_rows).collect();
        }
        let subsample = self.subsample;
        let rng = &mut self.rng;
        let mut rows: Vec<u32> = (0..n_rows).filter(|_| rng.random::<f32>() < subsample).collect();
        if rows.is_empty() {
            rows.push(rng.random_range(0..n_rows));
        }
        rows
    }

    fn sample_features(&mut self) -> Vec<usize> {
        let n_features = self.cuts.n_features();
        let mut features: Vec<usize> = (0..n_features).collect();
        if self.colsample_bytree >= 1.0 {
            return features;
        }
        let k = ((n_features as f32 * self.colsample_bytree).round() as usize).clamp(1, n_features);
        features.shuffle(&mut self.rng);
        features.truncate(k);
        features.sort_unstable();
        features
    }
}
