//! K-fold cross-validation with early stopping on the mean fold score.
//!
//! All folds are trained in lockstep, one round at a time, so the stopping
//! decision is made on the average validation metric across folds and every
//! fold ends with the same number of trees.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;
use crate::model::BoosterParams;
use crate::preprocess::split::group_by_class;
use crate::utils::{Parallelism, mean_std};

use super::callback::EarlyStopping;
use super::eval::EvalSet;
use super::trainer::{BoostingSession, GBDTTrainer};

/// Cross-validation settings shared by every candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CvParams {
    pub n_folds: usize,
    /// Upper bound on boosting rounds.
    pub max_rounds: u32,
    /// Patience in rounds; 0 disables early stopping.
    pub early_stopping_rounds: u32,
    /// Seed for fold assignment.
    pub seed: u64,
    /// Keep class proportions in every fold.
    pub stratified: bool,
    pub parallelism: Parallelism,
}

/// Result of cross-validating one parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvOutcome {
    /// Mean validation score across folds at the best round.
    pub mean_score: f64,
    /// Population standard deviation across folds at the best round.
    pub std_score: f64,
    /// Rounds up to and including the best round.
    pub best_rounds: u32,
    /// Rounds actually trained before stopping.
    pub rounds_trained: u32,
}

/// Assign rows to folds. Returns the validation rows of each fold, sorted.
///
/// Stratified assignment shuffles each class with the seeded RNG and deals
/// its rows round-robin, continuing where the previous class stopped so
/// fold sizes stay within one row of each other.
///
/// # Errors
///
/// [`TrainingError::InsufficientData`] if there are fewer rows than folds or,
/// when stratified, some class has fewer rows than folds.
pub fn fold_assignments(
    targets: &[f32],
    n_folds: usize,
    seed: u64,
    stratified: bool,
) -> Result<Vec<Vec<usize>>, TrainingError> {
    if n_folds < 2 {
        return Err(TrainingError::InvalidRequest(format!(
            "cross-validation needs at least 2 folds, got {n_folds}"
        )));
    }
    if targets.len() < n_folds {
        return Err(TrainingError::InsufficientData(format!(
            "{} training row(s) cannot fill {n_folds} folds",
            targets.len()
        )));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); n_folds];

    let groups = if stratified {
        let groups = group_by_class(targets);
        if let Some((label, rows)) = groups.iter().find(|(_, rows)| rows.len() < n_folds) {
            return Err(TrainingError::InsufficientData(format!(
                "class {label} has {} training row(s), fewer than cv_folds={n_folds}",
                rows.len()
            )));
        }
        groups.into_iter().map(|(_, rows)| rows).collect()
    } else {
        vec![(0..targets.len()).collect::<Vec<_>>()]
    };

    let mut next = 0;
    for mut rows in groups {
        rows.shuffle(&mut rng);
        for row in rows {
            folds[next].push(row);
            next = (next + 1) % n_folds;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

struct FoldData {
    train_x: Array2<f32>,
    train_y: Array1<f32>,
    valid_x: Array2<f32>,
    valid_y: Array1<f32>,
}

impl FoldData {
    fn new(features: ArrayView2<f32>, targets: ArrayView1<f32>, valid: &[usize]) -> Self {
        let mut in_valid = vec![false; targets.len()];
        for &i in valid {
            in_valid[i] = true;
        }
        let train: Vec<usize> = (0..targets.len()).filter(|&i| !in_valid[i]).collect();
        Self {
            train_x: features.select(Axis(0), &train),
            train_y: targets.select(Axis(0), &train),
            valid_x: features.select(Axis(0), valid),
            valid_y: targets.select(Axis(0), valid),
        }
    }
}

/// Cross-validate `params` on the given training rows.
///
/// # Errors
///
/// Fold assignment errors, or a [`TrainingError::TrainingFailure`] from the
/// trainer.
pub fn cross_validate(
    features: ArrayView2<f32>,
    targets: ArrayView1<f32>,
    params: &BoosterParams,
    cv: &CvParams,
) -> Result<CvOutcome, TrainingError> {
    let targets_vec = targets.to_vec();
    let folds = fold_assignments(&targets_vec, cv.n_folds, cv.seed, cv.stratified)?;
    let fold_data: Vec<FoldData> = folds
        .iter()
        .map(|valid| FoldData::new(features, targets, valid))
        .collect();

    let trainer = GBDTTrainer::new(params.clone());
    let objective = params.objective;
    let metric = params.metric();

    let mut sessions: Vec<(BoostingSession<'_>, EvalSet<'_>)> = fold_data
        .iter()
        .map(|fold| {
            let session = trainer.begin(fold.train_x.view(), fold.train_y.view())?;
            let eval = EvalSet::new(fold.valid_x.view(), fold.valid_y.view(), session.forest().base_score());
            Ok((session, eval))
        })
        .collect::<Result<_, TrainingError>>()?;

    let mut early_stop = EarlyStopping::new(cv.early_stopping_rounds as usize, metric);
    let mut history: Vec<(f64, f64)> = Vec::with_capacity(cv.max_rounds as usize);

    for _ in 0..cv.max_rounds {
        let scores = cv.parallelism.maybe_par_map(&mut sessions, |(session, eval): &mut (BoostingSession<'_>, EvalSet<'_>)| {
            let tree = session.boost_round();
            eval.add_tree(tree);
            eval.score(objective, metric)
        });
        let (mean, std) = mean_std(&scores);
        history.push((mean, std));
        if early_stop.should_stop(mean) {
            break;
        }
    }

    if history.is_empty() {
        return Err(TrainingError::failure("cross-validation ran zero rounds"));
    }
    let best = early_stop.best_round();
    let (mean_score, std_score) = history[best];
    tracing::trace!(
        rounds = history.len(),
        best_round = best,
        mean_score,
        std_score,
        "cross-validation finished"
    );

    Ok(CvOutcome {
        mean_score,
        std_score,
        best_rounds: best as u32 + 1,
        rounds_trained: history.len() as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{random_dense_f32, synthetic_binary_targets};

    fn cv_params(max_rounds: u32, patience: u32) -> CvParams {
        CvParams {
            n_folds: 3,
            max_rounds,
            early_stopping_rounds: patience,
            seed: 42,
            stratified: true,
            parallelism: Parallelism::Sequential,
        }
    }

    #[test]
    fn stratified_folds_partition_rows() {
        let y: Vec<f32> = (0..31).map(|i| (i % 3 == 0) as u8 as f32).collect();
        let folds = fold_assignments(&y, 3, 7, true).unwrap();
        let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..31).collect::<Vec<_>>());

        let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
        for fold in &folds {
            let pos = fold.iter().filter(|&&i| y[i] == 1.0).count();
            assert!((3..=4).contains(&pos), "fold positives {pos}");
        }
    }

    #[test]
    fn folds_reject_tiny_classes() {
        let y = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        assert!(matches!(
            fold_assignments(&y, 3, 0, true),
            Err(TrainingError::InsufficientData(_))
        ));
        assert!(fold_assignments(&y, 3, 0, false).is_ok());
        assert!(matches!(
            fold_assignments(&y, 1, 0, false),
            Err(TrainingError::InvalidRequest(_))
        ));
    }

    #[test]
    fn cross_validation_scores_informative_features() {
        let x = random_dense_f32(150, 3, 1, -1.0, 1.0);
        let y = synthetic_binary_targets(x.view(), 2, 0.05);
        let params = BoosterParams::builder().max_depth(3).learning_rate(0.3).build().unwrap();
        let outcome = cross_validate(x.view(), y.view(), &params, &cv_params(30, 10)).unwrap();
        assert!(outcome.mean_score > 0.8, "{outcome:?}");
        assert!(outcome.std_score >= 0.0);
        assert!(outcome.best_rounds >= 1 && outcome.best_rounds <= outcome.rounds_trained);
        assert!(outcome.rounds_trained <= 30);
    }

    #[test]
    fn early_stopping_trims_rounds() {
        // Pure noise: the validation metric stops improving quickly.
        let x = random_dense_f32(90, 2, 5, 0.0, 1.0);
        let y: Vec<f32> = (0..90).map(|i| (i % 2) as f32).collect();
        let params = BoosterParams::builder().max_depth(4).learning_rate(0.5).build().unwrap();
        let outcome = cross_validate(x.view(), Array1::from(y).view(), &params, &cv_params(200, 5)).unwrap();
        assert!(outcome.rounds_trained < 200);
        assert_eq!(outcome.rounds_trained, outcome.best_rounds + 5);
    }

    #[test]
    fn parallel_matches_sequential() {
        let x = random_dense_f32(90, 3, 8, -1.0, 1.0);
        let y = synthetic_binary_targets(x.view(), 9, 0.2);
        let params = BoosterParams::builder().subsample(0.8).build().unwrap();
        let sequential = cross_validate(x.view(), y.view(), &params, &cv_params(15, 5)).unwrap();
        let parallel = cross_validate(
            x.view(),
            y.view(),
            &params,
            &CvParams {
                parallelism: Parallelism::Parallel,
                ..cv_params(15, 5)
            },
        )
        .unwrap();
        assert_eq!(sequential, parallel);
    }
}
