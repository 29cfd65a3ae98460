//! Seeded train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Row indices of the two sides of a split, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Rows grouped by target value, in ascending value order.
pub(crate) fn group_by_class(targets: &[f32]) -> Vec<(f32, Vec<usize>)> {
    let mut labels: Vec<f32> = targets.to_vec();
    labels.sort_by(f32::total_cmp);
    labels.dedup_by(|a, b| a.total_cmp(b).is_eq());

    let mut groups: Vec<(f32, Vec<usize>)> = labels.into_iter().map(|l| (l, Vec::new())).collect();
    for (row, &y) in targets.iter().enumerate() {
        let pos = groups.partition_point(|(l, _)| l.total_cmp(&y).is_lt());
        groups[pos].1.push(row);
    }
    groups
}

fn test_count(n_rows: usize, test_size: f64) -> Result<usize, TrainingError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrainingError::InvalidRequest(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    // Tolerance keeps 0.1 * 30 from rounding up to 4.
    let n_test = (test_size * n_rows as f64 - 1e-9).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(TrainingError::InsufficientData(format!(
            "{n_rows} row(s) cannot be split with test_size {test_size}"
        )));
    }
    Ok(n_test)
}

/// Split so each class keeps (approximately) its share on both sides.
///
/// The test side gets `ceil(test_size * n)` rows, allocated to classes by
/// largest remainder with at least one row of every class on each side.
///
/// # Errors
///
/// [`TrainingError::InsufficientData`] if some class has fewer than 2 rows
/// or either side is too small to hold every class.
pub fn stratified_split(targets: &[f32], test_size: f64, seed: u64) -> Result<TrainTestSplit, TrainingError> {
    let n_rows = targets.len();
    let n_test = test_count(n_rows, test_size)?;
    let classes = group_by_class(targets);

    if let Some((label, rows)) = classes.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(TrainingError::InsufficientData(format!(
            "class {label} has {} row(s); stratified splitting needs at least 2 per class",
            rows.len()
        )));
    }
    let n_classes = classes.len();
    if n_test < n_classes || n_rows - n_test < n_classes {
        return Err(TrainingError::InsufficientData(format!(
            "a {}/{n_test} train/test split cannot hold all {n_classes} classes on both sides",
            n_rows - n_test
        )));
    }

    let counts: Vec<usize> = classes.iter().map(|(_, rows)| rows.len()).collect();
    let allocation = allocate(&counts, n_test);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut split = TrainTestSplit {
        train: Vec::with_capacity(n_rows - n_test),
        test: Vec::with_capacity(n_test),
    };
    for ((_, mut rows), take) in classes.into_iter().zip(allocation) {
        rows.shuffle(&mut rng);
        split.test.extend_from_slice(&rows[..take]);
        split.train.extend_from_slice(&rows[take..]);
    }
    split.train.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}

/// Largest-remainder allocation of `total` rows across classes, keeping
/// between 1 and `count - 1` rows per class.
fn allocate(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / n as f64)
        .collect();
    let mut alloc: Vec<usize> = exact
        .iter()
        .zip(counts)
        .map(|(&e, &c)| (e.floor() as usize).clamp(1, c - 1))
        .collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - alloc[a] as f64;
        let rb = exact[b] - alloc[b] as f64;
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let mut assigned: usize = alloc.iter().sum();
    while assigned < total {
        for &i in &order {
            if assigned < total && alloc[i] < counts[i] - 1 {
                alloc[i] += 1;
                assigned += 1;
            }
        }
    }
    while assigned > total {
        for &i in order.iter().rev() {
            if assigned > total && alloc[i] > 1 {
                alloc[i] -= 1;
                assigned -= 1;
            }
        }
    }
    alloc
}

/// Unstratified seeded split, used for regression targets.
pub fn shuffled_split(n_rows: usize, test_size: f64, seed: u64) -> Result<TrainTestSplit, TrainingError> {
    let n_test = test_count(n_rows, test_size)?;
    let mut rows: Vec<usize> = (0..n_rows).collect();
    rows.shuffle(&mut Xoshiro256PlusPlus::seed_from_u64(seed));
    let mut test = rows[..n_test].to_vec();
    let mut train = rows[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok(TrainTestSplit { train, test })
}
