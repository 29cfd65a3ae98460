//! Deterministic synthetic data for unit and integration tests.

use ndarray::{Array1, Array2, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::{Column, Dataset};

/// Uniform random `(rows, cols)` matrix in `[min, max)`.
pub fn random_dense_f32(rows: usize, cols: usize, seed: u64, min: f32, max: f32) -> Array2<f32> {
    assert!(max >= min);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let width = max - min;
    Array2::from_shape_simple_fn((rows, cols), || min + rng.random::<f32>() * width)
}

/// Linear score of the features with random weights plus uniform noise.
pub fn synthetic_regression_targets(features: ArrayView2<f32>, seed: u64, noise_amplitude: f32) -> Array1<f32> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let weights: Vec<f32> = (0..features.ncols()).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    let bias: f32 = rng.random::<f32>() * 0.5 - 0.25;
    features
        .rows()
        .into_iter()
        .map(|row| {
            let score: f32 = row.iter().zip(&weights).map(|(x, w)| x * w).sum();
            score + bias + (rng.random::<f32>() * 2.0 - 1.0) * noise_amplitude
        })
        .collect()
}

/// Binary 0/1 labels: the noisy linear score thresholded at its median, so
/// both classes are (nearly) equally represented.
pub fn synthetic_binary_targets(features: ArrayView2<f32>, seed: u64, noise_amplitude: f32) -> Array1<f32> {
    let scores = synthetic_regression_targets(features, seed, noise_amplitude);
    let mut sorted = scores.to_vec();
    sorted.sort_by(f32::total_cmp);
    let threshold = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
    scores.mapv(|s| if s >= threshold { 1.0 } else { 0.0 })
}

/// Mixed-type dataset with an exactly balanced binary `target` column.
///
/// - `num_a`: numeric, correlated with the target
/// - `num_b`: numeric, 5 missing cells
/// - `cat_a`: 3 categories, 5 missing cells
/// - `cat_b`: 2 categories, weakly correlated with the target
pub fn synthetic_mixed_dataset(rows: usize, seed: u64) -> Dataset {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

    let mut target: Vec<f64> = (0..rows).map(|i| if i < rows / 2 { 1.0 } else { 0.0 }).collect();
    target.shuffle(&mut rng);

    let mut missing_b: Vec<usize> = (0..rows).collect();
    missing_b.shuffle(&mut rng);
    missing_b.truncate(5);
    let mut missing_cat: Vec<usize> = (0..rows).collect();
    missing_cat.shuffle(&mut rng);
    missing_cat.truncate(5);

    let num_a: Vec<f64> = target.iter().map(|&y| y + rng.random_range(-0.8..0.8)).collect();
    let num_b: Vec<Option<f64>> = (0..rows)
        .map(|i| (!missing_b.contains(&i)).then(|| rng.random_range(0.0..100.0)))
        .collect();
    let cat_a: Vec<Option<&str>> = (0..rows)
        .map(|i| {
            let category = ["red", "green", "blue"][i % 3];
            (!missing_cat.contains(&i)).then_some(category)
        })
        .collect();
    let cat_b: Vec<&str> = target
        .iter()
        .map(|&y| if (y > 0.5) ^ rng.random_bool(0.3) { "yes" } else { "no" })
        .collect();

    // Columns are equal length and uniquely named.
    Dataset::new(vec![
        Column::from_values("num_a", num_a),
        Column::from_values("num_b", num_b),
        Column::from_values("cat_a", cat_a),
        Column::from_values("cat_b", cat_b),
        Column::from_values("target", target),
    ])
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_targets_are_balanced() {
        let x = random_dense_f32(100, 3, 7, -1.0, 1.0);
        let y = synthetic_binary_targets(x.view(), 8, 0.1);
        let ones = y.iter().filter(|&&v| v == 1.0).count();
        assert_eq!(ones, 50);
    }

    #[test]
    fn mixed_dataset_shape() {
        let ds = synthetic_mixed_dataset(100, 42);
        assert_eq!(ds.n_rows(), 100);
        assert_eq!(ds.column("num_b").unwrap().missing_count(), 5);
        assert_eq!(ds.column("cat_a").unwrap().missing_count(), 5);
        assert_eq!(ds.column("num_a").unwrap().missing_count(), 0);
        let target = ds.column("target").unwrap();
        let ones = target.cells().iter().filter(|c| c.as_number() == Some(1.0)).count();
        assert_eq!(ones, 50);
    }

    #[test]
    fn generators_are_seeded() {
        assert_eq!(random_dense_f32(5, 2, 3, 0.0, 1.0), random_dense_f32(5, 2, 3, 0.0, 1.0));
        assert_eq!(synthetic_mixed_dataset(20, 9), synthetic_mixed_dataset(20, 9));
    }
}
