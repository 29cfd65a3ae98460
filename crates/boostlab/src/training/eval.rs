//! Incremental evaluation on a held-out set.

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::repr::Tree;

use super::metrics::{Metric, MetricFn};
use super::objectives::{Objective, ObjectiveFn};

/// Validation rows whose margins are updated one tree at a time.
pub struct EvalSet<'a> {
    features: ArrayView2<'a, f32>,
    targets: Vec<f32>,
    margins: Vec<f32>,
    scratch: Vec<f32>,
}

impl<'a> EvalSet<'a> {
    pub fn new(features: ArrayView2<'a, f32>, targets: ArrayView1<'_, f32>, base_score: f32) -> Self {
        let n_rows = features.nrows();
        debug_assert_eq!(n_rows, targets.len());
        Self {
            features,
            targets: targets.to_vec(),
            margins: vec![base_score; n_rows],
            scratch: Vec::with_capacity(n_rows),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.targets.len()
    }

    pub fn add_tree(&mut self, tree: &Tree) {
        for (margin, row) in self.margins.iter_mut().zip(self.features.axis_iter(Axis(0))) {
            *margin += tree.predict_row(row);
        }
    }

    /// Score the current margins with `metric` on the objective's output scale.
    pub fn score(&mut self, objective: Objective, metric: Metric) -> f64 {
        self.scratch.clear();
        self.scratch
            .extend(self.margins.iter().map(|&m| objective.transform(m)));
        metric.compute(&self.scratch, &self.targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn scores_track_added_trees() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0]];
        let y = array![0.0f32, 0.0, 1.0, 1.0];
        let mut eval = EvalSet::new(x.view(), y.view(), 0.0);
        // All tied at 0.5.
        assert_abs_diff_eq!(eval.score(Objective::BinaryLogistic, Metric::Auc), 0.5);

        let mut tree = crate::repr::MutableTree::with_root(0.0, 4.0);
        tree.apply_split(0, 0, 1.5, 1.0, (-1.0, 2.0), (1.0, 2.0));
        eval.add_tree(&tree.freeze());
        assert_abs_diff_eq!(eval.score(Objective::BinaryLogistic, Metric::Auc), 1.0);
        assert!(eval.score(Objective::BinaryLogistic, Metric::LogLoss) < std::f64::consts::LN_2);
    }
}
