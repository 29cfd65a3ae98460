//! Additive tree ensemble.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::tree::{Tree, TreeValidationError};

/// A base score plus the sum of its trees' leaf values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    base_score: f32,
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new(base_score: f32) -> Self {
        Self {
            base_score,
            trees: Vec::new(),
        }
    }

    pub fn push(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw (untransformed) score for one row.
    #[inline]
    pub fn predict_margin_row(&self, row: ArrayView1<f32>) -> f32 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f32>()
    }

    /// Raw scores for a `(n_rows, n_features)` matrix.
    pub fn predict_margins(&self, features: ArrayView2<f32>) -> Array1<f32> {
        features
            .axis_iter(Axis(0))
            .map(|row| self.predict_margin_row(row))
            .collect()
    }

    /// Drop per-node statistics from every tree.
    pub fn without_stats(self) -> Self {
        Self {
            base_score: self.base_score,
            trees: self.trees.into_iter().map(Tree::without_stats).collect(),
        }
    }

    /// Validate every tree and check that splits stay within `n_features`.
    pub fn validate(&self, n_features: usize) -> Result<(), ForestValidationError> {
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|source| ForestValidationError::Tree { index, source })?;
            if let Some(max) = tree.max_split_index()
                && max as usize >= n_features
            {
                return Err(ForestValidationError::FeatureOutOfRange {
                    index,
                    feature: max,
                    n_features,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("tree {index}: {source}")]
    Tree {
        index: usize,
        source: TreeValidationError,
    },

    #[error("tree {index} splits on feature {feature}, model has {n_features} features")]
    FeatureOutOfRange {
        index: usize,
        feature: u32,
        n_features: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::MutableTree;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn margins_sum_trees() {
        let mut forest = Forest::new(0.5);
        let mut tree = MutableTree::with_root(0.0, 1.0);
        tree.apply_split(0, 0, 1.0, 1.0, (-1.0, 0.5), (1.0, 0.5));
        forest.push(tree.freeze());
        forest.push(Tree::leaf(0.25));

        let x = array![[0.0f32], [2.0]];
        let margins = forest.predict_margins(x.view());
        assert_abs_diff_eq!(margins[0], -0.25);
        assert_abs_diff_eq!(margins[1], 1.75);
    }

    #[test]
    fn validate_checks_feature_range() {
        let mut forest = Forest::new(0.0);
        let mut tree = MutableTree::with_root(0.0, 1.0);
        tree.apply_split(0, 3, 1.0, 1.0, (-1.0, 0.5), (1.0, 0.5));
        forest.push(tree.freeze());
        assert!(forest.validate(4).is_ok());
        assert_eq!(
            forest.validate(2),
            Err(ForestValidationError::FeatureOutOfRange {
                index: 0,
                feature: 3,
                n_features: 2
            })
        );
    }
}
