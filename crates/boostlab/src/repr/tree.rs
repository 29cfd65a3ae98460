//! Canonical tree representation (SoA) plus the mutable builder used during growth.
//!
//! - [`Tree`]: immutable Structure-of-Arrays storage, cheap to traverse and serialize
//! - [`MutableTree`]: append-only node list produced by the grower
//! - [`TreeValidationError`]: structural checks applied to deserialized trees

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Index of a node inside a tree. The root is always node 0.
pub type NodeId = u32;

/// Structural validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node arrays have inconsistent lengths")]
    LengthMismatch,

    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    /// Children must come after their parent, which rules out cycles.
    #[error("node {node}: child {child} does not come after its parent")]
    BackwardEdge { node: NodeId, child: NodeId },
}

/// Per-node training statistics kept for feature importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Loss reduction of the split (0 for leaves).
    pub gains: Box<[f32]>,
    /// Hessian sum of the rows reaching the node.
    pub covers: Box<[f32]>,
}

/// Structure-of-Arrays tree storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stats: Option<NodeStats>,
}

impl Tree {
    /// A single-leaf tree.
    pub fn leaf(value: f32) -> Self {
        MutableTree::with_root(value, 0.0).freeze()
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    /// Gains and covers, if recorded during training.
    pub fn stats(&self) -> Option<&NodeStats> {
        self.stats.as_ref()
    }

    /// Drop the per-node statistics.
    pub fn without_stats(mut self) -> Self {
        self.stats = None;
        self
    }

    /// Ids of all split (non-leaf) nodes.
    pub fn split_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.n_nodes() as NodeId).filter(|&n| !self.is_leaf(n))
    }

    /// Traverse to a leaf. `NaN` follows the default direction.
    #[inline]
    pub fn predict_row(&self, row: ArrayView1<f32>) -> f32 {
        let mut node: NodeId = 0;
        while !self.is_leaf(node) {
            let value = row[self.split_index(node) as usize];
            let go_left = if value.is_nan() {
                self.default_left[node as usize]
            } else {
                value <= self.split_threshold(node)
            };
            node = if go_left {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }
        self.leaf_value(node)
    }

    /// Highest feature index used by any split, if the tree splits at all.
    pub fn max_split_index(&self) -> Option<u32> {
        self.split_nodes().map(|n| self.split_index(n)).max()
    }

    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n = self.n_nodes();
        if n == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        let lengths = [
            self.split_indices.len(),
            self.split_thresholds.len(),
            self.left_children.len(),
            self.right_children.len(),
            self.default_left.len(),
            self.leaf_values.len(),
        ];
        let stats_ok = self
            .stats
            .as_ref()
            .is_none_or(|s| s.gains.len() == n && s.covers.len() == n);
        if lengths.iter().any(|&l| l != n) || !stats_ok {
            return Err(TreeValidationError::LengthMismatch);
        }
        for node in self.split_nodes() {
            for (side, child) in [("left", self.left_child(node)), ("right", self.right_child(node))] {
                if child as usize >= n {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes: n,
                    });
                }
                if child <= node {
                    return Err(TreeValidationError::BackwardEdge { node, child });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// MutableTree
// ============================================================================

#[derive(Debug, Clone)]
struct MutableNode {
    split: Option<(u32, f32)>,
    left: NodeId,
    right: NodeId,
    value: f32,
    gain: f32,
    cover: f32,
}

/// Append-only tree used while growing. Frozen into a [`Tree`] when done.
#[derive(Debug, Clone)]
pub struct MutableTree {
    nodes: Vec<MutableNode>,
}

impl MutableTree {
    pub fn with_root(value: f32, cover: f32) -> Self {
        Self {
            nodes: vec![MutableNode {
                split: None,
                left: 0,
                right: 0,
                value,
                gain: 0.0,
                cover,
            }],
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Turn leaf `node` into a split on `feature <= threshold` and append two leaves.
    ///
    /// Children are given as `(value, cover)`. Returns `(left, right)`.
    pub fn apply_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        gain: f32,
        left: (f32, f32),
        right: (f32, f32),
    ) -> (NodeId, NodeId) {
        let left_id = self.push_leaf(left.0, left.1);
        let right_id = self.push_leaf(right.0, right.1);
        let parent = &mut self.nodes[node as usize];
        debug_assert!(parent.split.is_none(), "node {node} already split");
        parent.split = Some((feature, threshold));
        parent.gain = gain;
        parent.left = left_id;
        parent.right = right_id;
        (left_id, right_id)
    }

    fn push_leaf(&mut self, value: f32, cover: f32) -> NodeId {
        self.nodes.push(MutableNode {
            split: None,
            left: 0,
            right: 0,
            value,
            gain: 0.0,
            cover,
        });
        (self.nodes.len() - 1) as NodeId
    }

    /// Freeze into SoA storage. Missing values go right: they are imputed
    /// before training, so the direction only matters for foreign inputs.
    pub fn freeze(self) -> Tree {
        let n = self.nodes.len();
        let mut split_indices = Vec::with_capacity(n);
        let mut split_thresholds = Vec::with_capacity(n);
        let mut left_children = Vec::with_capacity(n);
        let mut right_children = Vec::with_capacity(n);
        let mut is_leaf = Vec::with_capacity(n);
        let mut leaf_values = Vec::with_capacity(n);
        let mut gains = Vec::with_capacity(n);
        let mut covers = Vec::with_capacity(n);

        for node in self.nodes {
            let (feature, threshold) = node.split.unwrap_or((0, 0.0));
            split_indices.push(feature);
            split_thresholds.push(threshold);
            left_children.push(node.left);
            right_children.push(node.right);
            is_leaf.push(node.split.is_none());
            leaf_values.push(node.value);
            gains.push(node.gain);
            covers.push(node.cover);
        }

        Tree {
            split_indices: split_indices.into(),
            split_thresholds: split_thresholds.into(),
            left_children: left_children.into(),
            right_children: right_children.into(),
            default_left: vec![false; n].into(),
            is_leaf: is_leaf.into(),
            leaf_values: leaf_values.into(),
            stats: Some(NodeStats {
                gains: gains.into(),
                covers: covers.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// x0 <= 0.5 ? (x1 <= 2.0 ? 1.0 : 2.0) : 3.0
    fn sample_tree() -> Tree {
        let mut tree = MutableTree::with_root(0.0, 10.0);
        let (left, _right) = tree.apply_split(0, 0, 0.5, 4.0, (0.0, 6.0), (3.0, 4.0));
        tree.apply_split(left, 1, 2.0, 1.5, (1.0, 2.0), (2.0, 4.0));
        tree.freeze()
    }

    #[test]
    fn traversal() {
        let tree = sample_tree();
        assert_eq!(tree.n_nodes(), 5);
        assert_eq!(tree.n_leaves(), 3);
        assert_eq!(tree.predict_row(array![0.0f32, 1.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![0.5f32, 3.0].view()), 2.0);
        assert_eq!(tree.predict_row(array![0.6f32, 0.0].view()), 3.0);
        // NaN defaults right.
        assert_eq!(tree.predict_row(array![f32::NAN, 0.0].view()), 3.0);
    }

    #[test]
    fn stats_are_recorded() {
        let tree = sample_tree();
        let stats = tree.stats().unwrap();
        assert_eq!(&*stats.gains, &[4.0, 1.5, 0.0, 0.0, 0.0]);
        assert_eq!(stats.covers[0], 10.0);
        assert!(tree.clone().without_stats().stats().is_none());
        assert_eq!(tree.max_split_index(), Some(1));
    }

    #[test]
    fn validate_accepts_grown_tree() {
        assert_eq!(sample_tree().validate(), Ok(()));
        assert_eq!(Tree::leaf(0.3).validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_corrupt_tree() {
        let json = serde_json::to_value(sample_tree()).unwrap();
        let mut corrupt = json.clone();
        corrupt["left_children"][0] = serde_json::json!(0);
        let tree: Tree = serde_json::from_value(corrupt).unwrap();
        assert_eq!(
            tree.validate(),
            Err(TreeValidationError::BackwardEdge { node: 0, child: 0 })
        );

        let mut corrupt = json;
        corrupt["right_children"][0] = serde_json::json!(99);
        let tree: Tree = serde_json::from_value(corrupt).unwrap();
        assert!(matches!(
            tree.validate(),
            Err(TreeValidationError::ChildOutOfBounds { child: 99, .. })
        ));
    }
}
