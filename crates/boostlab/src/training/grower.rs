//! Depth-wise histogram tree growth.
//!
//! Each level of the tree is expanded in turn. A node's histogram holds the
//! gradient/hessian sums per (feature, bin); the larger child's histogram is
//! derived from the parent by subtraction so only the smaller child is built
//! from rows.

use std::ops::{AddAssign, Sub, SubAssign};

use crate::data::{BinCuts, BinnedMatrix};
use crate::repr::{MutableTree, NodeId, Tree};

use super::objectives::GradsTuple;

/// Splits must reduce the loss by more than this.
const MIN_GAIN_EPS: f64 = 1e-6;

// =============================================================================
// Gain computation
// =============================================================================

/// Regularization terms of the split gain and leaf weight formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainParams {
    /// L2 penalty on leaf weights.
    pub lambda: f32,
    /// L1 penalty on leaf weights.
    pub alpha: f32,
    /// Minimum loss reduction to make a split (`gamma`).
    pub min_split_gain: f32,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f32,
}

impl GainParams {
    #[inline]
    fn threshold_l1(&self, g: f64) -> f64 {
        let alpha = self.alpha as f64;
        if g > alpha {
            g - alpha
        } else if g < -alpha {
            g + alpha
        } else {
            0.0
        }
    }

    /// Structure score `T(G)^2 / (H + lambda)`.
    #[inline]
    pub fn score(&self, grad: f64, hess: f64) -> f64 {
        let t = self.threshold_l1(grad);
        t * t / (hess + self.lambda as f64)
    }

    /// Optimal leaf weight `-T(G) / (H + lambda)`.
    #[inline]
    pub fn leaf_weight(&self, grad: f64, hess: f64) -> f64 {
        -self.threshold_l1(grad) / (hess + self.lambda as f64)
    }
}

/// Parameters for growing one tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowerParams {
    pub gain: GainParams,
    /// Maximum depth; 0 means unlimited.
    pub max_depth: u32,
    pub learning_rate: f32,
}

// =============================================================================
// Histograms
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BinStat {
    grad: f64,
    hess: f64,
    count: u32,
}

impl AddAssign for BinStat {
    fn add_assign(&mut self, other: Self) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }
}

impl SubAssign for BinStat {
    fn sub_assign(&mut self, other: Self) {
        self.grad -= other.grad;
        self.hess -= other.hess;
        self.count -= other.count;
    }
}

impl Sub for BinStat {
    type Output = Self;

    fn sub(mut self, other: Self) -> Self {
        self -= other;
        self
    }
}

impl From<GradsTuple> for BinStat {
    #[inline]
    fn from(g: GradsTuple) -> Self {
        Self {
            grad: g.grad as f64,
            hess: g.hess as f64,
            count: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
    left: BinStat,
    right: BinStat,
}

struct NodeTask {
    node: NodeId,
    rows: Vec<u32>,
    hist: Vec<BinStat>,
    sum: BinStat,
    depth: u32,
}

// =============================================================================
// TreeGrower
// =============================================================================

/// Grows one regression tree on gradient statistics.
pub struct TreeGrower<'a> {
    binned: &'a BinnedMatrix,
    cuts: &'a BinCuts,
    params: GrowerParams,
    offsets: Vec<usize>,
    n_total_bins: usize,
}

impl<'a> TreeGrower<'a> {
    pub fn new(binned: &'a BinnedMatrix, cuts: &'a BinCuts, params: GrowerParams) -> Self {
        let mut offsets = Vec::with_capacity(cuts.n_features());
        let mut total = 0;
        for f in 0..cuts.n_features() {
            offsets.push(total);
            total += cuts.n_bins(f);
        }
        Self {
            binned,
            cuts,
            params,
            offsets,
            n_total_bins: total,
        }
    }

    /// Grow a tree on `rows`, considering only `features` for splits.
    ///
    /// Leaf values already include the learning rate.
    pub fn grow(&self, grads: &[GradsTuple], rows: &[u32], features: &[usize]) -> Tree {
        let sum = rows.iter().fold(BinStat::default(), |mut acc, &r| {
            acc += BinStat::from(grads[r as usize]);
            acc
        });
        let mut tree = MutableTree::with_root(self.leaf_value(sum), sum.hess as f32);
        let mut frontier = vec![NodeTask {
            node: 0,
            rows: rows.to_vec(),
            hist: self.build_histogram(grads, rows, features),
            sum,
            depth: 0,
        }];

        while !frontier.is_empty() {
            let mut next = Vec::with_capacity(frontier.len() * 2);
            for task in frontier {
                if self.params.max_depth != 0 && task.depth >= self.params.max_depth {
                    continue;
                }
                let Some(split) = self.find_best_split(&task.hist, task.sum, features) else {
                    continue;
                };

                let column = self.binned.feature(split.feature);
                let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = task
                    .rows
                    .iter()
                    .partition(|&&r| column[r as usize] as usize <= split.bin);

                let (left, right) = tree.apply_split(
                    task.node,
                    split.feature as u32,
                    self.cuts.threshold(split.feature, split.bin),
                    split.gain as f32,
                    (self.leaf_value(split.left), split.left.hess as f32),
                    (self.leaf_value(split.right), split.right.hess as f32),
                );

                let left_is_smaller = left_rows.len() <= right_rows.len();
                let small = if left_is_smaller { &left_rows } else { &right_rows };
                let small_hist = self.build_histogram(grads, small, features);
                let mut large_hist = task.hist;
                for (l, s) in large_hist.iter_mut().zip(&small_hist) {
                    *l -= *s;
                }
                let (left_hist, right_hist) = if left_is_smaller {
                    (small_hist, large_hist)
                } else {
                    (large_hist, small_hist)
                };

                next.push(NodeTask {
                    node: left,
                    rows: left_rows,
                    hist: left_hist,
                    sum: split.left,
                    depth: task.depth + 1,
                });
                next.push(NodeTask {
                    node: right,
                    rows: right_rows,
                    hist: right_hist,
                    sum: split.right,
                    depth: task.depth + 1,
                });
            }
            frontier = next;
        }

        tree.freeze()
    }

    #[inline]
    fn leaf_value(&self, stat: BinStat) -> f32 {
        (self.params.gain.leaf_weight(stat.grad, stat.hess) * self.params.learning_rate as f64) as f32
    }

    fn build_histogram(&self, grads: &[GradsTuple], rows: &[u32], features: &[usize]) -> Vec<BinStat> {
        let mut hist = vec![BinStat::default(); self.n_total_bins];
        for &f in features {
            let column = self.binned.feature(f);
            let offset = self.offsets[f];
            for &r in rows {
                let r = r as usize;
                hist[offset + column[r] as usize] += BinStat::from(grads[r]);
            }
        }
        hist
    }

    fn find_best_split(&self, hist: &[BinStat], total: BinStat, features: &[usize]) -> Option<SplitCandidate> {
        let p = &self.params.gain;
        let min_child_weight = p.min_child_weight as f64;
        let parent_score = p.score(total.grad, total.hess);
        let mut best: Option<SplitCandidate> = None;

        for &f in features {
            let n_bins = self.cuts.n_bins(f);
            let bins = &hist[self.offsets[f]..self.offsets[f] + n_bins];
            let mut left = BinStat::default();
            for (bin, &stat) in bins.iter().enumerate().take(n_bins - 1) {
                left += stat;
                if left.count == 0 {
                    continue;
                }
                let right = total - left;
                if right.count == 0 {
                    break;
                }
                if left.hess < min_child_weight || right.hess < min_child_weight {
                    continue;
                }
                let gain = p.score(left.grad, left.hess) + p.score(right.grad, right.hess) - parent_score;
                if gain <= p.min_split_gain as f64 || gain <= MIN_GAIN_EPS {
                    continue;
                }
                if best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature: f,
                        bin,
                        gain,
                        left,
                        right,
                    });
                }
            }
        }
        best
    }
}
