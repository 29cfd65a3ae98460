//! Quantile binning of dense feature matrices.
//!
//! Histogram-based tree growth works on small integer bin indices instead of
//! raw floats. [`BinCuts`] holds the per-feature thresholds and
//! [`BinnedMatrix`] the bin index of every cell.
//!
//! Bin `b` of feature `f` holds values `v` with `cuts[b-1] < v <= cuts[b]`,
//! so splitting after bin `b` is the same as the raw test `v <= cuts[b]`.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Per-feature ascending split thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cuts: Vec<Vec<f32>>,
}

impl BinCuts {
    /// Compute cuts from a `(n_rows, n_features)` matrix.
    ///
    /// Features with at most `max_bin` distinct values get one bin per value;
    /// others use approximate quantiles. NaN values are ignored.
    pub fn from_features(features: ArrayView2<f32>, max_bin: usize) -> Self {
        let max_bin = max_bin.max(2);
        let cuts = features
            .axis_iter(Axis(1))
            .map(|column| feature_cuts(column, max_bin))
            .collect();
        Self { cuts }
    }

    pub fn n_features(&self) -> usize {
        self.cuts.len()
    }

    /// Number of bins for `feature` (one more than the number of cuts).
    #[inline]
    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Upper edge of `bin`; only valid for bins that are not the last.
    #[inline]
    pub fn threshold(&self, feature: usize, bin: usize) -> f32 {
        self.cuts[feature][bin]
    }

    #[inline]
    pub fn bin_of(&self, feature: usize, value: f32) -> u16 {
        self.cuts[feature].partition_point(|&t| t < value) as u16
    }
}

fn feature_cuts(column: ArrayView1<f32>, max_bin: usize) -> Vec<f32> {
    let mut sorted: Vec<f32> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f32::total_cmp);
    if sorted.is_empty() {
        return Vec::new();
    }

    let mut distinct = sorted.clone();
    distinct.dedup();
    let max_value = distinct[distinct.len() - 1];

    let mut cuts = if distinct.len() <= max_bin {
        distinct
    } else {
        let n = sorted.len();
        let mut cuts: Vec<f32> = (1..max_bin).map(|k| sorted[(k * n / max_bin).min(n - 1)]).collect();
        cuts.dedup();
        cuts
    };
    // A cut at the maximum sends every row left.
    cuts.retain(|&c| c < max_value);
    cuts
}

/// Bin indices stored feature-major: `bins[[feature, row]]`.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Array2<u16>,
}

impl BinnedMatrix {
    pub fn from_features(features: ArrayView2<f32>, cuts: &BinCuts) -> Self {
        let (n_rows, n_features) = features.dim();
        let bins = Array2::from_shape_fn((n_features, n_rows), |(f, r)| {
            cuts.bin_of(f, features[[r, f]])
        });
        Self { bins }
    }

    pub fn n_rows(&self) -> usize {
        self.bins.ncols()
    }

    pub fn n_features(&self) -> usize {
        self.bins.nrows()
    }

    #[inline]
    pub fn feature(&self, feature: usize) -> ArrayView1<'_, u16> {
        self.bins.row(feature)
    }
}
