//! Equal-frequency lift chart.

use serde::{Deserialize, Serialize};

use crate::utils::quantile_sorted;

/// One bin of a lift chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftBin {
    /// 1-based position among the non-empty bins' intervals.
    pub bin: usize,
    pub lower: f64,
    pub upper: f64,
    pub avg_prediction: f64,
    /// Mean target in the bin (the positive rate for 0/1 labels).
    pub actual_rate: f64,
    pub count: usize,
}

/// Bin predictions by quantile and report mean prediction vs. mean target.
///
/// Edges are the `i / n_bins` quantiles (linear interpolation) of the
/// predictions; duplicate edges are dropped. Interval `k` is
/// `(edge[k], edge[k + 1]]`, and the first interval also holds the minimum.
/// When all predictions are equal there is a single bin. Empty bins are
/// omitted, so the result has at most `n_bins` entries and the counts sum to
/// the number of predictions.
pub fn lift_chart(predictions: &[f32], targets: &[f32], n_bins: usize) -> Vec<LiftBin> {
    debug_assert_eq!(predictions.len(), targets.len());
    if predictions.is_empty() {
        return Vec::new();
    }
    let n_bins = n_bins.max(1);

    let mut sorted: Vec<f64> = predictions.iter().map(|&p| f64::from(p)).collect();
    sorted.sort_by(f64::total_cmp);
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| quantile_sorted(&sorted, i as f64 / n_bins as f64))
        .collect();
    edges.dedup();
    if edges.len() < 2 {
        let only = edges[0];
        edges.push(only);
    }
    let n_intervals = edges.len() - 1;

    let mut sums = vec![(0.0f64, 0.0f64, 0usize); n_intervals];
    for (&p, &y) in predictions.iter().zip(targets) {
        let p = f64::from(p);
        let k = edges[1..].partition_point(|&e| e < p).min(n_intervals - 1);
        let slot = &mut sums[k];
        slot.0 += p;
        slot.1 += f64::from(y);
        slot.2 += 1;
    }

    sums.into_iter()
        .enumerate()
        .filter(|(_, (_, _, count))| *count > 0)
        .map(|(k, (pred_sum, target_sum, count))| LiftBin {
            bin: k + 1,
            lower: edges[k],
            upper: edges[k + 1],
            avg_prediction: pred_sum / count as f64,
            actual_rate: target_sum / count as f64,
            count,
        })
        .collect()
}
