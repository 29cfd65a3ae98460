//! Feature importance computed from tree structure and node statistics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repr::Forest;

/// Kind of feature importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of times each feature is used in splits.
    #[default]
    Split,
    /// Total gain from splits using each feature.
    Gain,
    /// Gain divided by split count.
    AverageGain,
    /// Total cover (hessian sum) at nodes splitting on each feature.
    Cover,
    /// Cover divided by split count.
    AverageCover,
}

impl ImportanceType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Split => "split",
            Self::Gain => "gain",
            Self::AverageGain => "average_gain",
            Self::Cover => "cover",
            Self::AverageCover => "average_cover",
        }
    }

    /// Whether computing this kind reads gains or covers.
    pub fn needs_node_stats(self) -> bool {
        !matches!(self, Self::Split)
    }
}

impl fmt::Display for ImportanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extractors tried in order by [`importance_with_fallback`]: average gain,
/// then split count, then average cover.
pub const IMPORTANCE_PREFERENCE: [ImportanceType; 3] = [
    ImportanceType::AverageGain,
    ImportanceType::Split,
    ImportanceType::AverageCover,
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    #[error("{0} importance requires node statistics, which the model does not carry")]
    MissingNodeStats(ImportanceType),
}

/// Importance scores, one per feature position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    values: Vec<f64>,
    kind: ImportanceType,
}

impl FeatureImportance {
    pub fn new(values: Vec<f64>, kind: ImportanceType) -> Self {
        Self { values, kind }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn kind(&self) -> ImportanceType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when at least one feature has a positive score.
    pub fn has_signal(&self) -> bool {
        self.values.iter().any(|&v| v > 0.0)
    }

    /// Scores scaled to sum to 1 (all zeros stay zeros).
    pub fn normalized(&self) -> Self {
        let total: f64 = self.values.iter().sum();
        let values = if total > 0.0 {
            self.values.iter().map(|v| v / total).collect()
        } else {
            vec![0.0; self.values.len()]
        };
        Self::new(values, self.kind)
    }

    /// The `k` highest-scoring features as `(index, score)`, best first.
    /// Equal scores keep feature order.
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.values.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);
        ranked
    }

    /// Scores keyed by feature name. Positions without a name are `f{index}`.
    pub fn to_named(&self, names: Option<&[String]>) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let name = names
                    .and_then(|n| n.get(i))
                    .cloned()
                    .unwrap_or_else(|| format!("f{i}"));
                (name, v)
            })
            .collect()
    }
}

/// Compute importance of `kind` over every split node of `forest`.
///
/// Features that never appear in a split score 0. Split indices at or past
/// `n_features` are ignored.
///
/// # Errors
///
/// [`ExplainError::MissingNodeStats`] if `kind` needs gains or covers and a
/// tree with splits was stored without them.
pub fn compute_forest_importance(
    forest: &Forest,
    n_features: usize,
    kind: ImportanceType,
) -> Result<FeatureImportance, ExplainError> {
    let mut counts = vec![0u32; n_features];
    let mut gains = vec![0.0f64; n_features];
    let mut covers = vec![0.0f64; n_features];

    for tree in forest.trees() {
        let stats = tree.stats();
        for node in tree.split_nodes() {
            let feature = tree.split_index(node) as usize;
            if feature >= n_features {
                continue;
            }
            counts[feature] += 1;
            match stats {
                Some(s) => {
                    gains[feature] += f64::from(s.gains[node as usize]);
                    covers[feature] += f64::from(s.covers[node as usize]);
                }
                None if kind.needs_node_stats() => return Err(ExplainError::MissingNodeStats(kind)),
                None => {}
            }
        }
    }

    let average = |totals: Vec<f64>| -> Vec<f64> {
        totals
            .into_iter()
            .zip(&counts)
            .map(|(t, &c)| if c == 0 { 0.0 } else { t / f64::from(c) })
            .collect()
    };

    let values = match kind {
        ImportanceType::Split => counts.iter().map(|&c| f64::from(c)).collect(),
        ImportanceType::Gain => gains,
        ImportanceType::AverageGain => average(gains),
        ImportanceType::Cover => covers,
        ImportanceType::AverageCover => average(covers),
    };
    Ok(FeatureImportance::new(values, kind))
}

/// Try each kind in `preference` and return the first with a positive score.
///
/// Kinds the model cannot compute are skipped. When nothing has signal (for
/// example, every tree is a single leaf) the result is all zeros.
pub fn importance_with_fallback(
    forest: &Forest,
    n_features: usize,
    preference: &[ImportanceType],
) -> FeatureImportance {
    for &kind in preference {
        match compute_forest_importance(forest, n_features, kind) {
            Ok(importance) if importance.has_signal() => return importance,
            Ok(_) => {}
            Err(e) => tracing::debug!(%e, "skipping importance kind"),
        }
    }
    FeatureImportance::new(
        vec![0.0; n_features],
        preference.first().copied().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{MutableTree, Tree};
    use approx::assert_abs_diff_eq;

    /// Root splits f0 (gain 4, cover 10); left child splits f1 (gain 2, cover 6).
    fn tree() -> Tree {
        let mut t = MutableTree::with_root(0.0, 10.0);
        let (left, _) = t.apply_split(0, 0, 0.5, 4.0, (0.0, 6.0), (1.0, 4.0));
        t.apply_split(left, 1, 1.0, 2.0, (-1.0, 3.0), (0.5, 3.0));
        t.freeze()
    }

    fn forest() -> Forest {
        let mut f = Forest::new(0.0);
        f.push(tree());
        // Second tree splits f0 once with gain 1 and cover 8.
        let mut t = MutableTree::with_root(0.0, 8.0);
        t.apply_split(0, 0, 0.2, 1.0, (0.1, 4.0), (0.2, 4.0));
        f.push(t.freeze());
        f
    }

    #[test]
    fn split_counts() {
        let imp = compute_forest_importance(&forest(), 3, ImportanceType::Split).unwrap();
        assert_eq!(imp.values(), &[2.0, 1.0, 0.0]);
    }

    #[test]
    fn gain_and_averages() {
        let f = forest();
        let gain = compute_forest_importance(&f, 3, ImportanceType::Gain).unwrap();
        assert_eq!(gain.values(), &[5.0, 2.0, 0.0]);
        let avg = compute_forest_importance(&f, 3, ImportanceType::AverageGain).unwrap();
        assert_abs_diff_eq!(avg.values()[0], 2.5);
        assert_abs_diff_eq!(avg.values()[1], 2.0);
        let cover = compute_forest_importance(&f, 3, ImportanceType::AverageCover).unwrap();
        assert_abs_diff_eq!(cover.values()[0], 9.0);
        assert_abs_diff_eq!(cover.values()[2], 0.0);
    }

    #[test]
    fn normalized_and_top_k() {
        let imp = FeatureImportance::new(vec![1.0, 3.0, 0.0, 3.0], ImportanceType::Gain);
        let norm = imp.normalized();
        assert_abs_diff_eq!(norm.values().iter().sum::<f64>(), 1.0);
        assert_eq!(imp.top_k(2), vec![(1, 3.0), (3, 3.0)]);
        assert_eq!(imp.top_k(10).len(), 4);
    }

    #[test]
    fn named_scores_fill_missing_names() {
        let imp = FeatureImportance::new(vec![1.0, 2.0], ImportanceType::Split);
        let names = vec!["age".to_string()];
        let named = imp.to_named(Some(&names));
        assert_eq!(named["age"], 1.0);
        assert_eq!(named["f1"], 2.0);
    }

    #[test]
    fn fallback_skips_missing_stats() {
        let stripped = forest().without_stats();
        let imp = importance_with_fallback(&stripped, 3, &IMPORTANCE_PREFERENCE);
        assert_eq!(imp.kind(), ImportanceType::Split);
        assert_eq!(imp.values(), &[2.0, 1.0, 0.0]);
    }

    #[test]
    fn fallback_prefers_average_gain() {
        let imp = importance_with_fallback(&forest(), 3, &IMPORTANCE_PREFERENCE);
        assert_eq!(imp.kind(), ImportanceType::AverageGain);
    }

    #[test]
    fn fallback_on_stumps_is_all_zero() {
        let mut f = Forest::new(0.5);
        f.push(Tree::leaf(0.1));
        let imp = importance_with_fallback(&f, 2, &IMPORTANCE_PREFERENCE);
        assert!(!imp.has_signal());
        assert_eq!(imp.values(), &[0.0, 0.0]);
    }
}
