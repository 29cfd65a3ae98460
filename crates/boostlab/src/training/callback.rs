//! Early stopping on a monitored validation metric.

use super::metrics::{Metric, MetricFn};

/// Tracks the best value of a metric across rounds and signals when the
/// metric has not improved for `patience` consecutive rounds.
///
/// A patience of zero disables stopping; the best round is still tracked.
///
/// # Example
///
/// ```
/// use boostlab::training::{EarlyStopping, Metric};
///
/// let mut early_stop = EarlyStopping::new(2, Metric::Auc);
/// assert!(!early_stop.should_stop(0.80));
/// assert!(!early_stop.should_stop(0.79));
/// assert!(early_stop.should_stop(0.78));
/// assert_eq!(early_stop.best_round(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    metric: Metric,
    best_value: Option<f64>,
    best_round: usize,
    current_round: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize, metric: Metric) -> Self {
        Self {
            patience,
            metric,
            best_value: None,
            best_round: 0,
            current_round: 0,
        }
    }

    /// Record the metric for the current round. Returns `true` once the
    /// metric has gone `patience` rounds without a strict improvement.
    pub fn should_stop(&mut self, value: f64) -> bool {
        let is_improvement = match self.best_value {
            None => true,
            Some(best) => self.metric.is_better(value, best),
        };

        if is_improvement {
            self.best_value = Some(value);
            self.best_round = self.current_round;
        }

        self.current_round += 1;

        self.patience > 0 && self.current_round - self.best_round > self.patience
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Zero-based round with the best value.
    pub fn best_round(&self) -> usize {
        self.best_round
    }

    /// Number of rounds recorded so far.
    pub fn rounds_seen(&self) -> usize {
        self.current_round
    }

    pub fn higher_is_better(&self) -> bool {
        self.metric.higher_is_better()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_going_while_improving() {
        let mut early_stop = EarlyStopping::new(3, Metric::Rmse);
        for v in [1.0, 0.9, 0.8, 0.7, 0.6] {
            assert!(!early_stop.should_stop(v));
        }
        assert_eq!(early_stop.best_round(), 4);
        assert_eq!(early_stop.best_value(), Some(0.6));
    }

    #[test]
    fn stops_after_patience_rounds_without_improvement() {
        let mut early_stop = EarlyStopping::new(3, Metric::Rmse);
        assert!(!early_stop.should_stop(0.5));
        assert!(!early_stop.should_stop(0.6));
        assert!(!early_stop.should_stop(0.7));
        assert!(early_stop.should_stop(0.8));
        assert_eq!(early_stop.best_round(), 0);
        assert_eq!(early_stop.rounds_seen(), 4);
    }

    #[test]
    fn improvement_resets_window() {
        let mut early_stop = EarlyStopping::new(2, Metric::Auc);
        assert!(!early_stop.should_stop(0.8));
        assert!(!early_stop.should_stop(0.9));
        assert!(!early_stop.should_stop(0.85));
        // Equal is not an improvement.
        assert!(early_stop.should_stop(0.9));
        assert_eq!(early_stop.best_round(), 1);
    }

    #[test]
    fn zero_patience_never_stops() {
        let mut early_stop = EarlyStopping::new(0, Metric::Auc);
        for v in [0.9, 0.5, 0.4, 0.3] {
            assert!(!early_stop.should_stop(v));
        }
        assert_eq!(early_stop.best_round(), 0);
    }

    #[test]
    fn nan_never_becomes_best_after_first() {
        let mut early_stop = EarlyStopping::new(5, Metric::Auc);
        early_stop.should_stop(0.7);
        early_stop.should_stop(f64::NAN);
        assert_eq!(early_stop.best_value(), Some(0.7));
    }
}
