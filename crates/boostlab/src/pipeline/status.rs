//! Run status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a training run.
///
/// Forward order is [`RunStatus::SEQUENCE`]; [`RunStatus::Failed`] can be
/// entered from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    LoadingData,
    Preprocessing,
    Splitting,
    Tuning,
    Finalizing,
    Evaluating,
    Completed,
    Failed,
}

impl RunStatus {
    /// Forward order of a successful run.
    pub const SEQUENCE: [RunStatus; 7] = [
        RunStatus::LoadingData,
        RunStatus::Preprocessing,
        RunStatus::Splitting,
        RunStatus::Tuning,
        RunStatus::Finalizing,
        RunStatus::Evaluating,
        RunStatus::Completed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RunStatus::LoadingData => "loading_data",
            RunStatus::Preprocessing => "preprocessing",
            RunStatus::Splitting => "splitting",
            RunStatus::Tuning => "tuning",
            RunStatus::Finalizing => "finalizing",
            RunStatus::Evaluating => "evaluating",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// The phase after `self` in a successful run.
    pub fn next(self) -> Option<RunStatus> {
        let pos = Self::SEQUENCE.iter().position(|&s| s == self)?;
        Self::SEQUENCE.get(pos + 1).copied()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("run already finished as {0}")]
    Finished(RunStatus),

    #[error("cannot move from {} to {to}", .from.map_or("start", RunStatus::name))]
    OutOfOrder { from: Option<RunStatus>, to: RunStatus },
}

/// Tracks the phases a run has entered and enforces the transition rules.
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    history: Vec<RunStatus>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest status, `None` before the first transition.
    pub fn current(&self) -> Option<RunStatus> {
        self.history.last().copied()
    }

    pub fn history(&self) -> &[RunStatus] {
        &self.history
    }

    /// The phase that was active when the run failed (or is active now).
    pub fn active_phase(&self) -> Option<RunStatus> {
        self.history.iter().rev().copied().find(|s| !s.is_terminal())
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// After a terminal status nothing is accepted. Otherwise `to` must be
    /// the next phase in [`RunStatus::SEQUENCE`] or [`RunStatus::Failed`].
    pub fn advance(&mut self, to: RunStatus) -> Result<(), TransitionError> {
        let from = self.current();
        let allowed = match from {
            Some(s) if s.is_terminal() => return Err(TransitionError::Finished(s)),
            Some(s) => to == RunStatus::Failed || s.next() == Some(to),
            None => to == RunStatus::LoadingData || to == RunStatus::Failed,
        };
        if !allowed {
            return Err(TransitionError::OutOfOrder { from, to });
        }
        self.history.push(to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_sequence() {
        let mut tracker = PhaseTracker::new();
        for status in RunStatus::SEQUENCE {
            tracker.advance(status).unwrap();
        }
        assert_eq!(tracker.current(), Some(RunStatus::Completed));
        assert_eq!(tracker.history().len(), 7);
    }

    #[test]
    fn no_skipping_or_going_back() {
        let mut tracker = PhaseTracker::new();
        assert!(tracker.advance(RunStatus::Tuning).is_err());
        tracker.advance(RunStatus::LoadingData).unwrap();
        assert_eq!(
            tracker.advance(RunStatus::Splitting),
            Err(TransitionError::OutOfOrder {
                from: Some(RunStatus::LoadingData),
                to: RunStatus::Splitting
            })
        );
        tracker.advance(RunStatus::Preprocessing).unwrap();
        assert!(tracker.advance(RunStatus::LoadingData).is_err());
    }

    #[test]
    fn failed_from_any_phase_then_frozen() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(RunStatus::LoadingData).unwrap();
        tracker.advance(RunStatus::Preprocessing).unwrap();
        tracker.advance(RunStatus::Failed).unwrap();
        assert_eq!(tracker.active_phase(), Some(RunStatus::Preprocessing));
        assert_eq!(
            tracker.advance(RunStatus::Splitting),
            Err(TransitionError::Finished(RunStatus::Failed))
        );
        assert!(tracker.advance(RunStatus::Failed).is_err());
    }

    #[test]
    fn nothing_after_completed() {
        let mut tracker = PhaseTracker::new();
        for status in RunStatus::SEQUENCE {
            tracker.advance(status).unwrap();
        }
        assert!(tracker.advance(RunStatus::Failed).is_err());
    }

    #[test]
    fn serde_names_match_display() {
        for status in RunStatus::SEQUENCE {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        assert_eq!(RunStatus::Evaluating.next(), Some(RunStatus::Completed));
        assert_eq!(RunStatus::Completed.next(), None);
        assert_eq!(RunStatus::Failed.next(), None);
    }
}
