//! Explainability module.
//!
//! # Feature Importance
//!
//! Multiple importance types are supported:
//! - **Split**: Number of times each feature is used in splits
//! - **Gain**: Total gain from splits using each feature
//! - **AverageGain**: Gain divided by split count
//! - **Cover**: Total cover (hessian sum) at nodes using each feature
//! - **AverageCover**: Cover divided by split count
//!
//! Gain and cover kinds need the per-node statistics recorded during
//! training. [`importance_with_fallback`] walks an ordered preference list
//! and returns the first kind with signal.
//!
//! # Example
//!
//! ```ignore
//! use boostlab::explainability::ImportanceType;
//!
//! let importance = model.feature_importance(ImportanceType::Gain)?;
//! let top5 = importance.top_k(5);
//! ```

mod importance;

pub use importance::{
    ExplainError, FeatureImportance, IMPORTANCE_PREFERENCE, ImportanceType, compute_forest_importance,
    importance_with_fallback,
};
