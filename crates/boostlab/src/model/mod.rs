//! High-level model API.
//!
//! - [`BoosterParams`] - Typed, validated hyperparameters (bon builder)
//! - [`GBDTModel`] - Fit, predict, feature importance, JSON persistence

pub mod config;
pub mod gbdt;
pub mod persist;

pub use config::{BoosterParams, ParamValidationError};
pub use gbdt::{GBDTModel, ModelMeta};
pub use persist::PersistError;
