//! Preprocessing: raw dataset to a dense numeric matrix and encoded target.
//!
//! # Key Types
//!
//! - [`classify_columns`] - Numeric / categorical / datetime partition
//! - [`TransformArtifact`] - Fitted feature transform (fit-transform and apply)
//! - [`encode_target`] - Target pass-through or lexicographic label table
//! - [`stratified_split`] / [`shuffled_split`] - Seeded train/test partition

pub mod classify;
pub mod split;
pub mod target;
pub mod transform;

use ndarray::{Array1, Array2};

use crate::data::Dataset;
use crate::error::TrainingError;

pub use classify::{ClassifiedColumn, Classification, ColumnType, ColumnTypes, classify_columns};
pub use split::{TrainTestSplit, shuffled_split, stratified_split};
pub use target::{EncodedTarget, TargetEncoding, encode_target};
pub use transform::{
    ColumnArtifact, DEFAULT_SENTINEL, FeatureArtifact, ImputationPolicy, MISSING_TOKEN, PipelineStep,
    TransformArtifact, UNKNOWN_CODE,
};

/// Everything the later phases need from preprocessing.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// `(n_rows, n_features)`, no missing values.
    pub features: Array2<f32>,
    pub targets: Array1<f32>,
    pub column_types: ColumnTypes,
    pub transform: TransformArtifact,
    pub target_encoding: Option<TargetEncoding>,
}

/// Classify, encode the target and fit the feature transform.
///
/// # Errors
///
/// [`TrainingError::ColumnNotFound`] for an absent target or feature column,
/// [`TrainingError::MissingTarget`] if the target has missing cells.
pub fn prepare(
    dataset: &Dataset,
    features: &[String],
    target: &str,
    policy: ImputationPolicy,
) -> Result<Prepared, TrainingError> {
    let target_column = dataset.require(target)?;
    let classification = classify_columns(dataset, features)?;
    let encoded = encode_target(target_column)?;
    let (transform, matrix) = TransformArtifact::fit_transform(&classification, policy);

    Ok(Prepared {
        features: matrix,
        targets: encoded.values,
        column_types: classification.groups,
        transform,
        target_encoding: encoded.encoding,
    })
}
