//! Fit-once / apply-many feature transform.
//!
//! Numeric columns get missing cells replaced by a fill value. Categorical
//! (and datetime) columns replace missing cells with [`MISSING_TOKEN`] and
//! then map every category to its first-seen position. The fitted
//! [`TransformArtifact`] is serializable and reproduces the exact mapping in
//! apply mode, where unseen categories become [`UNKNOWN_CODE`].

use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::{Cell, Dataset};
use crate::error::TrainingError;
use crate::utils::median;

use super::classify::{Classification, ColumnType, DATETIME_FORMAT};

/// Category standing in for missing categorical cells.
pub const MISSING_TOKEN: &str = "missing";
/// Code emitted in apply mode for categories not seen at fit time.
pub const UNKNOWN_CODE: i64 = -1;
/// Default fill value for missing numeric cells.
pub const DEFAULT_SENTINEL: f64 = -9999.0;

// =============================================================================
// Policy and artifacts
// =============================================================================

/// How missing numeric cells are filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ImputationPolicy {
    /// A constant value outside the data range.
    Sentinel { fill_value: f64 },
    /// The median of the present values at fit time.
    Median,
}

impl Default for ImputationPolicy {
    fn default() -> Self {
        Self::Sentinel {
            fill_value: DEFAULT_SENTINEL,
        }
    }
}

/// What a single column needs to be re-transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnArtifact {
    Numeric {
        fill_value: f64,
    },
    Categorical {
        /// Categories in code order.
        categories: Vec<String>,
        missing_token: String,
        unknown_code: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureArtifact {
    pub name: String,
    pub source_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_format: Option<String>,
    pub artifact: ColumnArtifact,
}

/// One step of the declarative pipeline description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    pub transformer: String,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Fitted transform for a fixed, ordered list of feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformArtifact {
    policy: ImputationPolicy,
    features: Vec<FeatureArtifact>,
}

impl TransformArtifact {
    /// Fit on classified columns and transform them in one pass.
    ///
    /// Returns the artifact and an `(n_rows, n_features)` matrix without NaNs.
    pub fn fit_transform(classification: &Classification<'_>, policy: ImputationPolicy) -> (Self, Array2<f32>) {
        let n_rows = classification.columns.first().map_or(0, |c| c.column.len());
        let mut matrix = Array2::<f32>::zeros((n_rows, classification.columns.len()));
        let mut features = Vec::with_capacity(classification.columns.len());

        for (j, classified) in classification.columns.iter().enumerate() {
            let cells = classified.column.cells();
            let artifact = match classified.kind {
                ColumnType::Numeric => {
                    let fill_value = numeric_fill(cells, policy);
                    for (i, cell) in cells.iter().enumerate() {
                        matrix[[i, j]] = numeric_value(cell, fill_value);
                    }
                    ColumnArtifact::Numeric { fill_value }
                }
                ColumnType::Categorical | ColumnType::Datetime => {
                    let format = classified.datetime_format.unwrap_or(DATETIME_FORMAT);
                    let mut categories: Vec<String> = Vec::new();
                    let mut codes: HashMap<String, usize> = HashMap::new();
                    for (i, cell) in cells.iter().enumerate() {
                        let key = category_key(cell, format);
                        let code = match codes.get(&key) {
                            Some(&code) => code,
                            None => {
                                categories.push(key.clone());
                                codes.insert(key, categories.len() - 1);
                                categories.len() - 1
                            }
                        };
                        matrix[[i, j]] = code as f32;
                    }
                    ColumnArtifact::Categorical {
                        categories,
                        missing_token: MISSING_TOKEN.to_string(),
                        unknown_code: UNKNOWN_CODE,
                    }
                }
            };
            features.push(FeatureArtifact {
                name: classified.column.name().to_string(),
                source_type: classified.kind,
                datetime_format: classified.datetime_format.map(str::to_string),
                artifact,
            });
        }

        (Self { policy, features }, matrix)
    }

    /// Apply the fitted transform to new data with the same feature columns.
    ///
    /// Never refits: numeric cells that are missing (or not numbers) take the
    /// stored fill value and unseen categories take the unknown code.
    ///
    /// # Errors
    ///
    /// [`TrainingError::ColumnNotFound`] if a fitted feature is absent.
    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f32>, TrainingError> {
        let mut matrix = Array2::<f32>::zeros((dataset.n_rows(), self.features.len()));
        for (j, feature) in self.features.iter().enumerate() {
            let cells = dataset.require(&feature.name)?.cells();
            match &feature.artifact {
                ColumnArtifact::Numeric { fill_value } => {
                    for (i, cell) in cells.iter().enumerate() {
                        matrix[[i, j]] = numeric_value(cell, *fill_value);
                    }
                }
                ColumnArtifact::Categorical {
                    categories,
                    missing_token,
                    unknown_code,
                } => {
                    let format = feature.datetime_format.as_deref().unwrap_or(DATETIME_FORMAT);
                    let codes: HashMap<&str, usize> =
                        categories.iter().enumerate().map(|(c, k)| (k.as_str(), c)).collect();
                    for (i, cell) in cells.iter().enumerate() {
                        let key = cell
                            .category_string(format)
                            .unwrap_or_else(|| missing_token.clone());
                        matrix[[i, j]] = codes.get(key.as_str()).map_or(*unknown_code as f32, |&c| c as f32);
                    }
                }
            }
        }
        Ok(matrix)
    }

    pub fn policy(&self) -> ImputationPolicy {
        self.policy
    }

    pub fn features(&self) -> &[FeatureArtifact] {
        &self.features
    }

    /// Output column names, one per input feature.
    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Declarative description of the fitted steps, for reproducing the
    /// transform outside this crate.
    pub fn pipeline_definition(&self) -> Vec<PipelineStep> {
        let of_type = |pred: fn(ColumnType) -> bool| -> Vec<String> {
            self.features
                .iter()
                .filter(|f| pred(f.source_type))
                .map(|f| f.name.clone())
                .collect()
        };
        let datetime = of_type(|t| t == ColumnType::Datetime);
        let numeric = of_type(|t| t == ColumnType::Numeric);
        let categorical = of_type(ColumnType::is_categorical);

        let mut steps = Vec::new();
        if !datetime.is_empty() {
            steps.push(PipelineStep {
                name: "datetime_to_string".into(),
                transformer: "datetime_format".into(),
                columns: datetime,
                options: BTreeMap::new(),
            });
        }
        if !numeric.is_empty() {
            let options = match self.policy {
                ImputationPolicy::Sentinel { fill_value } => BTreeMap::from([
                    ("strategy".to_string(), "constant".into()),
                    ("fill_value".to_string(), fill_value.into()),
                ]),
                ImputationPolicy::Median => BTreeMap::from([("strategy".to_string(), "median".into())]),
            };
            steps.push(PipelineStep {
                name: "numeric".into(),
                transformer: "simple_imputer".into(),
                columns: numeric,
                options,
            });
        }
        if !categorical.is_empty() {
            steps.push(PipelineStep {
                name: "categorical_impute".into(),
                transformer: "simple_imputer".into(),
                columns: categorical.clone(),
                options: BTreeMap::from([
                    ("strategy".to_string(), "constant".into()),
                    ("fill_value".to_string(), MISSING_TOKEN.into()),
                ]),
            });
            steps.push(PipelineStep {
                name: "categorical_encode".into(),
                transformer: "ordinal_encoder".into(),
                columns: categorical,
                options: BTreeMap::from([
                    ("handle_unknown".to_string(), "use_encoded_value".into()),
                    ("unknown_value".to_string(), UNKNOWN_CODE.into()),
                ]),
            });
        }
        steps
    }
}

// =============================================================================
// Cell conversion
// =============================================================================

fn numeric_fill(cells: &[Cell], policy: ImputationPolicy) -> f64 {
    match policy {
        ImputationPolicy::Sentinel { fill_value } => fill_value,
        ImputationPolicy::Median => {
            let present: Vec<f64> = cells
                .iter()
                .filter_map(Cell::as_number)
                .filter(|v| v.is_finite())
                .collect();
            median(&present).unwrap_or(DEFAULT_SENTINEL)
        }
    }
}

/// Non-finite values count as missing; finite values saturate at the `f32` range.
fn numeric_value(cell: &Cell, fill_value: f64) -> f32 {
    let v = cell.as_number().filter(|v| v.is_finite()).unwrap_or(fill_value);
    v.clamp(f64::from(f32::MIN), f64::from(f32::MAX)) as f32
}

fn category_key(cell: &Cell, datetime_format: &str) -> String {
    cell.category_string(datetime_format)
        .unwrap_or_else(|| MISSING_TOKEN.to_string())
}
