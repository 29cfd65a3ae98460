//! JSON model files.
//!
//! A model file wraps the serialized [`GBDTModel`] in an envelope carrying a
//! format tag and version so readers can reject files they do not understand.
//! Loaded models are validated structurally before use.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::repr::ForestValidationError;

use super::GBDTModel;

pub const MODEL_FORMAT: &str = "boostlab-gbdt";
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Errors while reading or writing model files.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported model format '{format}' version {version}")]
    Unsupported { format: String, version: u32 },

    #[error("invalid model: {0}")]
    InvalidForest(#[from] ForestValidationError),

    #[error("invalid model: {0}")]
    InvalidMeta(String),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: &'static str,
    format_version: u32,
    model: &'a GBDTModel,
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    format_version: u32,
    model: GBDTModel,
}

impl GBDTModel {
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(&EnvelopeRef {
            format: MODEL_FORMAT,
            format_version: MODEL_FORMAT_VERSION,
            model: self,
        })?)
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        let envelope: Envelope = serde_json::from_str(json)?;
        if envelope.format != MODEL_FORMAT || envelope.format_version != MODEL_FORMAT_VERSION {
            return Err(PersistError::Unsupported {
                format: envelope.format,
                version: envelope.format_version,
            });
        }
        let model = envelope.model;
        model.forest().validate(model.n_features())?;
        if let Some(names) = &model.meta().feature_names
            && names.len() != model.n_features()
        {
            return Err(PersistError::InvalidMeta(format!(
                "{} feature names for {} features",
                names.len(),
                model.n_features()
            )));
        }
        model
            .params()
            .validate()
            .map_err(|e| PersistError::InvalidMeta(e.to_string()))?;
        Ok(model)
    }

    /// Write the model file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoosterParams;
    use crate::testing::{random_dense_f32, synthetic_binary_targets};

    fn model() -> GBDTModel {
        let x = random_dense_f32(60, 2, 3, -1.0, 1.0);
        let y = synthetic_binary_targets(x.view(), 4, 0.1);
        GBDTModel::fit(x.view(), y.view(), &BoosterParams::default(), 4)
            .unwrap()
            .with_feature_names(vec!["a".into(), "b".into()])
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/model.json");
        let model = model();
        model.save(&path).unwrap();
        assert_eq!(GBDTModel::load(&path).unwrap(), model);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut json: serde_json::Value = serde_json::from_str(&model().to_json().unwrap()).unwrap();
        json["format_version"] = 99.into();
        assert!(matches!(
            GBDTModel::from_json(&json.to_string()),
            Err(PersistError::Unsupported { version: 99, .. })
        ));
    }

    #[test]
    fn rejects_mismatched_feature_names() {
        let mut json: serde_json::Value = serde_json::from_str(&model().to_json().unwrap()).unwrap();
        json["model"]["meta"]["feature_names"] = serde_json::json!(["only_one"]);
        assert!(matches!(
            GBDTModel::from_json(&json.to_string()),
            Err(PersistError::InvalidMeta(_))
        ));
    }
}
