//! Target column encoding.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::data::{Column, NativeType};
use crate::error::TrainingError;

use super::classify::DATETIME_FORMAT;

/// Decode table for non-numeric labels: position is the encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEncoding {
    classes: Vec<String>,
}

impl TargetEncoding {
    /// Build from labels; they are sorted and deduplicated.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Encoded target values and, for non-numeric labels, the decode table.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTarget {
    pub values: Array1<f32>,
    pub encoding: Option<TargetEncoding>,
}

/// Encode a target column.
///
/// Numeric columns pass through; anything else is mapped onto the index of
/// its label in lexicographic order.
///
/// # Errors
///
/// [`TrainingError::MissingTarget`] if any cell is missing.
pub fn encode_target(column: &Column) -> Result<EncodedTarget, TrainingError> {
    let missing = column.missing_count();
    if missing > 0 {
        return Err(TrainingError::MissingTarget {
            column: column.name().to_string(),
            missing,
        });
    }

    if column.native_type() == NativeType::Number {
        let values = column
            .cells()
            .iter()
            .map(|c| c.as_number().unwrap_or(f64::NAN) as f32)
            .collect();
        return Ok(EncodedTarget { values, encoding: None });
    }

    let labels: Vec<String> = column
        .cells()
        .iter()
        .filter_map(|c| c.category_string(DATETIME_FORMAT))
        .collect();
    let encoding = TargetEncoding::from_labels(labels.iter().cloned());
    let values = labels
        .iter()
        .map(|l| encoding.encode(l).map_or(f32::NAN, |code| code as f32))
        .collect();
    Ok(EncodedTarget {
        values,
        encoding: Some(encoding),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;

    #[test]
    fn numeric_passes_through() {
        let col = Column::from_values("y", [0.0, 1.0, 1.0]);
        let enc = encode_target(&col).unwrap();
        assert_eq!(enc.values.to_vec(), vec![0.0, 1.0, 1.0]);
        assert!(enc.encoding.is_none());
    }

    #[test]
    fn labels_sorted_lexicographically() {
        let col = Column::from_values("y", ["yes", "no", "yes", "maybe"]);
        let enc = encode_target(&col).unwrap();
        let table = enc.encoding.unwrap();
        assert_eq!(table.classes(), &["maybe", "no", "yes"]);
        assert_eq!(enc.values.to_vec(), vec![2.0, 1.0, 2.0, 0.0]);
        assert_eq!(table.decode(1), Some("no"));
    }

    #[test]
    fn mixed_numbers_and_text_are_labels() {
        let col = Column::new("y", vec![Cell::Number(1.0), Cell::Text("b".into())]);
        let enc = encode_target(&col).unwrap();
        assert_eq!(enc.encoding.unwrap().classes(), &["1", "b"]);
    }

    #[test]
    fn missing_target_rejected() {
        let col = Column::from_values("label", [Some(1.0), None, Some(f64::NAN)]);
        assert_eq!(
            encode_target(&col).unwrap_err(),
            TrainingError::MissingTarget {
                column: "label".into(),
                missing: 2
            }
        );
    }
}
