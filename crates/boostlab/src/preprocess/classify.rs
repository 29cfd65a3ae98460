//! Partition feature columns into numeric, categorical and datetime groups.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::data::{Cell, Column, Dataset, NativeType};
use crate::error::TrainingError;

/// Canonical string form of date-only columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical string form of columns carrying a time of day.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a feature column is treated by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    /// Encoded like a categorical column after conversion to its canonical string.
    Datetime,
}

impl ColumnType {
    pub fn is_categorical(self) -> bool {
        !matches!(self, Self::Numeric)
    }
}

/// Column names per group, in feature order.
///
/// Datetime columns appear in both `categorical` and `datetime`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnTypes {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
}

/// A feature column with its assigned type.
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedColumn<'a> {
    pub column: &'a Column,
    pub kind: ColumnType,
    /// `strftime` format for datetime columns.
    pub datetime_format: Option<&'static str>,
}

/// Classifier output: typed columns in request order plus the grouped names.
#[derive(Debug, Clone)]
pub struct Classification<'a> {
    pub columns: Vec<ClassifiedColumn<'a>>,
    pub groups: ColumnTypes,
}

/// Assign a [`ColumnType`] to every requested feature column.
///
/// # Errors
///
/// [`TrainingError::ColumnNotFound`] for the first feature missing from the dataset.
pub fn classify_columns<'a>(dataset: &'a Dataset, features: &[String]) -> Result<Classification<'a>, TrainingError> {
    let mut columns = Vec::with_capacity(features.len());
    let mut groups = ColumnTypes::default();

    for name in features {
        let column = dataset.require(name)?;
        let (kind, datetime_format) = match column.native_type() {
            NativeType::Number => (ColumnType::Numeric, None),
            NativeType::DateTime => (ColumnType::Datetime, Some(datetime_format(column))),
            NativeType::Text => (ColumnType::Categorical, None),
        };
        match kind {
            ColumnType::Numeric => groups.numeric.push(name.clone()),
            ColumnType::Categorical => groups.categorical.push(name.clone()),
            ColumnType::Datetime => {
                groups.categorical.push(name.clone());
                groups.datetime.push(name.clone());
            }
        }
        columns.push(ClassifiedColumn {
            column,
            kind,
            datetime_format,
        });
    }

    tracing::debug!(
        numeric = groups.numeric.len(),
        categorical = groups.categorical.len(),
        datetime = groups.datetime.len(),
        "classified feature columns"
    );
    Ok(Classification { columns, groups })
}

/// Date-only format when every value sits at midnight.
fn datetime_format(column: &Column) -> &'static str {
    let all_midnight = column.cells().iter().all(|c| match c {
        Cell::DateTime(dt) => dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0,
        _ => true,
    });
    if all_midnight { DATE_FORMAT } else { DATETIME_FORMAT }
}
