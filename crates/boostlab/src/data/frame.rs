//! Column-oriented tabular dataset with heterogeneous cells.

use chrono::NaiveDateTime;

use crate::error::TrainingError;

// =============================================================================
// Cell
// =============================================================================

/// A single tabular value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// `true` for [`Cell::Missing`] and for NaN numbers.
    #[inline]
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric value, if this cell holds a (non-NaN) number.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// String form used when a cell is treated as a category.
    ///
    /// Whole numbers print without a fractional part so `3` and `3.0` map to
    /// the same category. Date-times use `datetime_format`.
    pub fn category_string(&self, datetime_format: &str) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(v) if v.is_nan() => None,
            Cell::Number(v) => Some(format_number(*v)),
            Cell::Text(s) => Some(s.clone()),
            Cell::DateTime(dt) => Some(dt.format(datetime_format).to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_nan() { Cell::Missing } else { Cell::Number(v) }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(dt: NaiveDateTime) -> Self {
        Cell::DateTime(dt)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Missing, Into::into)
    }
}

pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// =============================================================================
// Column
// =============================================================================

/// Native representation of a column, judged from its present cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    /// Every present cell is a number (also used for all-missing columns).
    Number,
    /// Every present cell is a date-time.
    DateTime,
    /// Anything else.
    Text,
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Build a column from anything convertible into cells.
    pub fn from_values<T: Into<Cell>>(name: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        Self::new(name, values.into_iter().map(Into::into).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    pub fn native_type(&self) -> NativeType {
        let mut numbers = 0usize;
        let mut datetimes = 0usize;
        let mut present = 0usize;
        for cell in self.cells.iter().filter(|c| !c.is_missing()) {
            present += 1;
            match cell {
                Cell::Number(_) => numbers += 1,
                Cell::DateTime(_) => datetimes += 1,
                _ => {}
            }
        }
        if numbers == present {
            NativeType::Number
        } else if datetimes == present {
            NativeType::DateTime
        } else {
            NativeType::Text
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Dataset construction errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("inconsistent number of rows: column '{column}' expected {expected}, got {got}")]
    InconsistentRows {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// An in-memory table: named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Create a dataset from columns.
    ///
    /// # Errors
    ///
    /// Columns must all have the same length and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let n_rows = columns.first().map_or(0, Column::len);
        for (i, column) in columns.iter().enumerate() {
            if column.len() != n_rows {
                return Err(DatasetError::InconsistentRows {
                    column: column.name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with [`TrainingError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&Column, TrainingError> {
        self.column(name).ok_or_else(|| TrainingError::ColumnNotFound {
            column: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_type_ignores_missing() {
        let col = Column::from_values("a", [Some(1.0), None, Some(f64::NAN)]);
        assert_eq!(col.native_type(), NativeType::Number);
        assert_eq!(col.missing_count(), 2);

        let col = Column::new("b", vec![Cell::Number(1.0), Cell::Text("x".into())]);
        assert_eq!(col.native_type(), NativeType::Text);

        let col = Column::new("c", vec![Cell::Missing, Cell::Missing]);
        assert_eq!(col.native_type(), NativeType::Number);
    }

    #[test]
    fn category_string_normalizes_whole_numbers() {
        assert_eq!(Cell::Number(3.0).category_string("%Y").as_deref(), Some("3"));
        assert_eq!(Cell::Number(2.5).category_string("%Y").as_deref(), Some("2.5"));
        assert_eq!(Cell::Missing.category_string("%Y"), None);
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::from_values("a", [1.0, 2.0]),
            Column::from_values("b", [1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, DatasetError::InconsistentRows { got: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(vec![
            Column::from_values("a", [1.0]),
            Column::from_values("a", [2.0]),
        ])
        .unwrap_err();
        assert_eq!(err, DatasetError::DuplicateColumn("a".into()));
    }

    #[test]
    fn require_reports_column() {
        let ds = Dataset::new(vec![Column::from_values("a", [1.0])]).unwrap();
        assert_eq!(ds.n_rows(), 1);
        assert_eq!(
            ds.require("zzz").unwrap_err(),
            TrainingError::ColumnNotFound { column: "zzz".into() }
        );
    }
}
