//! CSV loading with per-column type inference.
//!
//! Each column is read as raw strings first, then typed as a whole:
//! numeric if every present cell parses as a number, date-time if every
//! present cell parses as an ISO date or date-time, text otherwise.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use super::frame::{Cell, Column, Dataset, DatasetError};

/// Errors raised while reading CSV data.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV has no header row")]
    MissingHeader,

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// CSV reading options.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Detect ISO date / date-time columns.
    pub parse_dates: bool,
    /// Cell contents (after trimming) treated as missing.
    pub missing_tokens: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            parse_dates: true,
            missing_tokens: ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Read a CSV file into a [`Dataset`].
pub fn read_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Dataset, CsvError> {
    let file = std::fs::File::open(path)?;
    read_csv_from(file, options)
}

/// Read CSV data from any reader.
pub fn read_csv_from<R: Read>(reader: R, options: &CsvOptions) -> Result<Dataset, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = dedupe_headers(reader.headers()?.iter());
    if headers.is_empty() {
        return Err(CsvError::MissingHeader);
    }

    let missing: HashSet<&str> = options.missing_tokens.iter().map(String::as_str).collect();
    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (col, field) in raw.iter_mut().zip(record.iter()) {
            col.push((!missing.contains(field)).then(|| field.to_string()));
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, values)| Column::new(name, infer_cells(values, options.parse_dates)))
        .collect();
    Ok(Dataset::new(columns)?)
}

/// Repeated header names get a `.1`, `.2`, ... suffix.
fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for header in headers {
        let mut name = header.to_string();
        let mut k = 1;
        while !seen.insert(name.clone()) {
            name = format!("{header}.{k}");
            k += 1;
        }
        out.push(name);
    }
    out
}

fn infer_cells(values: Vec<Option<String>>, parse_dates: bool) -> Vec<Cell> {
    let present = || values.iter().flatten();

    if present().all(|s| s.parse::<f64>().is_ok()) {
        return values
            .iter()
            .map(|v| v.as_deref().and_then(|s| s.parse::<f64>().ok()).into())
            .collect();
    }

    if parse_dates && present().all(|s| parse_datetime(s).is_some()) {
        return values
            .iter()
            .map(|v| v.as_deref().and_then(parse_datetime).into())
            .collect();
    }

    values
        .into_iter()
        .map(|v| v.map_or(Cell::Missing, Cell::Text))
        .collect()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 date or date-time.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::NativeType;

    fn read(text: &str) -> Dataset {
        read_csv_from(text.as_bytes(), &CsvOptions::default()).unwrap()
    }

    #[test]
    fn infers_column_types() {
        let ds = read("age,city,joined,y\n34,Paris,2023-01-15,1\n,Rome,2023-02-01 10:30:00,0\n41,,NA,1\n");
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.require("age").unwrap().native_type(), NativeType::Number);
        assert_eq!(ds.require("city").unwrap().native_type(), NativeType::Text);
        assert_eq!(ds.require("joined").unwrap().native_type(), NativeType::DateTime);
        assert_eq!(ds.require("age").unwrap().missing_count(), 1);
        assert_eq!(ds.require("city").unwrap().missing_count(), 1);
        assert_eq!(ds.require("joined").unwrap().missing_count(), 1);
    }

    #[test]
    fn mixed_numbers_and_text_stay_text() {
        let ds = read("code\n12\nA7\n");
        let col = ds.require("code").unwrap();
        assert_eq!(col.native_type(), NativeType::Text);
        assert_eq!(col.cells()[0], Cell::Text("12".into()));
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let ds = read("a,a,b\n1,2,3\n");
        let names: Vec<_> = ds.column_names().collect();
        assert_eq!(names, vec!["a", "a.1", "b"]);
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = read_csv_from("".as_bytes(), &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, CsvError::MissingHeader));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = read_csv_from("a,b\n1,2\n3\n".as_bytes(), &CsvOptions::default()).unwrap_err();
        assert!(matches!(err, CsvError::Csv(_)));
    }

    #[test]
    fn parses_date_only_as_midnight() {
        let dt = parse_datetime("2024-03-05").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-05 00:00:00");
        assert!(parse_datetime("05/03/2024").is_none());
    }
}
