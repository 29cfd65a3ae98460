//! Tabular input data and its binned training representation.

pub mod binned;
pub mod csv;
pub mod frame;

pub use binned::{BinCuts, BinnedMatrix};
pub use self::csv::{CsvError, CsvOptions, parse_datetime, read_csv, read_csv_from};
pub use frame::{Cell, Column, Dataset, DatasetError, NativeType};
