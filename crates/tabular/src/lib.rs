//! Tabular file parsing and column schema inference.
//!
//! CSV and spreadsheet bytes are parsed into [`Row`]s, a bounded prefix is
//! inspected to infer one [`ColumnDescriptor`] per header, and a short raw
//! sample is kept for downstream prompting.

mod extract;
mod infer;
mod read;
mod row;
mod schema;

pub use extract::{describe_rows, extract, Extraction, ExtractOptions, DEFAULT_MAX_INSPECT, DEFAULT_SAMPLE_ROWS};
pub use infer::{describe_column, detect_type, looks_like_date, parse_number};
pub use read::{read_csv, read_spreadsheet, sniff_delimiter, FileFormat};
pub use row::{CellValue, Row};
pub use schema::{Cardinality, ColumnDescriptor, ColumnType, Subtype};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet parse error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Spreadsheet has no worksheet")]
    NoWorksheet,
}

pub type Result<T> = std::result::Result<T, ExtractError>;
