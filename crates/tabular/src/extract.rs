use serde::{Deserialize, Serialize};

use crate::infer::describe_column;
use crate::read::{read_csv, read_spreadsheet, FileFormat};
use crate::row::Row;
use crate::schema::ColumnDescriptor;
use crate::Result;

pub const DEFAULT_SAMPLE_ROWS: usize = 30;
pub const DEFAULT_MAX_INSPECT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub sample_rows: usize,
    pub max_inspect: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            max_inspect: DEFAULT_MAX_INSPECT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub columns: Vec<ColumnDescriptor>,
    pub sample: Vec<Row>,
    pub row_count: usize,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            sample: Vec::new(),
            row_count: 0,
        }
    }
}

/// Parses `bytes` (format chosen from `filename_hint`) into column descriptors,
/// a raw sample prefix and the total row count.
///
/// Inference only looks at the first `max_inspect` rows. A file with a header and
/// no data rows yields [`Extraction::empty`].
pub fn extract(bytes: &[u8], filename_hint: &str, opts: ExtractOptions) -> Result<Extraction> {
    let rows = match FileFormat::from_filename(filename_hint) {
        FileFormat::Csv => read_csv(bytes)?,
        FileFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };
    Ok(describe_rows(rows, opts))
}

/// Inference over already-parsed rows; headers come from the first row.
pub fn describe_rows(rows: Vec<Row>, opts: ExtractOptions) -> Extraction {
    let Some(first) = rows.first() else {
        return Extraction::empty();
    };

    let inspected = &rows[..rows.len().min(opts.max_inspect)];
    let columns = first
        .keys()
        .map(|name| describe_column(name, inspected))
        .collect();

    let row_count = rows.len();
    let sample = rows.into_iter().take(opts.sample_rows).collect();

    Extraction {
        columns,
        sample,
        row_count,
    }
}
