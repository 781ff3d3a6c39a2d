//! Raw bytes -> header + rows, per file format.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use calamine::{Data, DataType, Reader};
use chrono::Timelike;

use crate::row::{CellValue, Row};
use crate::{ExtractError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DELIMITER_CANDIDATES: &[u8] = b",;\t|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Delimited text for `.csv`/`.tsv`/`.txt` or no extension, a workbook otherwise.
    pub fn from_filename(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            None | Some("csv") | Some("tsv") | Some("txt") => FileFormat::Csv,
            Some(_) => FileFormat::Spreadsheet,
        }
    }
}

/// Picks the candidate that occurs most often on the header line; ties keep the comma.
pub fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    DELIMITER_CANDIDATES
        .iter()
        .map(|d| (*d, header.iter().filter(|b| *b == d).count()))
        .fold((b',', 0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Repeated header names get a `_2`, `_3`, ... suffix so no column is dropped.
pub fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{name}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

pub fn read_csv(bytes: &[u8]) -> Result<Vec<Row>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let headers = dedupe_headers(reader.headers()?.iter().map(str::to_string).collect());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let cell = record.get(i).map(CellValue::text).unwrap_or(CellValue::Null);
                (h.clone(), cell)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Int(i) => CellValue::from(*i),
        Data::Float(f) => CellValue::from_f64(*f),
        Data::Bool(b) => CellValue::text(b.to_string()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.num_seconds_from_midnight() == 0 => CellValue::text(dt.format("%Y-%m-%d").to_string()),
            Some(dt) => CellValue::text(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Null,
        },
    }
}

fn header_name(cell: &Data) -> String {
    cell_value(cell).render().unwrap_or_default().trim().to_string()
}

/// First worksheet; first non-empty row is the header, short rows are padded with null.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook.worksheet_range_at(0).ok_or(ExtractError::NoWorksheet)??;

    let mut non_empty = range
        .rows()
        .filter(|r| r.iter().any(|c| !matches!(c, Data::Empty)));

    let Some(header_row) = non_empty.next() else {
        return Ok(Vec::new());
    };
    let headers = dedupe_headers(header_row.iter().map(header_name).collect());

    Ok(non_empty
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), cells.get(i).map(cell_value).unwrap_or(CellValue::Null)))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(FileFormat::from_filename("sales.CSV"), FileFormat::Csv);
        assert_eq!(FileFormat::from_filename("raw"), FileFormat::Csv);
        assert_eq!(FileFormat::from_filename("book.xlsx"), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_filename("123/1700000000_book.ods"), FileFormat::Spreadsheet);
    }

    #[test]
    fn sniffs_semicolon_and_tab() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_delimiter(b"single\n1"), b',');
    }

    #[test]
    fn csv_pads_short_rows_and_skips_blank_lines() {
        let rows = read_csv(b"\xEF\xBB\xBFa,b,c\n1,2\n\n4,5,6,7\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(rows[0]["c"], CellValue::Null);
        assert_eq!(rows[1]["c"], CellValue::text("6"));
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn duplicate_headers_keep_every_column() {
        let rows = read_csv(b"name,total,name,name\nAna,3,Bia,Caio\n").unwrap();
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["name", "total", "name_2", "name_3"]);
        assert_eq!(rows[0]["name"], CellValue::text("Ana"));
        assert_eq!(rows[0]["name_2"], CellValue::text("Bia"));
        assert_eq!(rows[0]["name_3"], CellValue::text("Caio"));

        let names = dedupe_headers(vec!["a".into(), "a_2".into(), "a".into()]);
        assert_eq!(names, vec!["a", "a_2", "a_3"]);
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(read_spreadsheet(b"definitely not a zip archive").is_err());
    }
}
