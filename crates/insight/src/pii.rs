//! Row-level PII detection and redaction.
//!
//! Text cells and the rendered form of number cells are inspected, since
//! spreadsheets keep tax ids and phone numbers as plain numbers. A matching
//! cell is replaced wholesale by [`PII_SENTINEL`]; everything else passes through.

use std::sync::OnceLock;

use regex::RegexSet;
use tabular::{CellValue, Row};

pub const PII_SENTINEL: &str = "<PII_DETECTED>";
pub const PII_WARNING: &str = "PII detected and redacted from the sample";

const PATTERNS: &[&str] = &[
    // CPF
    r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b",
    // CNPJ
    r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b",
    r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
    // phone-length digit run
    r"\b\d{10,11}\b",
    // card-length digit run
    r"\b\d{16}\b",
    // RG / generic id
    r"\b\d{9}\b",
];

fn patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(PATTERNS).expect("static pii patterns"))
}

pub fn is_pii(value: &str) -> bool {
    patterns().is_match(value)
}

fn cell_is_pii(cell: &CellValue) -> bool {
    match cell {
        CellValue::Text(s) => is_pii(s),
        CellValue::Number(n) => is_pii(&n.to_string()),
        CellValue::Null => false,
    }
}

pub fn detect(row: &Row) -> bool {
    row.values().any(cell_is_pii)
}

pub fn redact(row: &Row) -> Row {
    row.iter()
        .map(|(k, v)| {
            let v = if cell_is_pii(v) {
                CellValue::text(PII_SENTINEL)
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect()
}

/// Redacts a whole sample, pushing [`PII_WARNING`] once if any row was touched.
pub fn scrub_sample(sample: &[Row], warnings: &mut Vec<String>) -> Vec<Row> {
    let mut flagged = false;
    let out = sample
        .iter()
        .map(|row| {
            if detect(row) {
                flagged = true;
                redact(row)
            } else {
                row.clone()
            }
        })
        .collect();

    if flagged && !warnings.iter().any(|w| w == PII_WARNING) {
        warnings.push(PII_WARNING.to_string());
    }
    out
}
