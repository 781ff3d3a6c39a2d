//! Column type inference over a bounded window of rows.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::row::{CellValue, Row};
use crate::schema::{Cardinality, ColumnDescriptor, ColumnType, Subtype};

/// Non-null values that take part in the type vote.
const VOTE_SAMPLE: usize = 50;
const MAX_SAMPLE_VALUES: usize = 10;

const NUMBER_MAJORITY: f64 = 0.7;
const PATTERN_MAJORITY: f64 = 0.6;

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r".+@.+\..+").expect("static regex"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://").expect("static regex"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9\-()+ x]{7,}").expect("static regex"))
}

/// Parses a numeric-looking string; the first comma is read as a decimal point.
pub fn parse_number(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replacen(',', ".", 1);
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn looks_like_date(raw: &str) -> bool {
    let s = raw.trim();
    if DateTime::parse_from_rfc3339(s).is_ok() || DateTime::parse_from_rfc2822(s).is_ok() {
        return true;
    }
    NAIVE_DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
}

fn share(values: &[String], pred: impl Fn(&str) -> bool) -> f64 {
    let hits = values.iter().filter(|v| pred(v.as_str())).count();
    hits as f64 / values.len() as f64
}

/// Majority vote in fixed precedence: number, date, email, url, phone, string.
pub fn detect_type(non_null: &[String]) -> ColumnType {
    if non_null.is_empty() {
        return ColumnType::Null;
    }
    let sample = &non_null[..non_null.len().min(VOTE_SAMPLE)];

    if share(sample, |s| parse_number(s).is_some()) >= NUMBER_MAJORITY {
        return ColumnType::Number;
    }
    if share(sample, looks_like_date) >= PATTERN_MAJORITY {
        return ColumnType::Date;
    }
    if share(sample, |s| email_re().is_match(s)) >= PATTERN_MAJORITY {
        return ColumnType::Email;
    }
    if share(sample, |s| url_re().is_match(s)) >= PATTERN_MAJORITY {
        return ColumnType::Url;
    }
    if share(sample, |s| phone_re().is_match(s)) >= PATTERN_MAJORITY {
        return ColumnType::Phone;
    }
    ColumnType::Text
}

fn subtype_for(column_type: ColumnType, non_null: &[String]) -> Option<Subtype> {
    match column_type {
        ColumnType::Number => {
            let integral = non_null
                .iter()
                .all(|v| parse_number(v).is_some_and(|n| n.fract() == 0.0));
            Some(if integral { Subtype::Integer } else { Subtype::Decimal })
        }
        ColumnType::Date => Some(Subtype::IsoDate),
        _ => None,
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Describes one column from the inspected rows. Missing keys count as null.
pub fn describe_column(name: &str, rows: &[Row]) -> ColumnDescriptor {
    let non_null: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get(name))
        .filter(|v| !v.is_blank())
        .filter_map(CellValue::render)
        .collect();

    let mut seen = HashSet::new();
    let distinct: Vec<&String> = non_null.iter().filter(|v| seen.insert(v.as_str())).collect();

    let column_type = detect_type(&non_null);
    let null_ratio = if rows.is_empty() {
        1.0
    } else {
        round3(1.0 - non_null.len() as f64 / rows.len() as f64)
    };

    ColumnDescriptor {
        name: name.to_string(),
        column_type,
        subtype: subtype_for(column_type, &non_null),
        null_ratio,
        unique_count: distinct.len(),
        cardinality: Cardinality::from_distinct(distinct.len()),
        sample_values: distinct.into_iter().take(MAX_SAMPLE_VALUES).cloned().collect(),
        user_type: None,
        user_subtype: None,
        is_time: false,
        is_index: false,
    }
}
