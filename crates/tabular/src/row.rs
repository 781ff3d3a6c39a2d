//! Closed cell/row model shared by extraction, scrubbing and prompting.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One parsed row: column name -> cell, in header order.
pub type Row = IndexMap<String, CellValue>;

/// A single cell. Deliberately small: text, number or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(serde_json::Number),
    Text(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Integral floats become integers so `3.0` renders as `3`.
    pub fn from_f64(v: f64) -> Self {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 9_007_199_254_740_992.0 {
            return CellValue::Number((v as i64).into());
        }
        serde_json::Number::from_f64(v)
            .map(CellValue::Number)
            .unwrap_or(CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// String form used for inference and distinct-value counting.
    pub fn render(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_renders_without_fraction() {
        assert_eq!(CellValue::from_f64(3.0).render().as_deref(), Some("3"));
        assert_eq!(CellValue::from_f64(2.5).render().as_deref(), Some("2.5"));
        assert_eq!(CellValue::from_f64(f64::NAN), CellValue::Null);
    }

    #[test]
    fn row_json_keeps_header_order_and_kinds() {
        let mut row = Row::new();
        row.insert("z".into(), CellValue::text("a"));
        row.insert("a".into(), CellValue::from(7));
        row.insert("m".into(), CellValue::Null);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":"a","a":7,"m":null}"#);

        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn whitespace_text_is_blank() {
        assert!(CellValue::text("   ").is_blank());
        assert!(!CellValue::from(0).is_blank());
    }
}
