use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    Email,
    Url,
    Phone,
    #[serde(rename = "string")]
    Text,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subtype {
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "yyyy-mm-dd")]
    IsoDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Low,
    Medium,
    High,
}

impl Cardinality {
    /// low <= 20 distinct values, medium <= 200, high above.
    pub fn from_distinct(count: usize) -> Self {
        match count {
            0..=20 => Cardinality::Low,
            21..=200 => Cardinality::Medium,
            _ => Cardinality::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub subtype: Option<Subtype>,
    pub null_ratio: f64,
    pub unique_count: usize,
    pub cardinality: Cardinality,
    pub sample_values: Vec<String>,

    // Overrides written by the column-mapping screen; never set by inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_subtype: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_time: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_index: bool,
}
