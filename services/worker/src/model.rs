//! Queue records as the workers see them.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tabular::ColumnDescriptor;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Uploaded,
    Processing,
    Parsed,
    Invalid,
}

impl DatasetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetStatus::Uploaded => "uploaded",
            DatasetStatus::Processing => "processing",
            DatasetStatus::Parsed => "parsed",
            DatasetStatus::Invalid => "invalid",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DatasetStatus::Parsed | DatasetStatus::Invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Processing => "processing",
            ReportStatus::Done => "done",
            ReportStatus::Failed => "failed",
        }
    }
}

/// Phase tag of a `worker_logs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogPhase {
    Start,
    Done,
    Error,
    Failed,
}

impl LogPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LogPhase::Start => "start",
            LogPhase::Done => "done",
            LogPhase::Error => "error",
            LogPhase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DatasetStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DatasetStatus::Uploaded),
            "processing" => Ok(DatasetStatus::Processing),
            "parsed" => Ok(DatasetStatus::Parsed),
            "invalid" => Ok(DatasetStatus::Invalid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "processing" => Ok(ReportStatus::Processing),
            "done" => Ok(ReportStatus::Done),
            "failed" => Ok(ReportStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub storage_path: String,
    pub filename: String,
    pub status: DatasetStatus,
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: i64,
    pub size_bytes: Option<i64>,
    pub sample_path: Option<String>,
    pub sample_json: Option<JsonValue>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub parsed_at: Option<DateTime<Utc>>,
}

impl DatasetRecord {
    /// A fresh upload, as the upload handler would insert it.
    pub fn uploaded(owner_id: Uuid, storage_path: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            storage_path: storage_path.into(),
            filename: filename.into(),
            status: DatasetStatus::Uploaded,
            columns: Vec::new(),
            row_count: 0,
            size_bytes: None,
            sample_path: None,
            sample_json: None,
            error_message: None,
            created_at: Utc::now(),
            claimed_at: None,
            parsed_at: None,
        }
    }
}

/// Where a parsed dataset's sample ended up. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleLocation {
    Empty,
    Inline(JsonValue),
    Stored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDataset {
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: i64,
    pub size_bytes: i64,
    pub sample: SampleLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Optional only so a broken row can be detected and failed.
    pub dataset_id: Option<Uuid>,
    pub status: ReportStatus,
    pub parameters: JsonValue,
    pub ai_response: Option<JsonValue>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub usage_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportRequest {
    pub fn pending(owner_id: Uuid, dataset_id: Uuid, parameters: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            dataset_id: Some(dataset_id),
            status: ReportStatus::Pending,
            parameters,
            ai_response: None,
            retry_count: 0,
            last_error: None,
            usage_tokens: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub request_id: Uuid,
    pub phase: LogPhase,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_text() {
        for s in [
            DatasetStatus::Uploaded,
            DatasetStatus::Processing,
            DatasetStatus::Parsed,
            DatasetStatus::Invalid,
        ] {
            assert_eq!(s.as_str().parse::<DatasetStatus>(), Ok(s));
        }
        for s in [ReportStatus::Pending, ReportStatus::Processing, ReportStatus::Done, ReportStatus::Failed] {
            assert_eq!(s.as_str().parse::<ReportStatus>(), Ok(s));
        }
        assert!("queued".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn only_parsed_and_invalid_are_terminal() {
        assert!(DatasetStatus::Parsed.is_terminal());
        assert!(DatasetStatus::Invalid.is_terminal());
        assert!(!DatasetStatus::Processing.is_terminal());
    }
}
