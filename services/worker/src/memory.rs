//! In-memory store, for tests and local demos.
//!
//! One mutex guards every table, so each trait call is atomic with respect to
//! the others, the same guarantee a locking select gives on Postgres.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insight::BusinessInfo;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    DatasetRecord, DatasetStatus, LogEntry, LogPhase, ParsedDataset, ReportRequest, ReportStatus, SampleLocation,
};
use crate::store::{DatasetStore, ReportStore};

#[derive(Default)]
struct Tables {
    datasets: Vec<DatasetRecord>,
    reports: Vec<ReportRequest>,
    logs: Vec<LogEntry>,
    business: HashMap<Uuid, BusinessInfo>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

pub(crate) fn cutoff(older_than: Duration) -> DateTime<Utc> {
    let age = chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::days(36_500));
    Utc::now() - age
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_dataset(&self, dataset: DatasetRecord) -> Uuid {
        let id = dataset.id;
        self.tables.lock().await.datasets.push(dataset);
        id
    }

    pub async fn insert_report(&self, report: ReportRequest) -> Uuid {
        let id = report.id;
        self.tables.lock().await.reports.push(report);
        id
    }

    pub async fn set_business_info(&self, owner_id: Uuid, info: BusinessInfo) {
        self.tables.lock().await.business.insert(owner_id, info);
    }

    pub async fn dataset(&self, id: Uuid) -> Option<DatasetRecord> {
        self.tables.lock().await.datasets.iter().find(|d| d.id == id).cloned()
    }

    pub async fn report(&self, id: Uuid) -> Option<ReportRequest> {
        self.tables.lock().await.reports.iter().find(|r| r.id == id).cloned()
    }

    pub async fn logs_for(&self, request_id: Uuid) -> Vec<LogEntry> {
        self.tables
            .lock()
            .await
            .logs
            .iter()
            .filter(|l| l.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Shifts a dataset's claim time into the past.
    pub async fn backdate_dataset_claim(&self, id: Uuid, by: Duration) {
        let mut t = self.tables.lock().await;
        if let Some(d) = t.datasets.iter_mut().find(|d| d.id == id) {
            d.claimed_at = Some(cutoff(by));
        }
    }

    /// Shifts a report's last update into the past.
    pub async fn backdate_report(&self, id: Uuid, by: Duration) {
        let mut t = self.tables.lock().await;
        if let Some(r) = t.reports.iter_mut().find(|r| r.id == id) {
            r.updated_at = cutoff(by);
        }
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn claim_dataset(&self) -> Result<Option<DatasetRecord>> {
        let mut t = self.tables.lock().await;
        let Some(d) = t
            .datasets
            .iter_mut()
            .filter(|d| d.status == DatasetStatus::Uploaded)
            .min_by_key(|d| d.created_at)
        else {
            return Ok(None);
        };
        d.status = DatasetStatus::Processing;
        d.claimed_at = Some(Utc::now());
        Ok(Some(d.clone()))
    }

    async fn mark_parsed(&self, id: Uuid, parsed: &ParsedDataset) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let Some(d) = t
            .datasets
            .iter_mut()
            .find(|d| d.id == id && d.status == DatasetStatus::Processing)
        else {
            return Ok(false);
        };
        let (sample_path, sample_json) = match &parsed.sample {
            SampleLocation::Empty => (None, None),
            SampleLocation::Inline(v) => (None, Some(v.clone())),
            SampleLocation::Stored(p) => (Some(p.clone()), None),
        };
        d.status = DatasetStatus::Parsed;
        d.columns = parsed.columns.clone();
        d.row_count = parsed.row_count;
        d.size_bytes = Some(parsed.size_bytes);
        d.sample_path = sample_path;
        d.sample_json = sample_json;
        d.error_message = None;
        d.parsed_at = Some(Utc::now());
        Ok(true)
    }

    async fn mark_invalid(&self, id: Uuid, error: &str) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let Some(d) = t
            .datasets
            .iter_mut()
            .find(|d| d.id == id && d.status == DatasetStatus::Processing)
        else {
            return Ok(false);
        };
        d.status = DatasetStatus::Invalid;
        d.error_message = Some(error.to_string());
        Ok(true)
    }

    async fn reap_stale_datasets(&self, older_than: Duration) -> Result<Vec<Uuid>> {
        let limit = cutoff(older_than);
        let mut t = self.tables.lock().await;
        let mut reaped = Vec::new();
        for d in t.datasets.iter_mut().filter(|d| {
            d.status == DatasetStatus::Processing && d.claimed_at.map_or(true, |at| at < limit)
        }) {
            d.status = DatasetStatus::Invalid;
            d.error_message = Some("processing timed out".to_string());
            reaped.push(d.id);
        }
        Ok(reaped)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn claim_report(&self) -> Result<Option<ReportRequest>> {
        let mut t = self.tables.lock().await;
        let Some(r) = t
            .reports
            .iter_mut()
            .filter(|r| r.status == ReportStatus::Pending)
            .min_by_key(|r| r.created_at)
        else {
            return Ok(None);
        };
        r.status = ReportStatus::Processing;
        r.updated_at = Utc::now();
        Ok(Some(r.clone()))
    }

    async fn load_dataset(&self, id: Uuid) -> Result<Option<DatasetRecord>> {
        Ok(self.dataset(id).await)
    }

    async fn load_business_info(&self, owner_id: Uuid) -> Result<Option<BusinessInfo>> {
        Ok(self.tables.lock().await.business.get(&owner_id).cloned())
    }

    async fn complete_report(&self, id: Uuid, ai_response: &JsonValue, usage_tokens: Option<i64>) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let Some(r) = t
            .reports
            .iter_mut()
            .find(|r| r.id == id && r.status == ReportStatus::Processing)
        else {
            return Ok(false);
        };
        r.status = ReportStatus::Done;
        r.ai_response = Some(ai_response.clone());
        r.usage_tokens = usage_tokens;
        r.last_error = None;
        r.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_failure(&self, id: Uuid, retry_count: i32, status: ReportStatus, error: &str) -> Result<bool> {
        let mut t = self.tables.lock().await;
        let Some(r) = t
            .reports
            .iter_mut()
            .find(|r| r.id == id && r.status == ReportStatus::Processing)
        else {
            return Ok(false);
        };
        r.status = status;
        r.retry_count = retry_count;
        r.last_error = Some(error.to_string());
        r.updated_at = Utc::now();
        Ok(true)
    }

    async fn append_log(&self, request_id: Uuid, phase: LogPhase, message: &str) -> Result<()> {
        self.tables.lock().await.logs.push(LogEntry {
            request_id,
            phase,
            message: message.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn stale_reports(&self, older_than: Duration) -> Result<Vec<ReportRequest>> {
        let limit = cutoff(older_than);
        Ok(self
            .tables
            .lock()
            .await
            .reports
            .iter()
            .filter(|r| r.status == ReportStatus::Processing && r.updated_at < limit)
            .cloned()
            .collect())
    }
}
