//! Relational store seams. Postgres in production, [`crate::memory::MemoryStore`] in tests.
//!
//! Every status-changing write is conditional on the status the caller
//! expects the row to be in. A write whose precondition no longer holds is a
//! no-op reported as `false`, never an error.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use insight::BusinessInfo;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::model::{DatasetRecord, LogPhase, ParsedDataset, ReportRequest, ReportStatus};

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Oldest `uploaded` dataset flipped to `processing` in one atomic step.
    async fn claim_dataset(&self) -> Result<Option<DatasetRecord>>;

    async fn mark_parsed(&self, id: Uuid, parsed: &ParsedDataset) -> Result<bool>;

    async fn mark_invalid(&self, id: Uuid, error: &str) -> Result<bool>;

    /// Marks `processing` datasets claimed longer than `older_than` ago invalid.
    async fn reap_stale_datasets(&self, older_than: Duration) -> Result<Vec<Uuid>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Oldest `pending` request flipped to `processing` in one atomic step.
    async fn claim_report(&self) -> Result<Option<ReportRequest>>;

    async fn load_dataset(&self, id: Uuid) -> Result<Option<DatasetRecord>>;

    async fn load_business_info(&self, owner_id: Uuid) -> Result<Option<BusinessInfo>>;

    async fn complete_report(&self, id: Uuid, ai_response: &JsonValue, usage_tokens: Option<i64>) -> Result<bool>;

    /// Writes the outcome of a failed attempt on a `processing` request.
    async fn record_failure(&self, id: Uuid, retry_count: i32, status: ReportStatus, error: &str) -> Result<bool>;

    async fn append_log(&self, request_id: Uuid, phase: LogPhase, message: &str) -> Result<()>;

    /// `processing` requests untouched for longer than `older_than`.
    async fn stale_reports(&self, older_than: Duration) -> Result<Vec<ReportRequest>>;
}
