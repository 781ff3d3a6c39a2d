use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use insight::{BusinessGoals, BusinessInfo};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::model::{DatasetRecord, LogPhase, ParsedDataset, ReportRequest, ReportStatus, SampleLocation};
use crate::store::{DatasetStore, ReportStore};

const DATASET_COLUMNS: &str = "id, owner_id, storage_path, filename, status, columns, row_count, size_bytes, \
sample_path, sample_json, error_message, created_at, claimed_at, parsed_at";

const REPORT_COLUMNS: &str = "id, owner_id, dataset_id, status, parameters, ai_response, retry_count, last_error, \
usage_tokens, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Postgres ping failed")?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DatasetRow {
    id: Uuid,
    owner_id: Uuid,
    storage_path: String,
    filename: Option<String>,
    status: String,
    columns: Option<JsonValue>,
    row_count: Option<i64>,
    size_bytes: Option<i64>,
    sample_path: Option<String>,
    sample_json: Option<JsonValue>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    parsed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DatasetRow> for DatasetRecord {
    type Error = anyhow::Error;

    fn try_from(r: DatasetRow) -> Result<Self> {
        let columns = match r.columns {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v).with_context(|| format!("dataset {}: bad columns", r.id))?,
        };
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            filename: r.filename.unwrap_or_else(|| r.storage_path.clone()),
            storage_path: r.storage_path,
            status: r.status.parse()?,
            columns,
            row_count: r.row_count.unwrap_or(0),
            size_bytes: r.size_bytes,
            sample_path: r.sample_path,
            sample_json: r.sample_json,
            error_message: r.error_message,
            created_at: r.created_at,
            claimed_at: r.claimed_at,
            parsed_at: r.parsed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    owner_id: Uuid,
    dataset_id: Option<Uuid>,
    status: String,
    parameters: Option<JsonValue>,
    ai_response: Option<JsonValue>,
    retry_count: Option<i32>,
    last_error: Option<String>,
    usage_tokens: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for ReportRequest {
    type Error = anyhow::Error;

    fn try_from(r: ReportRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            dataset_id: r.dataset_id,
            status: r.status.parse()?,
            parameters: r.parameters.unwrap_or(JsonValue::Null),
            ai_response: r.ai_response,
            retry_count: r.retry_count.unwrap_or(0),
            last_error: r.last_error,
            usage_tokens: r.usage_tokens,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BusinessRow {
    niche_bussiness: Option<String>,
    goal: Option<JsonValue>,
    analysis_period: Option<String>,
    info_priority: Option<JsonValue>,
    best_data_format: Option<String>,
}

impl From<BusinessRow> for BusinessInfo {
    fn from(r: BusinessRow) -> Self {
        // Profile columns are free-form JSON written by the UI; tolerate odd shapes.
        let goals: BusinessGoals = r
            .goal
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let info_priority: Vec<String> = r
            .info_priority
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Self {
            niche: r.niche_bussiness,
            goals,
            analysis_period: r.analysis_period,
            info_priority,
            best_data_format: r.best_data_format,
        }
    }
}

fn secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn claim_dataset(&self) -> Result<Option<DatasetRecord>> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await?;

        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM datasets
            WHERE status = 'uploaded'
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            tx.commit().await?;
            return Ok(None);
        };

        let row: DatasetRow = sqlx::query_as(&format!(
            "UPDATE datasets SET status = 'processing', claimed_at = NOW() WHERE id = $1 RETURNING {DATASET_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }

    async fn mark_parsed(&self, id: Uuid, parsed: &ParsedDataset) -> Result<bool> {
        let (sample_path, sample_json) = match &parsed.sample {
            SampleLocation::Empty => (None, None),
            SampleLocation::Inline(v) => (None, Some(v.clone())),
            SampleLocation::Stored(p) => (Some(p.clone()), None),
        };
        let columns = serde_json::to_value(&parsed.columns)?;

        let res = sqlx::query(
            r#"
            UPDATE datasets
            SET status = 'parsed',
                columns = $2,
                row_count = $3,
                size_bytes = $4,
                sample_path = $5,
                sample_json = $6,
                error_message = NULL,
                parsed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(columns)
        .bind(parsed.row_count)
        .bind(parsed.size_bytes)
        .bind(sample_path)
        .bind(sample_json)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_invalid(&self, id: Uuid, error: &str) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE datasets
            SET status = 'invalid', error_message = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reap_stale_datasets(&self, older_than: Duration) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE datasets
            SET status = 'invalid', error_message = 'processing timed out'
            WHERE status = 'processing'
              AND (claimed_at IS NULL OR claimed_at < NOW() - ($1 * INTERVAL '1 second'))
            RETURNING id
            "#,
        )
        .bind(secs(older_than))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn claim_report(&self) -> Result<Option<ReportRequest>> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await?;

        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM report_requests
            WHERE status = 'pending'
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            tx.commit().await?;
            return Ok(None);
        };

        let row: ReportRow = sqlx::query_as(&format!(
            "UPDATE report_requests SET status = 'processing', updated_at = NOW() WHERE id = $1 RETURNING {REPORT_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.try_into()?))
    }

    async fn load_dataset(&self, id: Uuid) -> Result<Option<DatasetRecord>> {
        let row: Option<DatasetRow> = sqlx::query_as(&format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(DatasetRecord::try_from).transpose()
    }

    async fn load_business_info(&self, owner_id: Uuid) -> Result<Option<BusinessInfo>> {
        let row: Option<BusinessRow> = sqlx::query_as(
            r#"
            SELECT niche_bussiness, goal, analysis_period, info_priority, best_data_format
            FROM business_info
            WHERE owner_id = $1
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(BusinessInfo::from))
    }

    async fn complete_report(&self, id: Uuid, ai_response: &JsonValue, usage_tokens: Option<i64>) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE report_requests
            SET status = 'done',
                ai_response = $2,
                usage_tokens = $3,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(ai_response)
        .bind(usage_tokens)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_failure(&self, id: Uuid, retry_count: i32, status: ReportStatus, error: &str) -> Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE report_requests
            SET status = $2,
                retry_count = $3,
                last_error = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(retry_count)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn append_log(&self, request_id: Uuid, phase: LogPhase, message: &str) -> Result<()> {
        sqlx::query(r#"INSERT INTO worker_logs (request_id, status, message) VALUES ($1, $2, $3)"#)
            .bind(request_id)
            .bind(phase.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stale_reports(&self, older_than: Duration) -> Result<Vec<ReportRequest>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM report_requests \
             WHERE status = 'processing' AND updated_at < NOW() - ($1 * INTERVAL '1 second') \
             ORDER BY updated_at ASC"
        ))
        .bind(secs(older_than))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ReportRequest::try_from).collect()
    }
}
