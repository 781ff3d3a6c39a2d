//! Report generation: pending -> processing -> done | pending (retry) | failed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use insight::{build_prompt, merge_warnings, scrub_sample, BusinessInfo, DatasetMeta, PromptContext};
use serde_json::Value as JsonValue;
use tabular::Row;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ai_client::AiClient;
use crate::claimer::claim_next_report;
use crate::health::{Outcome, WorkerStats};
use crate::model::{DatasetRecord, DatasetStatus, LogPhase, ReportRequest, ReportStatus};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::sample::{decode_sample, decode_sample_bytes};
use crate::storage::ObjectStore;
use crate::store::ReportStore;
use crate::worker_loop::PollingWorker;

pub const SAMPLE_UNREADABLE_WARNING: &str = "could not read the dataset sample";
pub const STALE_MESSAGE: &str = "processing timed out";
pub const NOT_JSON_MESSAGE: &str = "ai response was not valid JSON";

const SIGNED_URL_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub sample_bucket: String,
    pub language: String,
    pub retry: RetryPolicy,
    pub stale_after: Option<Duration>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            sample_bucket: "datasets_sample".to_string(),
            language: "pt-BR".to_string(),
            retry: RetryPolicy::default(),
            stale_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Done,
    Retrying { retry_count: i32 },
    Failed { retry_count: i32 },
    /// The row left `processing` under us (reaped); nothing written.
    Lost,
}

pub struct ReportWorker {
    store: Arc<dyn ReportStore>,
    objects: Arc<dyn ObjectStore>,
    ai: AiClient,
    settings: ReportSettings,
    stats: Arc<WorkerStats>,
}

impl ReportWorker {
    pub fn new(
        store: Arc<dyn ReportStore>,
        objects: Arc<dyn ObjectStore>,
        ai: AiClient,
        settings: ReportSettings,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            store,
            objects,
            ai,
            settings,
            stats,
        }
    }

    pub async fn process(&self, job: ReportRequest) -> ReportOutcome {
        info!(job_id = %job.id, retry_count = job.retry_count, "report: starting job");
        self.log(job.id, LogPhase::Start, "processing started").await;

        let Some(dataset_id) = job.dataset_id else {
            return self.reject(&job, "report request has no dataset_id").await;
        };

        match self.generate(&job, dataset_id).await {
            Ok(true) => {
                info!(job_id = %job.id, "report: job done");
                self.stats.reports.record(Outcome::Completed);
                self.log(job.id, LogPhase::Done, "report finished").await;
                ReportOutcome::Done
            }
            Ok(false) => {
                warn!(job_id = %job.id, "report: no longer processing, result dropped");
                ReportOutcome::Lost
            }
            Err(e) => self.handle_failure(&job, &format!("{e:#}")).await,
        }
    }

    /// Runs the pipeline; `Ok(false)` means the final write lost ownership.
    async fn generate(&self, job: &ReportRequest, dataset_id: Uuid) -> Result<bool> {
        let dataset = self
            .store
            .load_dataset(dataset_id)
            .await
            .context("loading dataset")?
            .ok_or_else(|| anyhow!("dataset {dataset_id} not found"))?;
        if dataset.status != DatasetStatus::Parsed {
            bail!("dataset {dataset_id} is not parsed (status {})", dataset.status.as_str());
        }

        let business = self.business_info(job.owner_id).await;

        let mut warnings = Vec::new();
        let sample = self.load_sample(&dataset, &mut warnings).await;
        let scrubbed = scrub_sample(&sample, &mut warnings);

        let prompt = build_prompt(&PromptContext {
            columns: &dataset.columns,
            sample: &scrubbed,
            parameters: &job.parameters,
            business: business.as_ref(),
            dataset: Some(DatasetMeta {
                filename: &dataset.filename,
                row_count: dataset.row_count,
            }),
            language: &self.settings.language,
        });

        let resp = self.ai.get_response(&prompt).await?;
        let usage_tokens = resp.usage.as_ref().map(|u| u.total_tokens);

        let mut report: JsonValue = match (resp.parsed, resp.validation_errors) {
            (Some(report), _) => report,
            (None, Some(errors)) => {
                let detail = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                bail!("ai response failed schema validation: {detail}");
            }
            (None, None) => bail!(NOT_JSON_MESSAGE),
        };
        merge_warnings(&mut report, &warnings);

        self.store
            .complete_report(job.id, &report, usage_tokens)
            .await
            .context("saving report")
    }

    async fn business_info(&self, owner_id: Uuid) -> Option<BusinessInfo> {
        match self.store.load_business_info(owner_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(owner_id = %owner_id, "report: business info unavailable, using generic prompt: {e:#}");
                None
            }
        }
    }

    async fn load_sample(&self, dataset: &DatasetRecord, warnings: &mut Vec<String>) -> Vec<Row> {
        let loaded = if let Some(inline) = &dataset.sample_json {
            decode_sample(inline.clone())
        } else if let Some(path) = &dataset.sample_path {
            self.fetch_sample(path).await
        } else {
            Ok(Vec::new())
        };

        loaded.unwrap_or_else(|e| {
            warn!(job_id = %dataset.id, "report: sample unreadable: {e:#}");
            if !warnings.iter().any(|w| w == SAMPLE_UNREADABLE_WARNING) {
                warnings.push(SAMPLE_UNREADABLE_WARNING.to_string());
            }
            Vec::new()
        })
    }

    /// Direct download first, then a short-lived signed URL.
    async fn fetch_sample(&self, path: &str) -> Result<Vec<Row>> {
        let bucket = &self.settings.sample_bucket;
        let bytes = match self.objects.download(bucket, path).await {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path, "report: direct sample download failed, trying signed url: {e:#}");
                let url = self.objects.create_signed_url(bucket, path, SIGNED_URL_TTL).await?;
                self.objects.download_signed(&url).await?
            }
        };
        decode_sample_bytes(&bytes)
    }

    /// Contract violation: terminal without consuming a retry.
    async fn reject(&self, job: &ReportRequest, msg: &str) -> ReportOutcome {
        error!(job_id = %job.id, "report: {msg}");
        match self
            .store
            .record_failure(job.id, job.retry_count, ReportStatus::Failed, msg)
            .await
        {
            Ok(false) => return ReportOutcome::Lost,
            Ok(true) => {}
            Err(e) => error!(job_id = %job.id, "report: could not record failure: {e:?}"),
        }
        self.stats.reports.record(Outcome::Failed);
        self.log(job.id, LogPhase::Failed, msg).await;
        ReportOutcome::Failed {
            retry_count: job.retry_count,
        }
    }

    pub async fn handle_failure(&self, job: &ReportRequest, msg: &str) -> ReportOutcome {
        let max = self.settings.retry.max_retries;
        let decision = self.settings.retry.on_failure(job.retry_count);
        let retry_count = decision.retry_count();

        match self
            .store
            .record_failure(job.id, retry_count, decision.status(), msg)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job.id, "report: no longer processing, failure not recorded");
                return ReportOutcome::Lost;
            }
            Err(e) => error!(job_id = %job.id, "report: could not record failure: {e:?}"),
        }

        match decision {
            RetryDecision::Retry { .. } => {
                warn!(job_id = %job.id, attempt = retry_count, max, "report: job will retry: {msg}");
                self.stats.reports.record(Outcome::Retried);
                self.log(job.id, LogPhase::Error, &format!("{msg} (attempt {retry_count} of {max})"))
                    .await;
                ReportOutcome::Retrying { retry_count }
            }
            RetryDecision::GiveUp { .. } => {
                error!(job_id = %job.id, attempt = retry_count, "report: job permanently failed: {msg}");
                self.stats.reports.record(Outcome::Failed);
                self.log(job.id, LogPhase::Failed, &format!("{msg} (attempt {retry_count} of {max}, giving up)"))
                    .await;
                ReportOutcome::Failed { retry_count }
            }
        }
    }

    async fn log(&self, request_id: Uuid, phase: LogPhase, message: &str) {
        if let Err(e) = self.store.append_log(request_id, phase, message).await {
            warn!(job_id = %request_id, phase = phase.as_str(), "report: audit log write failed: {e:?}");
        }
    }
}

#[async_trait]
impl PollingWorker for ReportWorker {
    fn name(&self) -> &'static str {
        "report"
    }

    async fn poll_once(&self) -> bool {
        self.stats.reports.polled();
        let Some(job) = claim_next_report(self.store.as_ref()).await else {
            return false;
        };
        self.stats.reports.claimed();
        self.process(job).await;
        true
    }

    async fn reap_stale(&self) {
        let Some(after) = self.settings.stale_after else { return };
        let stale = match self.store.stale_reports(after).await {
            Ok(s) => s,
            Err(e) => {
                warn!("report: reaper failed: {e:?}");
                return;
            }
        };
        for job in stale {
            warn!(job_id = %job.id, "report: stuck in processing, reclaiming");
            self.handle_failure(&job, STALE_MESSAGE).await;
        }
    }
}
