//! Dataset parsing: uploaded -> processing -> parsed | invalid. No retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tabular::{ExtractOptions, Extraction};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::claimer::claim_next_dataset;
use crate::health::{Outcome, WorkerStats};
use crate::model::{DatasetRecord, ParsedDataset, SampleLocation};
use crate::sample::{encode_sample, sample_object_path, SAMPLE_CONTENT_TYPE};
use crate::storage::ObjectStore;
use crate::store::DatasetStore;
use crate::worker_loop::PollingWorker;

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub dataset_bucket: String,
    pub sample_bucket: String,
    pub extract: ExtractOptions,
    pub max_inline_sample_bytes: usize,
    pub stale_after: Option<Duration>,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            dataset_bucket: "datasets".to_string(),
            sample_bucket: "datasets_sample".to_string(),
            extract: ExtractOptions::default(),
            max_inline_sample_bytes: 16 * 1024,
            stale_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetOutcome {
    Parsed,
    Invalid(String),
    /// Someone else moved the row out of `processing` first.
    Lost,
}

pub struct DatasetWorker {
    store: Arc<dyn DatasetStore>,
    objects: Arc<dyn ObjectStore>,
    settings: DatasetSettings,
    stats: Arc<WorkerStats>,
}

/// A failure at some stage; every one of them ends in `invalid`.
struct StageError(String);

impl StageError {
    fn at(stage: &str, e: anyhow::Error) -> Self {
        StageError(format!("{stage}: {e:#}"))
    }
}

impl DatasetWorker {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        objects: Arc<dyn ObjectStore>,
        settings: DatasetSettings,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            store,
            objects,
            settings,
            stats,
        }
    }

    pub async fn process(&self, dataset: DatasetRecord) -> DatasetOutcome {
        let id = dataset.id;
        info!(job_id = %id, filename = %dataset.filename, "dataset: parsing");

        let parsed = match self.parse(&dataset).await {
            Ok(p) => p,
            Err(StageError(msg)) => return self.invalidate(id, msg).await,
        };

        match self.store.mark_parsed(id, &parsed).await {
            Ok(true) => {
                info!(job_id = %id, rows = parsed.row_count, columns = parsed.columns.len(), "dataset: parsed");
                self.stats.datasets.record(Outcome::Completed);
                DatasetOutcome::Parsed
            }
            Ok(false) => {
                warn!(job_id = %id, "dataset: no longer processing, result dropped");
                DatasetOutcome::Lost
            }
            Err(e) => self.invalidate(id, format!("saving result: {e:#}")).await,
        }
    }

    async fn parse(&self, dataset: &DatasetRecord) -> Result<ParsedDataset, StageError> {
        let bytes = self
            .objects
            .download(&self.settings.dataset_bucket, &dataset.storage_path)
            .await
            .map_err(|e| StageError::at("download failed", e))?;
        let size_bytes = bytes.len() as i64;

        let extraction = extract_blocking(bytes, dataset.filename.clone(), self.settings.extract)
            .await
            .map_err(|e| StageError::at("parse failed", e))?;

        let sample = self
            .place_sample(dataset.id, &extraction)
            .await
            .map_err(|e| StageError::at("sample upload failed", e))?;

        Ok(ParsedDataset {
            columns: extraction.columns,
            row_count: extraction.row_count as i64,
            size_bytes,
            sample,
        })
    }

    /// Small samples stay inline; large ones go to object storage.
    async fn place_sample(&self, dataset_id: Uuid, extraction: &Extraction) -> Result<SampleLocation> {
        if extraction.sample.is_empty() {
            return Ok(SampleLocation::Empty);
        }
        let doc = encode_sample(&extraction.sample)?;
        let body = serde_json::to_vec(&doc)?;
        if body.len() <= self.settings.max_inline_sample_bytes {
            return Ok(SampleLocation::Inline(doc));
        }

        let path = sample_object_path(dataset_id);
        self.objects
            .upload(&self.settings.sample_bucket, &path, Bytes::from(body), SAMPLE_CONTENT_TYPE)
            .await?;
        info!(job_id = %dataset_id, path = %path, "dataset: sample stored");
        Ok(SampleLocation::Stored(path))
    }

    async fn invalidate(&self, id: Uuid, msg: String) -> DatasetOutcome {
        warn!(job_id = %id, "dataset: invalid: {msg}");
        match self.store.mark_invalid(id, &msg).await {
            Ok(true) => {
                self.stats.datasets.record(Outcome::Invalid);
                DatasetOutcome::Invalid(msg)
            }
            Ok(false) => DatasetOutcome::Lost,
            Err(e) => {
                // Left in `processing`; the stale reaper picks it up.
                error!(job_id = %id, "dataset: could not mark invalid: {e:?}");
                DatasetOutcome::Invalid(msg)
            }
        }
    }
}

async fn extract_blocking(bytes: Bytes, filename: String, opts: ExtractOptions) -> Result<Extraction> {
    tokio::task::spawn_blocking(move || tabular::extract(&bytes, &filename, opts))
        .await
        .map_err(|e| anyhow!("extract task panicked: {e}"))?
        .context("unreadable file")
}

#[async_trait]
impl PollingWorker for DatasetWorker {
    fn name(&self) -> &'static str {
        "dataset"
    }

    async fn poll_once(&self) -> bool {
        self.stats.datasets.polled();
        let Some(dataset) = claim_next_dataset(self.store.as_ref()).await else {
            return false;
        };
        self.stats.datasets.claimed();
        self.process(dataset).await;
        true
    }

    async fn reap_stale(&self) {
        let Some(after) = self.settings.stale_after else { return };
        match self.store.reap_stale_datasets(after).await {
            Ok(ids) => {
                for id in ids {
                    warn!(job_id = %id, "dataset: stuck in processing, marked invalid");
                    self.stats.datasets.record(Outcome::Invalid);
                }
            }
            Err(e) => warn!("dataset: reaper failed: {e:?}"),
        }
    }
}
