#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use worker::ai_client::AiClient;
use worker::dataset_worker::{DatasetSettings, DatasetWorker};
use worker::health::WorkerStats;
use worker::memory::MemoryStore;
use worker::model::{DatasetRecord, DatasetStatus};
use worker::provider::{AiError, Completion, CompletionRequest, LLMProvider, ProviderInfo, Usage};
use worker::report_worker::{ReportSettings, ReportWorker};
use worker::sample::encode_sample;
use worker::storage::MemoryObjectStore;

/// Replays scripted replies in order and records every prompt it was sent.
#[derive(Default)]
pub struct FakeProvider {
    replies: Mutex<VecDeque<Result<Completion, AiError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_text(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(Completion {
            text: text.to_string(),
            usage: Some(Usage {
                input_tokens: 30,
                output_tokens: 12,
                total_tokens: 42,
            }),
            raw: json!({"fake": true}),
        }));
    }

    pub fn reply_error(&self, err: AiError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for FakeProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, AiError> {
        self.prompts.lock().unwrap().push(req.input.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Transport("no scripted reply".into())))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "fake".into(),
            base_url: "memory://fake".into(),
            default_model: "fake-1".into(),
        }
    }
}

pub fn valid_report() -> Value {
    json!({
        "summary": "Revenue is concentrated in two services.",
        "insights": [{"text": "Botox drives most revenue", "confidence": "high"}],
        "charts": [{"type": "bar", "title": "Revenue by service", "columns": ["service", "total"],
                    "data_rows": [["Botox", 700], ["Peeling", 200]]}],
        "kpis": [{"label": "Total revenue", "value": 900, "unit": "BRL"}],
        "meta": {"rows_sampled": 3, "warnings": []}
    })
}

pub const SALES_CSV: &str = "client,email,service,total\n\
Ana,ana@x.com,Botox,350\n\
Bia,,Peeling,200\n\
Caio,,Botox,350\n";

pub struct Harness {
    pub store: MemoryStore,
    pub objects: MemoryObjectStore,
    pub provider: Arc<FakeProvider>,
    pub stats: Arc<WorkerStats>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            objects: MemoryObjectStore::new(),
            provider: FakeProvider::new(),
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn dataset_worker(&self, settings: DatasetSettings) -> DatasetWorker {
        DatasetWorker::new(
            Arc::new(self.store.clone()),
            Arc::new(self.objects.clone()),
            settings,
            self.stats.clone(),
        )
    }

    pub fn report_worker(&self, settings: ReportSettings) -> ReportWorker {
        let ai = AiClient::new(self.provider.clone(), "fake-1", Duration::from_secs(5));
        ReportWorker::new(
            Arc::new(self.store.clone()),
            Arc::new(self.objects.clone()),
            ai,
            settings,
            self.stats.clone(),
        )
    }

    /// A dataset already through the parse worker, sample inline.
    pub async fn parsed_dataset(&self, owner_id: Uuid, csv: &str) -> Uuid {
        let extraction = tabular::extract(csv.as_bytes(), "sales.csv", Default::default()).unwrap();
        let mut d = DatasetRecord::uploaded(owner_id, "owner/sales.csv", "sales.csv");
        d.status = DatasetStatus::Parsed;
        d.row_count = extraction.row_count as i64;
        d.columns = extraction.columns;
        d.sample_json = Some(encode_sample(&extraction.sample).unwrap());
        self.store.insert_dataset(d).await
    }
}
