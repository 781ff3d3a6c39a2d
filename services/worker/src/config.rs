use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerRole {
    Dataset,
    Report,
    All,
}

impl WorkerRole {
    pub fn runs_datasets(self) -> bool {
        matches!(self, WorkerRole::Dataset | WorkerRole::All)
    }

    pub fn runs_reports(self) -> bool {
        matches!(self, WorkerRole::Report | WorkerRole::All)
    }
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub provider: String,
    pub model: Option<String>,
    /// Total budget for one completion, in-call retries included.
    pub timeout: Duration,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,

    pub deepseek_api_key: Option<String>,
    pub deepseek_base_url: String,
    pub deepseek_model: String,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub database_url: String,
    pub storage_url: String,
    pub storage_service_key: String,

    pub role: WorkerRole,
    pub dataset_poll_interval: Duration,
    pub report_poll_interval: Duration,
    pub max_retries: i32,
    pub stale_after: Option<Duration>,

    pub sample_rows: usize,
    pub max_inspect_rows: usize,
    pub max_inline_sample_bytes: usize,
    pub dataset_bucket: String,
    pub sample_bucket: String,

    pub report_language: String,
    pub ai: AiConfig,

    pub health_bind_addr: Option<String>,
    pub run_migrations: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = get("DATABASE_URL")?;
        let storage_url = get("STORAGE_URL")?;
        let storage_service_key = get("STORAGE_SERVICE_KEY")?;

        let role = match opt("WORKER_ROLE").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("all") => WorkerRole::All,
            Some("dataset") | Some("datasets") | Some("parse") => WorkerRole::Dataset,
            Some("report") | Some("reports") => WorkerRole::Report,
            Some(other) => bail!("WORKER_ROLE must be one of dataset, report, all (got {other})"),
        };

        let dataset_poll_interval = Duration::from_secs(parse_or("DATASET_POLL_INTERVAL_SECS", 30)?);
        let report_poll_interval = Duration::from_secs(parse_or("REPORT_POLL_INTERVAL_SECS", 30)?);
        let max_retries: i32 = parse_or("MAX_RETRIES", 3)?;
        let stale_secs: u64 = parse_or("STALE_AFTER_SECS", 1800)?;

        let sample_rows: usize = parse_or("SAMPLE_ROWS", tabular::DEFAULT_SAMPLE_ROWS)?;
        let max_inspect_rows: usize = parse_or("MAX_INSPECT_ROWS", tabular::DEFAULT_MAX_INSPECT)?;
        let max_inline_sample_bytes: usize = parse_or("MAX_INLINE_SAMPLE_BYTES", 16 * 1024)?;
        let dataset_bucket = opt("DATASET_BUCKET").unwrap_or_else(|| "datasets".to_string());
        let sample_bucket = opt("SAMPLE_BUCKET").unwrap_or_else(|| "datasets_sample".to_string());

        let report_language = opt("REPORT_LANGUAGE").unwrap_or_else(|| "pt-BR".to_string());

        let ai = AiConfig {
            provider: opt("AI_PROVIDER")
                .unwrap_or_else(|| "openai".to_string())
                .to_ascii_lowercase(),
            model: opt("AI_MODEL"),
            timeout: Duration::from_millis(parse_or("AI_TIMEOUT_MS", 30_000)?),
            openai_api_key: opt("OPENAI_API_KEY"),
            openai_base_url: opt("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            deepseek_api_key: opt("DEEPSEEK_API_KEY"),
            deepseek_base_url: opt("DEEPSEEK_BASE_URL").unwrap_or_else(|| "https://api.deepseek.com/v1".to_string()),
            deepseek_model: opt("DEEPSEEK_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
        };

        let health_bind_addr = opt("HEALTH_BIND_ADDR");
        let run_migrations = opt("RUN_MIGRATIONS")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
            .unwrap_or(false);

        // Tiny sanity checks (fail fast, fail loud)
        if !storage_url.starts_with("http://") && !storage_url.starts_with("https://") {
            bail!("STORAGE_URL must start with http:// or https://");
        }
        if max_retries < 1 {
            bail!("MAX_RETRIES must be at least 1");
        }
        if sample_rows == 0 || max_inspect_rows == 0 {
            bail!("SAMPLE_ROWS and MAX_INSPECT_ROWS must be positive");
        }
        if dataset_poll_interval.is_zero() || report_poll_interval.is_zero() {
            bail!("poll intervals must be positive");
        }
        if ai.timeout.is_zero() {
            bail!("AI_TIMEOUT_MS must be positive");
        }

        Ok(Self {
            database_url,
            storage_url,
            storage_service_key,
            role,
            dataset_poll_interval,
            report_poll_interval,
            max_retries,
            stale_after: (stale_secs > 0).then(|| Duration::from_secs(stale_secs)),
            sample_rows,
            max_inspect_rows,
            max_inline_sample_bytes,
            dataset_bucket,
            sample_bucket,
            report_language,
            ai,
            health_bind_addr,
            run_migrations,
        })
    }

    pub fn extract_options(&self) -> tabular::ExtractOptions {
        tabular::ExtractOptions {
            sample_rows: self.sample_rows,
            max_inspect: self.max_inspect_rows,
        }
    }
}

fn get(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Missing required env var: {key}"))
}

fn opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match opt(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is not valid ({raw}): {e}")),
    }
}
