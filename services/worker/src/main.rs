use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use worker::ai_client::AiClient;
use worker::config::WorkerConfig;
use worker::dataset_worker::{DatasetSettings, DatasetWorker};
use worker::health::{self, WorkerStats};
use worker::pg_store::PgStore;
use worker::registry::ProviderRegistry;
use worker::report_worker::{ReportSettings, ReportWorker};
use worker::retry::RetryPolicy;
use worker::storage::HttpObjectStore;
use worker::worker_loop::run_worker_loop;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = WorkerConfig::from_env()?;

    // --- Postgres ---
    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    if cfg.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pg_pool)
            .await
            .context("Failed to run migrations")?;
        info!("migrations: applied");
    }

    let store = Arc::new(PgStore::new(pg_pool));
    store.ping().await?;
    info!("postgres: ok");

    let objects = Arc::new(HttpObjectStore::new(&cfg.storage_url, &cfg.storage_service_key));
    let stats = Arc::new(WorkerStats::default());
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    if cfg.role.runs_datasets() {
        let dataset_worker = DatasetWorker::new(
            store.clone(),
            objects.clone(),
            DatasetSettings {
                dataset_bucket: cfg.dataset_bucket.clone(),
                sample_bucket: cfg.sample_bucket.clone(),
                extract: cfg.extract_options(),
                max_inline_sample_bytes: cfg.max_inline_sample_bytes,
                stale_after: cfg.stale_after,
            },
            stats.clone(),
        );
        tasks.push(tokio::spawn(run_worker_loop(
            Arc::new(dataset_worker),
            cfg.dataset_poll_interval,
            cancel.clone(),
        )));
    }

    if cfg.role.runs_reports() {
        let resolved = ProviderRegistry::from_config(&cfg.ai).resolve(&cfg.ai.provider, cfg.ai.model.as_deref())?;
        info!(provider = %resolved.provider.info().name, model = %resolved.model, "ai provider: resolved");

        let report_worker = ReportWorker::new(
            store.clone(),
            objects.clone(),
            AiClient::from_resolved(resolved, cfg.ai.timeout),
            ReportSettings {
                sample_bucket: cfg.sample_bucket.clone(),
                language: cfg.report_language.clone(),
                retry: RetryPolicy::new(cfg.max_retries),
                stale_after: cfg.stale_after,
            },
            stats.clone(),
        );
        tasks.push(tokio::spawn(run_worker_loop(
            Arc::new(report_worker),
            cfg.report_poll_interval,
            cancel.clone(),
        )));
    }

    if let Some(addr) = cfg.health_bind_addr.clone() {
        let (stats, cancel) = (stats.clone(), cancel.clone());
        tokio::spawn(async move {
            if let Err(e) = health::serve(&addr, stats, cancel).await {
                warn!("health endpoint stopped: {e:?}");
            }
        });
    }

    shutdown_signal().await;
    info!("shutdown requested, finishing in-flight jobs");
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            warn!("worker task ended abnormally: {e}");
        }
    }
    info!("worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl_c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler failed: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
