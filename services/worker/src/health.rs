//! Liveness and counters over HTTP.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Default)]
pub struct QueueStats {
    claimed: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    invalid: AtomicU64,
    last_poll_unix: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Retried,
    Failed,
    Invalid,
}

impl QueueStats {
    pub fn polled(&self) {
        self.last_poll_unix.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn claimed(&self) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Completed => &self.completed,
            Outcome::Retried => &self.retried,
            Outcome::Failed => &self.failed,
            Outcome::Invalid => &self.invalid,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let last = self.last_poll_unix.load(Ordering::Relaxed);
        QueueSnapshot {
            claimed: self.claimed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            last_poll: (last > 0).then(|| Utc.timestamp_opt(last, 0).single()).flatten(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub claimed: u64,
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    pub invalid: u64,
    pub last_poll: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct WorkerStats {
    pub datasets: QueueStats,
    pub reports: QueueStats,
    started_at: DateTime<Utc>,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            datasets: QueueStats::default(),
            reports: QueueStats::default(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub started_at: DateTime<Utc>,
    pub datasets: QueueSnapshot,
    pub reports: QueueSnapshot,
}

impl WorkerStats {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            started_at: self.started_at,
            datasets: self.datasets.snapshot(),
            reports: self.reports.snapshot(),
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(stats): State<Arc<WorkerStats>>) -> Json<StatusSnapshot> {
    Json(stats.snapshot())
}

pub fn router(stats: Arc<WorkerStats>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(stats)
}

pub async fn serve(addr: &str, stats: Arc<WorkerStats>, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {addr}"))?;
    info!("health endpoint listening on http://{addr}");
    axum::serve(listener, router(stats))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("health endpoint failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_counters() {
        let stats = Arc::new(WorkerStats::default());
        stats.reports.polled();
        stats.reports.claimed();
        stats.reports.record(Outcome::Retried);
        stats.datasets.record(Outcome::Invalid);

        let Json(snap) = status(State(stats)).await;
        assert_eq!(snap.reports.claimed, 1);
        assert_eq!(snap.reports.retried, 1);
        assert!(snap.reports.last_poll.is_some());
        assert_eq!(snap.datasets.invalid, 1);
        assert_eq!(snap.datasets.last_poll, None);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        assert_eq!(healthz().await, "ok");
    }
}
