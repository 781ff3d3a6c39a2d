use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[async_trait]
pub trait PollingWorker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Claims and fully processes at most one job. `true` if a job was taken.
    async fn poll_once(&self) -> bool;

    /// Reclaims jobs stuck in `processing`.
    async fn reap_stale(&self);
}

/// Polls until `cancel` fires. A claimed job always runs to its end first;
/// the queue is drained back to back and the loop only sleeps when it is empty.
pub async fn run_worker_loop(worker: Arc<dyn PollingWorker>, poll_every: Duration, cancel: CancellationToken) {
    info!(worker = worker.name(), poll_every = ?poll_every, "worker_loop: started");

    while !cancel.is_cancelled() {
        worker.reap_stale().await;

        if worker.poll_once().await {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(poll_every) => {}
        }
    }

    info!(worker = worker.name(), "worker_loop: stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        jobs_left: AtomicUsize,
        polls: AtomicUsize,
        reaps: AtomicUsize,
    }

    #[async_trait]
    impl PollingWorker for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn poll_once(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.jobs_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        async fn reap_stale(&self) {
            self.reaps.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn drains_queue_then_stops_on_cancel() {
        let worker = Arc::new(Counting {
            jobs_left: AtomicUsize::new(3),
            polls: AtomicUsize::new(0),
            reaps: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker_loop(worker.clone(), Duration::from_secs(3600), cancel.clone()));

        // three jobs back to back, then one empty poll before the long sleep
        while worker.polls.load(Ordering::SeqCst) < 4 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        assert_eq!(worker.jobs_left.load(Ordering::SeqCst), 0);
        assert_eq!(worker.polls.load(Ordering::SeqCst), 4);
        assert_eq!(worker.reaps.load(Ordering::SeqCst), 4);
    }
}
