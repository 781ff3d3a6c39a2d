//! Job claiming. Errors never escape: the next poll tick is the retry.

use std::fmt;

use tracing::{debug, info, warn};

use crate::model::{DatasetRecord, ReportRequest};
use crate::store::{DatasetStore, ReportStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Datasets,
    ReportRequests,
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Queue::Datasets => "datasets",
            Queue::ReportRequests => "report_requests",
        })
    }
}

pub async fn claim_next_dataset(store: &dyn DatasetStore) -> Option<DatasetRecord> {
    match store.claim_dataset().await {
        Ok(Some(d)) => {
            info!(queue = %Queue::Datasets, job_id = %d.id, filename = %d.filename, "claimed job");
            Some(d)
        }
        Ok(None) => {
            debug!(queue = %Queue::Datasets, "no eligible job");
            None
        }
        Err(e) => {
            warn!(queue = %Queue::Datasets, "claim failed: {e:?}");
            None
        }
    }
}

pub async fn claim_next_report(store: &dyn ReportStore) -> Option<ReportRequest> {
    match store.claim_report().await {
        Ok(Some(r)) => {
            info!(queue = %Queue::ReportRequests, job_id = %r.id, retry_count = r.retry_count, "claimed job");
            Some(r)
        }
        Ok(None) => {
            debug!(queue = %Queue::ReportRequests, "no eligible job");
            None
        }
        Err(e) => {
            warn!(queue = %Queue::ReportRequests, "claim failed: {e:?}");
            None
        }
    }
}
