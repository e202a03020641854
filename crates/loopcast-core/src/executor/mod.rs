//! Bounded-concurrency download pool.
//!
//! Keeps up to `max_concurrent` transfers in flight; when one finishes the
//! next queued task starts, until the queue is empty. A failing transfer is
//! reported in its own [`TransferOutcome`] and never cancels its siblings.

mod active;
mod throttle;
mod transfer;

pub use active::{ActiveTransfer, ActiveTransfers};
pub use throttle::SubmissionThrottle;
pub use transfer::{CurlFetcher, CurlOptions, Fetcher, TransferError};

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::retry::{run_with_retry, RetryPolicy};

/// One (link, destination) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    /// Caller-chosen identifier, echoed in the outcome.
    pub id: String,
    pub url: String,
    pub destination: PathBuf,
}

#[derive(Debug)]
pub struct TransferOutcome {
    pub id: String,
    pub destination: PathBuf,
    /// Bytes in the finished file.
    pub result: Result<u64, TransferError>,
}

#[derive(Clone)]
pub struct DownloadExecutor {
    max_concurrent: usize,
    retry: RetryPolicy,
    fetcher: Arc<dyn Fetcher>,
}

impl DownloadExecutor {
    pub fn new(max_concurrent: usize, retry: RetryPolicy) -> Self {
        Self::with_fetcher(max_concurrent, retry, Arc::new(CurlFetcher::default()))
    }

    pub fn with_fetcher(max_concurrent: usize, retry: RetryPolicy, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            retry,
            fetcher,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Drain `tasks` through the pool. Outcomes are returned in completion order.
    pub async fn run(&self, tasks: Vec<DownloadTask>, active: &mut ActiveTransfers) -> Vec<TransferOutcome> {
        let mut queue: VecDeque<DownloadTask> = tasks.into();
        let mut outcomes = Vec::with_capacity(queue.len());
        let mut join_set = tokio::task::JoinSet::new();

        loop {
            while join_set.len() < self.max_concurrent {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                active.insert(&task.id, &task.destination);
                tracing::debug!(id = %task.id, dest = %task.destination.display(), "transfer started");
                let fetcher = Arc::clone(&self.fetcher);
                let policy = self.retry;
                join_set.spawn_blocking(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        run_with_retry(&policy, || fetcher.fetch(&task.url, &task.destination))
                    }))
                    .unwrap_or_else(|_| Err(TransferError::Worker("transfer thread panicked".to_string())));
                    TransferOutcome {
                        id: task.id,
                        destination: task.destination,
                        result,
                    }
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok(outcome) => {
                    active.remove(&outcome.id);
                    match &outcome.result {
                        Ok(bytes) => tracing::info!(id = %outcome.id, bytes, "transfer finished"),
                        Err(e) => tracing::warn!(id = %outcome.id, "transfer failed: {}", e),
                    }
                    outcomes.push(outcome);
                }
                Err(e) => tracing::error!("transfer task join: {}", e),
            }
        }

        outcomes
    }
}
