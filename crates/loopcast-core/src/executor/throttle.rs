//! Global minimum spacing between cache-provider submissions.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Shared (via `Arc`) by every show of a run. Each `wait` returns no earlier
/// than `min_spacing` after the previous one returned.
#[derive(Debug)]
pub struct SubmissionThrottle {
    min_spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl SubmissionThrottle {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.min_spacing).await;
        }
        *last = Some(Instant::now());
    }
}
