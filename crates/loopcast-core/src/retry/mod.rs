//! Retry and backoff policy.
//!
//! Provider calls and file transfers share one policy: transient failures
//! (timeouts, throttling, connection resets, 5xx) are retried with capped
//! exponential backoff; everything else surfaces immediately.

mod classify;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status, Retryable};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{retry_async, run_with_retry};
