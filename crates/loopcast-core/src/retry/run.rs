//! Retry loops: run an operation until success or policy says stop.

use std::fmt::Display;
use std::future::Future;

use super::classify::Retryable;
use super::policy::{RetryDecision, RetryPolicy};

/// Blocking variant for curl transfers running on the blocking pool.
/// On retryable failure, sleeps for the backoff duration then tries again.
pub fn run_with_retry<T, E, F>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Retryable + Display,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.error_kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                    std::thread::sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}

/// Async variant for provider calls. `what` names the operation in logs.
pub async fn retry_async<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 1u32;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.error_kind()) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::warn!(
                        op = what,
                        attempt,
                        delay_ms = d.as_millis() as u64,
                        "transient failure, retrying: {}",
                        e
                    );
                    tokio::time::sleep(d).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Debug)]
    struct Flaky(ErrorKind);

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky {:?}", self.0)
        }
    }

    impl Retryable for Flaky {
        fn error_kind(&self) -> ErrorKind {
            self.0
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn blocking_retries_transient_until_success() {
        let calls = Cell::new(0);
        let out: Result<u32, Flaky> = run_with_retry(&fast_policy(), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Flaky(ErrorKind::Connection))
            } else {
                Ok(7)
            }
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn blocking_stops_on_permanent_error() {
        let calls = Cell::new(0);
        let out: Result<(), Flaky> = run_with_retry(&fast_policy(), || {
            calls.set(calls.get() + 1);
            Err(Flaky(ErrorKind::Other))
        });
        assert!(out.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn async_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let out: Result<(), Flaky> = retry_async(&fast_policy(), "test", || {
            calls.set(calls.get() + 1);
            async { Err(Flaky(ErrorKind::Throttled)) }
        })
        .await;
        assert!(out.is_err());
        assert_eq!(calls.get(), 3);
    }
}
