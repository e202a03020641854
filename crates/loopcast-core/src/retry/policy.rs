use std::time::Duration;

/// How a failed provider call or transfer should be treated by [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transfer or helper call ran out of time.
    Timeout,
    /// Cache provider or link host is rate limiting us.
    Throttled,
    /// Connection dropped, DNS failure, helper reported a temporary outage.
    Connection,
    /// Server error on a direct link.
    Http5xx(u16),
    /// Permanent for this attempt: missing content, bad response, local disk.
    Other,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

const THROTTLE_FACTOR: f64 = 2.0;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and surface the error.
    NoRetry,
    /// Sleep, then try again.
    RetryAfter(Duration),
}

/// Exponential backoff shared by provider calls and link transfers; built from `[retry]`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    /// Wait before attempt 2.
    pub base_delay: Duration,
    /// Wait growth per attempt.
    pub multiplier: f64,
    /// Cap on any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries (status-only paths, tests).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// `attempt` is 1-based: the attempt that just failed.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts || !kind.is_transient() {
            return RetryDecision::NoRetry;
        }
        // base * multiplier^(attempt-1), capped.
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exp);
        let mut raw = self.base_delay.as_secs_f64() * factor;
        // throttled waits double, still under the cap
        if kind == ErrorKind::Throttled {
            raw *= THROTTLE_FACTOR;
        }
        let capped = raw.min(self.max_delay.as_secs_f64());
        let delay = if capped.is_finite() {
            Duration::from_secs_f64(capped.max(0.0))
        } else {
            self.max_delay
        };
        RetryDecision::RetryAfter(delay)
    }
}
