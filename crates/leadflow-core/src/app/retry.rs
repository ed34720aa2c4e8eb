//! Retry policy: fixed-count, fixed-delay retry around one stage call.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::domain::DEFAULT_MAX_RETRIES;

/// Retry policy for a single stage call on a single lead.
///
/// Up to `max_retries + 1` attempts with the same `delay` between them. No
/// backoff growth, no jitter, no branching on the error kind: a quota error
/// and a timeout are retried the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,

    /// Pause after every failed attempt except the last.
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Same delay, task-specific budget.
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the attempt that follows `attempt` (1-indexed), or `None`
    /// when `attempt` was the last one.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts()).then_some(self.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Self::DEFAULT_DELAY)
    }
}

/// Run `op` under `policy`, returning the first success or the last error.
///
/// `label` only feeds the log lines (usually the stage name).
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(delay) = policy.next_delay(attempt) else {
            warn!(stage = label, attempt, error = %err, "retries exhausted");
            return Err(err);
        };

        warn!(
            stage = label,
            attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
