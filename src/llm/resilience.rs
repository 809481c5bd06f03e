//! Bounded retry for LLM invocations.
//!
//! Retryable failures (timeouts, transient transport errors, empty
//! output) are retried with exponential backoff; everything else fails
//! immediately. Bounded retry is the only resilience layer here: a
//! batch pipeline that has exhausted its retries marks the date pending
//! and moves on.

use super::LlmWorker;
use crate::{Error, Result};
use std::time::Duration;

/// Retry configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Initial backoff; doubles per attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at 60 seconds.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let millis = u64::try_from(self.base_backoff.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_mul(1 << exponent);
        Duration::from_millis(millis.min(60_000))
    }
}

/// Wraps a worker with bounded retry.
pub struct RetryingWorker<W> {
    inner: W,
    policy: RetryPolicy,
}

impl<W: LlmWorker> RetryingWorker<W> {
    /// Creates a retrying wrapper.
    #[must_use]
    pub const fn new(inner: W, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<W: LlmWorker> LlmWorker for RetryingWorker<W> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn invoke(&self, prompt: &str) -> Result<String> {
        let max_attempts = self.policy.max_retries + 1;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max_attempts {
            metrics::counter!("llm_requests_total", "worker" => self.inner.name()).increment(1);
            match self.inner.invoke(prompt) {
                Ok(output) => return Ok(output),
                Err(err) => {
                    let retryable = err.is_retryable() && attempt < max_attempts;
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        retryable,
                        error = %err,
                        "LLM invocation failed"
                    );
                    if !retryable {
                        return Err(err);
                    }
                    metrics::counter!("llm_retries_total", "worker" => self.inner.name())
                        .increment(1);
                    std::thread::sleep(self.policy.backoff(attempt));
                    last_error = Some(err);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| Error::LlmUnavailable("exhausted retries".to_string())))
    }
}
