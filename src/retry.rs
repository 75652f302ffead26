//! Retry with exponential backoff.
//!
//! The delay before retry `n` (zero-based) is `base_delay * 2^n`. After
//! `max_attempts` retries the last error is returned unchanged.

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Errors that know whether trying again could help.
pub trait Retryable {
    fn retryable(&self) -> bool;
}

impl Retryable for ApiError {
    fn retryable(&self) -> bool {
        ApiError::retryable(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay }
    }

    /// Never retry.
    #[must_use]
    pub const fn none() -> Self {
        Self { max_attempts: 0, base_delay: Duration::ZERO }
    }

    /// Delay before the retry following failed attempt `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `f`, retrying failures the error itself marks as retryable.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once retries are
/// exhausted.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, f: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with(policy, E::retryable, f).await
}

/// Run `f`, retrying failures for which `should_retry` returns `true`.
///
/// # Errors
///
/// Returns the first error `should_retry` rejects, or the last error once
/// retries are exhausted.
pub async fn retry_with<T, E, P, F, Fut>(policy: RetryPolicy, should_retry: P, mut f: F) -> Result<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && should_retry(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt = attempt + 1, delay_ms = delay.as_millis(), "retrying after failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
