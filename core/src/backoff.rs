use crate::classify::{classify, Classification};
use crate::config::RetryConfig;
use crate::error::{Error, SourceError};
use crate::shutdown::Shutdown;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Decision returned by the backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Exponential backoff without jitter, capped by a per-operation retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_wait: crate::classify::RATE_LIMIT_WAIT,
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            rate_limit_wait: Duration::from_secs(config.rate_limit_wait_secs),
        }
    }
}

impl BackoffPolicy {
    /// `attempt` counts retries already made for the current operation (0 on first failure).
    pub fn should_retry(&self, attempt: u32, classification: Option<&Classification>) -> RetryDecision {
        let classification = match classification {
            Some(c) if c.retryable => c,
            _ => return RetryDecision::NoRetry,
        };

        if attempt >= self.max_retries {
            return RetryDecision::NoRetry;
        }

        match classification.min_delay {
            Some(delay) if delay > Duration::ZERO => RetryDecision::RetryAfter(delay),
            _ => RetryDecision::RetryAfter(self.exponential(attempt)),
        }
    }

    /// `base_delay * 2^attempt`, saturating.
    pub fn exponential(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// A retry that is about to sleep.
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// 1-based number of the retry being scheduled.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: &'a SourceError,
}

#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Cancelled,
    Failed(Error),
}

/// Runs `operation` until it succeeds, fails for good, or shutdown is requested.
///
/// Shutdown is checked before every call and raced against every backoff sleep;
/// an in-flight call is never interrupted.
pub async fn retry_with_backoff<F, Fut, T, N>(
    mut operation: F,
    policy: &BackoffPolicy,
    shutdown: &mut Shutdown,
    operation_name: &str,
    mut on_retry: N,
) -> Attempt<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
    N: FnMut(RetryNotice<'_>),
{
    let mut attempt = 0u32;

    loop {
        if shutdown.is_triggered() {
            return Attempt::Cancelled;
        }

        let err = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        retries = attempt,
                        "Operation succeeded after retries"
                    );
                }
                return Attempt::Success(result);
            }
            Err(e) => e,
        };

        let classification = classify(&err, policy.rate_limit_wait);
        let delay = match policy.should_retry(attempt, Some(&classification)) {
            RetryDecision::RetryAfter(delay) => delay,
            RetryDecision::NoRetry => {
                warn!(
                    operation = operation_name,
                    retries = attempt,
                    retryable = classification.retryable,
                    error = %err,
                    "Operation failed"
                );
                let fatal = Error::from_source(err);
                if classification.retryable {
                    return Attempt::Failed(Error::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(fatal),
                    });
                }
                return Attempt::Failed(fatal);
            }
        };

        attempt += 1;
        warn!(
            operation = operation_name,
            attempt,
            retry_after_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, retrying"
        );
        on_retry(RetryNotice {
            attempt,
            max_retries: policy.max_retries,
            delay,
            error: &err,
        });

        tokio::select! {
            biased;
            _ = shutdown.triggered() => return Attempt::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
