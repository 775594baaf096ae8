//! Explicit retry policy applied around the per-unit primitive call

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};

/// Retry policy for per-unit backend calls.
///
/// The dispatch engine applies the policy around the innermost provider call
/// only, never around its own wrapping logic, so every attempt sees the
/// original unit argument. When no policy is configured a unit is attempted
/// exactly once.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on the backoff schedule
    pub max_delay: Duration,
    /// Predicate deciding whether an error is worth retrying
    pub retry_if: fn(&TranslationError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            retry_if: is_transient,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and default backoff
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_retry_if(mut self, retry_if: fn(&TranslationError) -> bool) -> Self {
        self.retry_if = retry_if;
        self
    }

    /// Backoff slept after the given failed attempt (1-based):
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(2u32.pow(exponent))
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    /// Run an operation under this policy, returning the first success or the
    /// last error once attempts are exhausted or the error is not retryable
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if attempt >= budget || !(self.retry_if)(&err) {
                        return Err(err);
                    }
                    let delay = self.backoff_delay(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Default retryable-error predicate: transport failures and the transient
/// HTTP statuses (408, 429, 5xx). Validation, credential and
/// malformed-response errors are never retryable.
pub fn is_transient(error: &TranslationError) -> bool {
    match error {
        TranslationError::ApiError { status, .. } => {
            matches!(*status, 408 | 429) || *status >= 500
        }
        TranslationError::HttpError(e) => e.is_timeout() || e.is_connect(),
        TranslationError::IoError(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::Backend;
    use std::cell::Cell;

    fn transient_error() -> TranslationError {
        TranslationError::ApiError {
            backend: Backend::DeepL,
            status: 503,
            message: "service unavailable".to_string(),
        }
    }

    #[test]
    fn test_backoff_schedule_doubles_and_caps() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds_in_three_attempts() {
        let policy = RetryPolicy::new(3).with_base_delay(Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result = policy
            .run(|| {
                let n = calls.get() + 1;
                calls.set(n);
                async move {
                    if n < 3 {
                        Err(transient_error())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5).with_base_delay(Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result: Result<()> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                async {
                    Err(TranslationError::MalformedResponse {
                        backend: Backend::OpenAi,
                        message: "missing content".to_string(),
                    })
                }
            })
            .await;
        assert!(matches!(
            result,
            Err(TranslationError::MalformedResponse { .. })
        ));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let policy = RetryPolicy::new(2).with_base_delay(Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result: Result<()> = policy
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(transient_error()) }
            })
            .await;
        assert!(matches!(result, Err(TranslationError::ApiError { .. })));
        assert_eq!(calls.get(), 2);
    }
}
