//! Bounded retry with exponential backoff

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::Transient;

/// Retry count and backoff for calls to external services.
///
/// Only errors reporting [`Transient::is_transient`] are retried; anything
/// else is returned on the first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retry)
    pub max_retries: u32,
    /// Delay before the first retry, doubled each retry
    pub initial_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently or retries run out.
    ///
    /// `op` receives the attempt number starting at 0.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_transient_error_retried_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(1, Duration::from_millis(1));

        let result: Result<(), AnalysisError> = policy
            .run("analysis", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AnalysisError::UpstreamUnavailable("503".into()))
            })
            .await;

        assert!(matches!(result, Err(AnalysisError::UpstreamUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), AnalysisError> = policy
            .run("analysis", |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AnalysisError::MalformedResponse("not json".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let result: Result<u32, AnalysisError> = policy
            .run("analysis", |attempt| async move {
                if attempt == 0 {
                    Err(AnalysisError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result, Ok(1));
    }
}
