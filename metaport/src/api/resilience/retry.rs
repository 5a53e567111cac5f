//! Retry policy for remote catalog calls
//!
//! Wraps a single remote operation with bounded retries, exponential backoff
//! with optional jitter, and a per-call timeout. Only failures classified as
//! transient are retried; terminal failures surface immediately.
//!
//! Operations receive their attempt number so callers can make retried
//! writes idempotent (e.g. re-checking existence before replaying a create).

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use super::config::RetryConfig;
use crate::api::error::ApiError;

/// Executes remote operations under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before retrying after `attempt` failed attempts (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = self.config.base_delay.as_secs_f64() * exp;
        let capped = base.min(self.config.max_delay.as_secs_f64());
        let factor = if self.config.jitter {
            rand::rng().random_range(0.5..=1.5)
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget is exhausted. The closure is invoked with the attempt number
    /// (starting at 1) and must be safe to repeat.
    pub async fn execute<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, ApiError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            let started = std::time::Instant::now();
            let result = match tokio::time::timeout(
                self.config.request_timeout,
                operation(attempt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout { elapsed: started.elapsed() }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{label}: attempt {attempt}/{} failed ({err}), retrying in {:?}",
                        self.config.max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        warn!(
                            "{label}: giving up after {attempt} attempts ({err})"
                        );
                    } else {
                        debug!("{label}: terminal failure ({err})");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
            request_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result = policy
            .execute("op", move |_| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_is_retried_until_success() {
        let policy = fast_policy(5);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result = policy
            .execute("op", move |_| {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ApiError::from_status(503, "unavailable"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_is_not_retried() {
        let policy = fast_policy(5);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<(), _> = policy
            .execute("op", move |_| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::from_status(400, "bad request"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_budget_exhausted() {
        let policy = fast_policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<(), _> = policy
            .execute("op", move |_| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ApiError::from_status(500, "oops"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_number_is_passed_through() {
        let policy = fast_policy(3);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        let _: Result<(), _> = policy
            .execute("op", move |attempt| {
                let seen = seen2.clone();
                async move {
                    seen.lock().unwrap().push(attempt);
                    Err(ApiError::from_status(500, "oops"))
                }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 2.0,
            jitter: false,
            request_timeout: Duration::from_secs(5),
        });
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400)); // capped
    }
}
