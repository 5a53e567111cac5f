//! Resilience configuration for remote catalog calls

use std::time::Duration;

/// Combined configuration for the batch/retry controller.
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub workers: WorkerConfig,
}

/// Retry behavior for transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per call, including the first (1 = no retries)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Exponential growth factor between retries
    pub backoff_multiplier: f64,
    /// Randomize delays to avoid retry stampedes against a rate-limited server
    pub jitter: bool,
    /// Per-call timeout; a timeout counts as one retryable failure
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// No retries, no waiting (for tests and dry experiments).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Bound on in-flight remote operations.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent remote calls; further work queues
    pub max_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_workers: 8 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert!(config.retry.jitter);
        assert_eq!(config.workers.max_workers, 8);
    }

    #[test]
    fn test_disabled_never_waits() {
        let config = RetryConfig::disabled();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.base_delay, Duration::ZERO);
    }
}
