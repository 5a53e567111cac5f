//! Resilience layer for catalog API calls
//!
//! Retry with backoff for transient failures, per-call timeouts, and a
//! bounded worker pool shared by the export and import pipelines.

pub mod concurrency;
pub mod config;
pub mod retry;

pub use concurrency::WorkerLimiter;
pub use config::{ResilienceConfig, RetryConfig, WorkerConfig};
pub use retry::RetryPolicy;
