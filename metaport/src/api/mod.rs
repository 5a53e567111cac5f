//! Metadata Catalog API Module
//!
//! Client surface for a metadata catalog instance: token-paged listing,
//! lookup by fully-qualified name, create/update, failure classification,
//! and the resilience layer (retry, timeouts, bounded workers) that every
//! remote call runs through.

pub mod client;
pub mod error;
pub mod models;
pub mod resilience;

#[cfg(test)]
pub mod testkit;

pub use client::{CatalogApi, CatalogClient};
pub use error::ApiError;
pub use models::{EntityPage, EntityRecord, RecordError};
pub use resilience::{ResilienceConfig, RetryConfig, RetryPolicy, WorkerConfig, WorkerLimiter};
