//! Bounded worker pool for remote operations
//!
//! A semaphore-based limiter keeps at most `max_workers` remote calls in
//! flight; work past the bound queues on the semaphore instead of spawning
//! unbounded tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::WorkerConfig;

/// Limits in-flight remote operations to `max_workers`.
#[derive(Debug, Clone)]
pub struct WorkerLimiter {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
    acquired: Arc<AtomicU64>,
}

impl WorkerLimiter {
    pub fn new(config: &WorkerConfig) -> Self {
        // A zero-sized pool would deadlock the first acquire.
        let max_workers = config.max_workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            acquired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Acquire a worker slot, waiting if the pool is saturated. The permit
    /// releases its slot when dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        if self.semaphore.available_permits() == 0 {
            debug!("worker pool saturated ({} in flight), queueing", self.max_workers);
        }
        // acquire_owned only fails on a closed semaphore, which we never close.
        let permit = self.semaphore.clone().acquire_owned().await.unwrap();
        self.acquired.fetch_add(1, Ordering::Relaxed);
        permit
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total slots handed out since creation.
    pub fn total_acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }
}
