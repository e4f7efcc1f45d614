//! Per-stage concurrency limits.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A counting limiter for one pipeline stage.
#[derive(Debug, Clone)]
pub struct Gate {
    name: &'static str,
    permits: Arc<Semaphore>,
    size: usize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Give the slot back explicitly.
    pub fn release(self) {}
}

impl Gate {
    /// A size of 0 is treated as 1.
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            name,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait until a slot is free.
    pub async fn acquire(&self) -> GatePermit {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");
        debug!(
            "Acquired {} gate ({} of {} free)",
            self.name,
            self.permits.available_permits(),
            self.size
        );
        GatePermit { _permit: permit }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// The three stage gates, acquired in pipeline order and never nested.
#[derive(Debug, Clone)]
pub struct ConcurrencyGates {
    pub retrieval: Gate,
    pub transcode: Gate,
    pub enrichment: Gate,
}

impl ConcurrencyGates {
    pub fn new(retrieval: usize, transcode: usize, enrichment: usize) -> Self {
        Self {
            retrieval: Gate::new("retrieval", retrieval),
            transcode: Gate::new("transcode", transcode),
            enrichment: Gate::new("enrichment", enrichment),
        }
    }
}
