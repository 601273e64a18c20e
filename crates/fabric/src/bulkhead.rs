use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded-concurrency admission gate around a remote callee. Callers
/// wait up to the configured admission time for a slot, then fail fast.
///
/// Slots release when the permit drops, including on cancellation.
pub struct Bulkhead {
    name: String,
    slots: Arc<Semaphore>,
    max_wait: Duration,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, limit: usize, max_wait: Duration) -> Self {
        Self {
            name: name.into(),
            slots: Arc::new(Semaphore::new(limit)),
            max_wait,
        }
    }

    pub async fn acquire(&self) -> crate::Result<OwnedSemaphorePermit> {
        match tokio::time::timeout(self.max_wait, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            // The semaphore is never closed; both arms mean no slot in time.
            Ok(Err(_)) | Err(_) => Err(Error::BulkheadFull(self.name.clone())),
        }
    }
}
