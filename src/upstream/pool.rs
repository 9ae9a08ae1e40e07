//! Bounded per-endpoint concurrency.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::store::model::EndpointId;

/// Caps in-flight calls per endpoint. Callers over the cap queue on the
/// semaphore rather than piling more load onto a slow backend.
#[derive(Debug)]
pub struct UpstreamPool {
    permits_per_endpoint: usize,
    semaphores: DashMap<EndpointId, Arc<Semaphore>>,
}

impl UpstreamPool {
    pub fn new(permits_per_endpoint: usize) -> Self {
        Self {
            permits_per_endpoint: permits_per_endpoint.max(1),
            semaphores: DashMap::new(),
        }
    }

    /// Wait for a slot toward the given endpoint. The permit releases the
    /// slot on drop, including when the request future is cancelled.
    pub async fn acquire(&self, endpoint_id: EndpointId) -> OwnedSemaphorePermit {
        let semaphore = self
            .semaphores
            .entry(endpoint_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.permits_per_endpoint)))
            .value()
            .clone();

        // The semaphore is never closed, so acquisition only fails if the
        // future is dropped while waiting.
        match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("upstream pool semaphore is never closed"),
        }
    }
}
