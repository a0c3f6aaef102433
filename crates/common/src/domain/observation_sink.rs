use crate::domain::Observation;
use async_trait::async_trait;

/// Entry point of the ingestion pipeline as seen by the boundary layer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Enqueues a validated, timestamped observation. Waits while the ingestion queue is full.
    async fn push(&self, observation: Observation);

    /// Pending inserts buffered by the writer and not yet committed
    fn queue_len(&self) -> usize;
}
