use crate::domain::{run_worker, BatchWriter, IdentityCache};
use async_trait::async_trait;
use common::domain::{IdentityStore, Observation, ObservationSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Queue slots per worker, for both the ingestion and the write queue
const QUEUE_SLOTS_PER_WORKER: usize = 1000;

#[derive(Debug, Clone)]
pub struct IngestPipelineConfig {
    /// Transformer tasks. Zero is treated as one.
    pub workers: usize,
    /// Time between flushes, also the reconnect backoff
    pub write_interval: Duration,
}

impl Default for IngestPipelineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            write_interval: Duration::from_secs(15),
        }
    }
}

impl IngestPipelineConfig {
    pub fn queue_capacity(&self) -> usize {
        self.workers.max(1) * QUEUE_SLOTS_PER_WORKER
    }
}

/// Handle to a running pipeline: worker pool plus batch writer.
///
/// Dropping the handle aborts every task. Buffered inserts are lost.
pub struct IngestPipeline {
    observations: mpsc::Sender<Observation>,
    cache: Arc<IdentityCache>,
    queue_len: Arc<AtomicUsize>,
    tasks: Vec<JoinHandle<()>>,
}

impl IngestPipeline {
    /// Spawns the workers and the writer on the current runtime
    pub fn start<S>(store: S, config: IngestPipelineConfig) -> Self
    where
        S: IdentityStore + 'static,
    {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity();

        let (observation_tx, observation_rx) = mpsc::channel(capacity);
        let (pending_tx, pending_rx) = mpsc::channel(capacity);
        let observation_rx = Arc::new(Mutex::new(observation_rx));
        let cache = Arc::new(IdentityCache::new());

        let writer = BatchWriter::new(store, Arc::clone(&cache), config.write_interval);
        let queue_len = writer.queue_len_handle();

        let mut tasks = Vec::with_capacity(workers + 1);
        for worker in 0..workers {
            tasks.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&observation_rx),
                pending_tx.clone(),
                Arc::clone(&cache),
            )));
        }
        drop(pending_tx);
        tasks.push(tokio::spawn(writer.run(pending_rx)));

        info!(
            workers,
            queue_capacity = capacity,
            write_interval_secs = config.write_interval.as_secs_f64(),
            "ingest pipeline started"
        );

        Self {
            observations: observation_tx,
            cache,
            queue_len,
            tasks,
        }
    }

    /// Enqueues an observation, waiting while the ingestion queue is full
    pub async fn push(&self, observation: Observation) {
        if self.observations.send(observation).await.is_err() {
            error!("ingestion queue closed, dropping observation");
        }
    }

    /// Pending inserts held by the writer and not yet committed
    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }
}

impl Drop for IngestPipeline {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl ObservationSink for IngestPipeline {
    async fn push(&self, observation: Observation) {
        IngestPipeline::push(self, observation).await
    }

    fn queue_len(&self) -> usize {
        IngestPipeline::queue_len(self)
    }
}
