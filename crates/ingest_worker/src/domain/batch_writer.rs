use crate::domain::IdentityCache;
use common::domain::{
    Digest, DomainError, DomainResult, IdentityRecord, IdentityStore, PendingInsert, RowId,
    StoreTransaction, UNRESOLVED_ID,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_WRITE_INTERVAL: Duration = Duration::from_millis(1);

/// A pending insert that failed part way through and was rolled back
struct RowFailure {
    dimension: &'static str,
    source: DomainError,
}

/// Keeps an identifier known when the insert was decomposed, else takes the one looked up
fn known_or(known: RowId, looked_up: RowId) -> RowId {
    if known == UNRESOLVED_ID {
        looked_up
    } else {
        known
    }
}

fn failed(dimension: &'static str) -> impl FnOnce(DomainError) -> RowFailure {
    move |source| RowFailure { dimension, source }
}

/// Resolves one pending insert inside the open transaction and writes its log
/// entry. Returns the digest/identifier pairs resolved along the way.
///
/// Identifiers are kept in locals so a retried batch replays the buffered
/// inserts unchanged.
async fn write_row<T>(
    tx: &mut T,
    insert: &PendingInsert,
) -> Result<Vec<(Digest, RowId)>, RowFailure>
where
    T: StoreTransaction + ?Sized,
{
    let mut resolved = Vec::with_capacity(4);

    let mut user_id = insert.user_id;
    if let Some(user) = &insert.user {
        user_id = tx.get_or_insert_user(user).await.map_err(failed("user"))?;
        resolved.push((insert.digests.user, user_id));
    }

    let mut device_id = insert.device_id;
    if let Some(device) = &insert.device {
        device_id = tx
            .get_or_insert_device(device)
            .await
            .map_err(failed("device"))?;
        resolved.push((insert.digests.device, device_id));
    }

    let mut address_id = insert.address_id;
    if let Some(address) = &insert.address {
        address_id = tx
            .get_or_insert_address(address)
            .await
            .map_err(failed("address"))?;
        resolved.push((insert.digests.address, address_id));
    }

    let mut identity_id = insert.identity_id;
    if let Some(pending) = &insert.identity {
        let identity = IdentityRecord {
            user_id: known_or(pending.user_id, user_id),
            device_id: known_or(pending.device_id, device_id),
            address_id: known_or(pending.address_id, address_id),
        };
        identity_id = tx
            .get_or_insert_identity(&identity)
            .await
            .map_err(failed("identity"))?;
        resolved.push((insert.digests.identity, identity_id));
    }

    tx.insert_log(identity_id, insert.log.time)
        .await
        .map_err(failed("log"))?;

    Ok(resolved)
}

/// Single consumer of the write queue.
///
/// Buffers pending inserts and writes them in one transaction per tick.
/// The buffer survives a failed commit so the same rows are tried again on
/// the next tick.
pub struct BatchWriter<S> {
    store: S,
    cache: Arc<IdentityCache>,
    round_cache: IdentityCache,
    buffer: BTreeMap<u64, PendingInsert>,
    counter: u64,
    queue_len: Arc<AtomicUsize>,
    write_interval: Duration,
}

impl<S: IdentityStore> BatchWriter<S> {
    pub fn new(store: S, cache: Arc<IdentityCache>, write_interval: Duration) -> Self {
        Self {
            store,
            cache,
            round_cache: IdentityCache::new(),
            buffer: BTreeMap::new(),
            counter: 0,
            queue_len: Arc::new(AtomicUsize::new(0)),
            write_interval: write_interval.max(MIN_WRITE_INTERVAL),
        }
    }

    /// Counter mirroring the buffer length, readable from other tasks
    pub fn queue_len_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.queue_len)
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn publish_len(&self) {
        self.queue_len.store(self.buffer.len(), Ordering::Relaxed);
    }

    /// Prepares the store, retrying every write interval until it succeeds
    pub async fn connect(&mut self) {
        loop {
            match self.store.prepare().await {
                Ok(()) => {
                    info!("batch writer connected");
                    return;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = self.write_interval.as_secs_f64(),
                        "cannot prepare write statements, retrying"
                    );
                    tokio::time::sleep(self.write_interval).await;
                }
            }
        }
    }

    pub fn enqueue(&mut self, insert: PendingInsert) {
        self.counter += 1;
        self.buffer.insert(self.counter, insert);
        self.publish_len();
    }

    /// Writes the whole buffer in one transaction.
    ///
    /// Returns how many pending inserts were written. Rows that fail are
    /// rolled back to their savepoint and dropped. On `Err` nothing was
    /// committed, the buffer is kept, and the shared cache is unchanged.
    pub async fn flush(&mut self) -> DomainResult<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        info!(count = self.buffer.len(), "writing pending inserts");
        self.round_cache.clear();

        let mut tx = self.store.begin().await.map_err(|e| {
            error!(error = %e, "cannot start transaction");
            e
        })?;

        let mut written = 0;
        for insert in self.buffer.values() {
            tx.begin_row().await?;
            match write_row(tx.as_mut(), insert).await {
                Ok(resolved) => {
                    tx.release_row().await?;
                    for (digest, id) in resolved {
                        self.round_cache.add(digest, id);
                    }
                    written += 1;
                }
                Err(RowFailure { dimension, source }) => {
                    error!(dimension, error = %source, "error getting or inserting row, dropping it");
                    tx.discard_row().await?;
                }
            }
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, "cannot commit transaction");
            e
        })?;

        let dropped = self.buffer.len() - written;
        self.buffer.clear();
        self.publish_len();

        self.round_cache.merge_into(&self.cache);
        self.round_cache.clear();

        debug!(written, dropped, "batch committed");
        Ok(written)
    }

    /// Runs until the write queue closes
    pub async fn run(mut self, mut pending: mpsc::Receiver<PendingInsert>) {
        self.connect().await;

        let mut ticker = interval_at(Instant::now() + self.write_interval, self.write_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = pending.recv() => match received {
                    Some(insert) => self.enqueue(insert),
                    None => {
                        warn!(unflushed = self.buffer.len(), "write queue closed, batch writer stopping");
                        return;
                    }
                },
                _ = ticker.tick() => {
                    if self.buffer.is_empty() {
                        continue;
                    }
                    if !self.store.is_ready() {
                        warn!("store connection lost, reconnecting");
                        self.connect().await;
                    }
                    if let Err(e) = self.flush().await {
                        warn!(
                            error = %e,
                            pending = self.buffer.len(),
                            "batch not committed, retrying on next tick"
                        );
                    }
                }
            }
        }
    }
}
