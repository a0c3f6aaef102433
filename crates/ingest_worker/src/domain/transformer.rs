use crate::domain::IdentityCache;
use common::domain::{IdentityRecord, LogEntryStub, Observation, PendingInsert, UNRESOLVED_ID};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Splits an observation into a pending insert.
///
/// Every dimension found in the cache carries its identifier and no record.
/// Every miss carries the record so the writer can resolve it.
pub fn decompose(observation: &Observation, cache: &IdentityCache) -> PendingInsert {
    let digests = observation.digests();

    let user_id = cache.get(&digests.user);
    let user = (user_id == UNRESOLVED_ID).then(|| observation.user_record());

    let device_id = cache.get(&digests.device);
    let device = (device_id == UNRESOLVED_ID).then(|| observation.device_record());

    let address_id = cache.get(&digests.address);
    let address = (address_id == UNRESOLVED_ID).then(|| observation.address_record());

    let identity_id = cache.get(&digests.identity);
    let identity = (identity_id == UNRESOLVED_ID).then_some(IdentityRecord {
        user_id,
        device_id,
        address_id,
    });

    PendingInsert {
        user,
        device,
        address,
        identity,
        log: LogEntryStub {
            time: observation.time,
        },
        digests,
        user_id,
        device_id,
        address_id,
        identity_id,
    }
}

/// Worker loop: takes observations off the shared ingestion queue and hands
/// pending inserts to the writer until either channel closes.
pub async fn run_worker(
    worker: usize,
    observations: Arc<Mutex<mpsc::Receiver<Observation>>>,
    pending: mpsc::Sender<PendingInsert>,
    cache: Arc<IdentityCache>,
) {
    loop {
        // Hold the receiver lock only for one message
        let observation = {
            let mut receiver = observations.lock().await;
            receiver.recv().await
        };

        let Some(observation) = observation else {
            debug!(worker, "ingestion queue closed, worker stopping");
            break;
        };

        let insert = decompose(&observation, &cache);
        if pending.send(insert).await.is_err() {
            warn!(worker, "write queue closed, worker stopping");
            break;
        }
    }
}
