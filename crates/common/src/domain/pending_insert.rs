use crate::domain::{
    AddressRecord, DeviceRecord, IdentityRecord, ObservationDigests, RowId, UserRecord,
};
use chrono::{DateTime, Utc};

/// Log entry awaiting its identity reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntryStub {
    pub time: DateTime<Utc>,
}

/// Decomposed observation handed from a worker to the batch writer.
///
/// A `None` record means the identifier was already cached and the matching
/// `*_id` field holds it. A `Some` record must be resolved with a
/// get-or-insert during the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInsert {
    pub user: Option<UserRecord>,
    pub device: Option<DeviceRecord>,
    pub address: Option<AddressRecord>,
    pub identity: Option<IdentityRecord>,
    pub log: LogEntryStub,

    pub digests: ObservationDigests,

    pub user_id: RowId,
    pub device_id: RowId,
    pub address_id: RowId,
    pub identity_id: RowId,
}
