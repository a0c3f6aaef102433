use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database row identifier
pub type RowId = i64;

/// Marks an identifier that has not been resolved yet. No persisted row uses it.
pub const UNRESOLVED_ID: RowId = 0;

/// Natural key of a user row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRecord {
    pub uid: u32,
    pub username: String,
    pub full_name: String,
}

/// Natural key of a device row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceRecord {
    pub serial: String,
    pub client_identifier: String,
    pub hostname: String,
}

/// Natural key of an address row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressRecord {
    pub ip: String,
    pub internet_ip: String,
}

/// Junction of the three resolved dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityRecord {
    pub user_id: RowId,
    pub device_id: RowId,
    pub address_id: RowId,
}

/// Append-only fact row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: RowId,
    pub identity_id: RowId,
    pub time: DateTime<Utc>,
}

/// Most recent user seen on a device, as returned by the last-user lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUserEntry {
    pub username: String,
    pub full_name: String,
    pub serial: String,
    pub ip: String,
    pub internet_ip: String,
    pub time: DateTime<Utc>,
}
