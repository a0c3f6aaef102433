use crate::domain::{
    AddressRecord, DeviceRecord, DomainResult, IdentityRecord, RowId, UserRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Relational store used by the batch writer.
///
/// Only one writer may own a store at a time; natural-key uniqueness across
/// concurrent writers is left to the schema.
#[async_trait]
pub trait IdentityStore: Send {
    /// Prepares every statement the writer needs. Called again after a lost connection.
    async fn prepare(&mut self) -> DomainResult<()>;

    /// Whether prepared statements are usable
    fn is_ready(&self) -> bool;

    /// Opens the transaction that covers one flush
    async fn begin<'a>(&'a mut self) -> DomainResult<Box<dyn StoreTransaction + 'a>>;
}

/// One flush worth of work. Reads observe earlier writes of the same transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_or_insert_user(&mut self, user: &UserRecord) -> DomainResult<RowId>;

    async fn get_or_insert_device(&mut self, device: &DeviceRecord) -> DomainResult<RowId>;

    async fn get_or_insert_address(&mut self, address: &AddressRecord) -> DomainResult<RowId>;

    async fn get_or_insert_identity(&mut self, identity: &IdentityRecord) -> DomainResult<RowId>;

    async fn insert_log(&mut self, identity_id: RowId, time: DateTime<Utc>) -> DomainResult<()>;

    /// Marks the start of one pending insert's writes
    async fn begin_row(&mut self) -> DomainResult<()>;

    /// Keeps the writes made since `begin_row`
    async fn release_row(&mut self) -> DomainResult<()>;

    /// Undoes the writes made since `begin_row`
    async fn discard_row(&mut self) -> DomainResult<()>;

    async fn commit(self: Box<Self>) -> DomainResult<()>;
}
