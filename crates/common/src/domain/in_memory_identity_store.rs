use crate::domain::{
    AddressRecord, DeviceRecord, DomainError, DomainResult, IdentityRecord, IdentityStore,
    LogEntry, RowId, StoreTransaction, UserRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserRecord, RowId>,
    devices: HashMap<DeviceRecord, RowId>,
    addresses: HashMap<AddressRecord, RowId>,
    identities: HashMap<IdentityRecord, RowId>,
    logs: Vec<LogEntry>,
    last_id: RowId,
}

impl Tables {
    fn next_id(&mut self) -> RowId {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    tables: Tables,
    prepared: bool,
    prepare_attempts: usize,
    commits: usize,
    failing_prepares: usize,
    failing_commits: usize,
    rejected_usernames: HashSet<String>,
}

/// In-memory store with read-your-writes transactions and injectable faults.
///
/// Clones share the same tables so a test can keep a handle after moving
/// the store into a writer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` calls to `prepare` fail
    pub fn fail_next_prepares(&self, count: usize) {
        self.lock().failing_prepares = count;
    }

    /// The next `count` commits fail and discard their writes
    pub fn fail_next_commits(&self, count: usize) {
        self.lock().failing_commits = count;
    }

    /// Every get-or-insert of a user with this username fails
    pub fn reject_username(&self, username: &str) {
        self.lock().rejected_usernames.insert(username.to_string());
    }

    /// Forgets prepared statements, as after a dropped connection
    pub fn disconnect(&self) {
        self.lock().prepared = false;
    }

    pub fn users(&self) -> Vec<(RowId, UserRecord)> {
        sorted(&self.lock().tables.users)
    }

    pub fn devices(&self) -> Vec<(RowId, DeviceRecord)> {
        sorted(&self.lock().tables.devices)
    }

    pub fn addresses(&self) -> Vec<(RowId, AddressRecord)> {
        sorted(&self.lock().tables.addresses)
    }

    pub fn identities(&self) -> Vec<(RowId, IdentityRecord)> {
        sorted(&self.lock().tables.identities)
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.lock().tables.logs.clone()
    }

    pub fn prepare_attempts(&self) -> usize {
        self.lock().prepare_attempts
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }
}

fn sorted<K: Clone>(table: &HashMap<K, RowId>) -> Vec<(RowId, K)> {
    let mut rows: Vec<(RowId, K)> = table.iter().map(|(k, id)| (*id, k.clone())).collect();
    rows.sort_by_key(|(id, _)| *id);
    rows
}

fn get_or_insert<K: Clone + Eq + Hash>(
    table: &mut HashMap<K, RowId>,
    last_id: &mut RowId,
    key: &K,
) -> RowId {
    if let Some(id) = table.get(key) {
        return *id;
    }
    *last_id += 1;
    table.insert(key.clone(), *last_id);
    *last_id
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn prepare(&mut self) -> DomainResult<()> {
        let mut state = self.lock();
        state.prepare_attempts += 1;
        if state.failing_prepares > 0 {
            state.failing_prepares -= 1;
            state.prepared = false;
            return Err(DomainError::StatementPreparation {
                query: "in-memory",
                source: anyhow::anyhow!("store unreachable"),
            });
        }
        state.prepared = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lock().prepared
    }

    async fn begin<'a>(&'a mut self) -> DomainResult<Box<dyn StoreTransaction + 'a>> {
        let state = self.lock();
        if !state.prepared {
            return Err(DomainError::NotConnected);
        }
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            working: state.tables.clone(),
            savepoint: None,
            rejected_usernames: state.rejected_usernames.clone(),
        }))
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<InMemoryState>>,
    working: Tables,
    savepoint: Option<Tables>,
    rejected_usernames: HashSet<String>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn get_or_insert_user(&mut self, user: &UserRecord) -> DomainResult<RowId> {
        if self.rejected_usernames.contains(&user.username) {
            return Err(DomainError::Query {
                query: "users",
                arguments: format!("{:?}", user),
                source: anyhow::anyhow!("rejected username"),
            });
        }
        Ok(get_or_insert(
            &mut self.working.users,
            &mut self.working.last_id,
            user,
        ))
    }

    async fn get_or_insert_device(&mut self, device: &DeviceRecord) -> DomainResult<RowId> {
        Ok(get_or_insert(
            &mut self.working.devices,
            &mut self.working.last_id,
            device,
        ))
    }

    async fn get_or_insert_address(&mut self, address: &AddressRecord) -> DomainResult<RowId> {
        Ok(get_or_insert(
            &mut self.working.addresses,
            &mut self.working.last_id,
            address,
        ))
    }

    async fn get_or_insert_identity(&mut self, identity: &IdentityRecord) -> DomainResult<RowId> {
        Ok(get_or_insert(
            &mut self.working.identities,
            &mut self.working.last_id,
            identity,
        ))
    }

    async fn insert_log(&mut self, identity_id: RowId, time: DateTime<Utc>) -> DomainResult<()> {
        if !self.working.identities.values().any(|id| *id == identity_id) {
            return Err(DomainError::Query {
                query: "logs",
                arguments: format!("[{}, {}]", identity_id, time),
                source: anyhow::anyhow!("identity {} does not exist", identity_id),
            });
        }
        let id = self.working.next_id();
        self.working.logs.push(LogEntry {
            id,
            identity_id,
            time,
        });
        Ok(())
    }

    async fn begin_row(&mut self) -> DomainResult<()> {
        self.savepoint = Some(self.working.clone());
        Ok(())
    }

    async fn release_row(&mut self) -> DomainResult<()> {
        self.savepoint = None;
        Ok(())
    }

    async fn discard_row(&mut self) -> DomainResult<()> {
        self.working = self
            .savepoint
            .take()
            .ok_or_else(|| DomainError::Transaction(anyhow::anyhow!("no open savepoint")))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        let this = *self;
        let mut state = this.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(DomainError::Transaction(anyhow::anyhow!(
                "injected commit failure"
            )));
        }
        state.tables = this.working;
        state.commits += 1;
        Ok(())
    }
}
