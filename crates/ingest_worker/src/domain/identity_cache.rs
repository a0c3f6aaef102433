use common::domain::{Digest, RowId, UNRESOLVED_ID};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Digest to row identifier map shared by the workers and the batch writer.
///
/// Readers share the lock; each mutation holds it exclusively. Entries are
/// only ever added after the transaction that produced them committed.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<Digest, RowId>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Digest, RowId>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Digest, RowId>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `id` under `digest`, replacing any previous value.
    /// The unresolved sentinel is never stored.
    pub fn add(&self, digest: Digest, id: RowId) {
        if id == UNRESOLVED_ID {
            return;
        }
        self.write().insert(digest, id);
    }

    /// Returns the cached identifier, or [`UNRESOLVED_ID`] on a miss
    pub fn get(&self, digest: &Digest) -> RowId {
        self.read().get(digest).copied().unwrap_or(UNRESOLVED_ID)
    }

    /// Calls `f` for every entry while holding the read lock.
    ///
    /// `f` must not touch this cache again; doing so can deadlock.
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&Digest, RowId),
    {
        for (digest, id) in self.read().iter() {
            f(digest, *id);
        }
    }

    /// Copies every entry into `target`
    pub fn merge_into(&self, target: &IdentityCache) {
        if std::ptr::eq(self, target) {
            return;
        }
        let mut entries = target.write();
        self.visit(|digest, id| {
            entries.insert(*digest, id);
        });
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
