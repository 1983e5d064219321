use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::error::EdlockError;
use crate::lock::{Lock, LockKind};

/// Durable form of a pessimistic lock. Optimistic locks never reach the
/// durable tier, so the kind is implicit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurableLockRecord {
    pub target: EntityKey,
    pub owner: CompactString,
    pub session_id: CompactString,
    pub created_at_micros: u64,
}

impl DurableLockRecord {
    pub fn from_lock(lock: &Lock) -> Self {
        Self {
            target: lock.target.clone(),
            owner: lock.owner.clone(),
            session_id: lock.session_id.clone(),
            created_at_micros: lock.created_at_micros,
        }
    }

    pub fn into_lock(self) -> Lock {
        Lock {
            kind: LockKind::Pessimistic,
            target: self.target,
            owner: self.owner,
            session_id: self.session_id,
            created_at_micros: self.created_at_micros,
            snapshot: None,
        }
    }
}

/// Cross-session store for pessimistic lock records. Writes commit on their
/// own, never as part of a caller transaction.
pub trait DurableLockStore: Send + Sync {
    /// Stores a record. Fails with a pessimistic conflict when the target is
    /// already held by a different owner; a record held by the same owner is
    /// replaced.
    fn put(&self, record: DurableLockRecord) -> Result<(), EdlockError>;

    fn get(&self, target: &EntityKey) -> Result<Option<DurableLockRecord>, EdlockError>;

    /// Removes the record for `target`. With `owner` set, only a record held
    /// by that owner is removed. Returns whether a record was dropped.
    fn remove(&self, target: &EntityKey, owner: Option<&str>) -> Result<bool, EdlockError>;

    /// Removes every record held by `owner`, returning how many were dropped.
    fn remove_owned_by(&self, owner: &str) -> Result<usize, EdlockError>;

    /// All records, ordered by target.
    fn list(&self) -> Result<Vec<DurableLockRecord>, EdlockError>;
}
