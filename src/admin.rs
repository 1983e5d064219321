//! Offline administration of a durable lock directory. Locks never expire on
//! their own, so clearing leftovers from a crashed process is an explicit,
//! out-of-band operation against the closed directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::EdlockConfig;
use crate::entity::EntityKey;
use crate::error::EdlockError;
use crate::store::durable::DurableLockStore;
use crate::store::file::FileLockStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockEntryReport {
    pub target: String,
    pub owner: String,
    pub session_id: String,
    pub created_at_micros: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockTableReport {
    pub entries: Vec<LockEntryReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearReport {
    pub removed: usize,
}

/// Every durable lock record in the directory, ordered by target.
pub fn list_locks(
    lock_dir: &Path,
    config: &EdlockConfig,
) -> Result<LockTableReport, EdlockError> {
    let store = FileLockStore::open(lock_dir, config)?;
    let entries = store
        .list()?
        .into_iter()
        .map(|record| LockEntryReport {
            target: record.target.to_string(),
            owner: record.owner.into(),
            session_id: record.session_id.into(),
            created_at_micros: record.created_at_micros,
        })
        .collect();
    Ok(LockTableReport { entries })
}

/// Removes the record on `target` regardless of owner.
pub fn clear_target(
    lock_dir: &Path,
    config: &EdlockConfig,
    target: &EntityKey,
) -> Result<ClearReport, EdlockError> {
    let store = FileLockStore::open(lock_dir, config)?;
    let removed = usize::from(store.remove(target, None)?);
    Ok(ClearReport { removed })
}

/// Removes every record held by `owner`.
pub fn clear_owner(
    lock_dir: &Path,
    config: &EdlockConfig,
    owner: &str,
) -> Result<ClearReport, EdlockError> {
    let store = FileLockStore::open(lock_dir, config)?;
    let removed = store.remove_owned_by(owner)?;
    Ok(ClearReport { removed })
}

/// Empties the lock table.
pub fn clear_all(lock_dir: &Path, config: &EdlockConfig) -> Result<ClearReport, EdlockError> {
    let store = FileLockStore::open(lock_dir, config)?;
    let mut removed = 0;
    for record in store.list()? {
        if store.remove(&record.target, None)? {
            removed += 1;
        }
    }
    Ok(ClearReport { removed })
}

#[cfg(test)]
mod tests {
    use super::{clear_all, clear_owner, clear_target, list_locks};
    use crate::config::EdlockConfig;
    use crate::entity::EntityKey;
    use crate::lock::now_micros;
    use crate::store::durable::{DurableLockRecord, DurableLockStore};
    use crate::store::file::FileLockStore;
    use tempfile::tempdir;

    fn seed(dir: &std::path::Path, config: &EdlockConfig) {
        let store = FileLockStore::open(dir, config).expect("open");
        for (pk, owner) in [("1", "alice"), ("2", "alice"), ("3", "bob")] {
            store
                .put(DurableLockRecord {
                    target: EntityKey::new("indicator", pk),
                    owner: owner.into(),
                    session_id: format!("session-{owner}").into(),
                    created_at_micros: now_micros(),
                })
                .expect("seed");
        }
    }

    #[test]
    fn list_reports_every_record_in_target_order() {
        let dir = tempdir().expect("temp");
        let config = EdlockConfig::default();
        seed(dir.path(), &config);

        let report = list_locks(dir.path(), &config).expect("list");
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.entries[0].target, "indicator:1");
        assert_eq!(report.entries[2].owner, "bob");
    }

    #[test]
    fn clear_target_ignores_ownership() {
        let dir = tempdir().expect("temp");
        let config = EdlockConfig::default();
        seed(dir.path(), &config);

        let report =
            clear_target(dir.path(), &config, &EntityKey::new("indicator", "3")).expect("clear");
        assert_eq!(report.removed, 1);

        let report =
            clear_target(dir.path(), &config, &EntityKey::new("indicator", "3")).expect("again");
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn clear_owner_scopes_to_one_owner() {
        let dir = tempdir().expect("temp");
        let config = EdlockConfig::default();
        seed(dir.path(), &config);

        let report = clear_owner(dir.path(), &config, "alice").expect("clear");
        assert_eq!(report.removed, 2);
        let remaining = list_locks(dir.path(), &config).expect("list");
        assert_eq!(remaining.entries.len(), 1);
        assert_eq!(remaining.entries[0].owner, "bob");
    }

    #[test]
    fn clear_all_empties_the_table() {
        let dir = tempdir().expect("temp");
        let config = EdlockConfig::default();
        seed(dir.path(), &config);

        let report = clear_all(dir.path(), &config).expect("clear");
        assert_eq!(report.removed, 3);
        assert!(list_locks(dir.path(), &config).expect("list").entries.is_empty());
    }
}
