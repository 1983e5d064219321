use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::{DurabilityMode, EdlockConfig, validate_config};
use crate::entity::EntityKey;
use crate::error::EdlockError;
use crate::store::durable::{DurableLockRecord, DurableLockStore};

pub const LOCK_TABLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct LockTable {
    version: u32,
    locks: BTreeMap<String, DurableLockRecord>,
}

impl LockTable {
    fn empty() -> Self {
        Self {
            version: LOCK_TABLE_FORMAT_VERSION,
            locks: BTreeMap::new(),
        }
    }
}

/// Durable lock store backed by one JSON table file in a dedicated
/// directory. Writes go through a temp file and atomic rename, with the
/// previous table kept as a fallback copy. Read-modify-write cycles are
/// serialized by an in-process mutex plus an advisory flock on a sidecar
/// file, so separate processes sharing the directory stay consistent.
#[derive(Debug)]
pub struct FileLockStore {
    dir: PathBuf,
    primary: PathBuf,
    prev: PathBuf,
    flock: PathBuf,
    durability: DurabilityMode,
    table_lock: Mutex<()>,
}

impl FileLockStore {
    pub fn open(dir: &Path, config: &EdlockConfig) -> Result<Self, EdlockError> {
        validate_config(config)?;
        fs::create_dir_all(dir)?;
        let store = Self {
            dir: dir.to_path_buf(),
            primary: dir.join(&config.table_file),
            prev: dir.join(format!("{}.prev", config.table_file)),
            flock: dir.join(format!("{}.lock", config.table_file)),
            durability: config.durability_mode,
            table_lock: Mutex::new(()),
        };
        // Fail fast on an unreadable table rather than at first use.
        store.load_table()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn with_table<T>(
        &self,
        apply: impl FnOnce(&mut LockTable) -> Result<(T, bool), EdlockError>,
    ) -> Result<T, EdlockError> {
        let _guard = self.table_lock.lock();
        let _flock = FlockGuard::acquire(&self.flock)?;
        let mut table = self.load_table()?;
        let (out, dirty) = apply(&mut table)?;
        if dirty {
            self.write_table(&table)?;
        }
        Ok(out)
    }

    fn load_table(&self) -> Result<LockTable, EdlockError> {
        if !self.primary.exists() {
            return Ok(LockTable::empty());
        }
        match read_table(&self.primary) {
            Ok(table) => Ok(table),
            Err(primary_err) => {
                warn!(
                    path = %self.primary.display(),
                    error = %primary_err,
                    "lock table unreadable, trying previous copy"
                );
                if self.prev.exists() {
                    read_table(&self.prev)
                } else {
                    Err(primary_err)
                }
            }
        }
    }

    fn write_table(&self, table: &LockTable) -> Result<(), EdlockError> {
        let full = self.durability == DurabilityMode::Full;
        if self.primary.exists() {
            let data = fs::read(&self.primary)?;
            fs::write(&self.prev, data)?;
            if full {
                fsync_file(&self.prev)?;
            }
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        let bytes =
            serde_json::to_vec_pretty(table).map_err(|e| EdlockError::Encode(e.to_string()))?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        if full {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&self.primary)
            .map_err(|e| EdlockError::Io(e.error))?;
        if full {
            fsync_dir(&self.dir)?;
        }
        Ok(())
    }
}

impl DurableLockStore for FileLockStore {
    fn put(&self, record: DurableLockRecord) -> Result<(), EdlockError> {
        self.with_table(|table| {
            let key = record.target.to_string();
            if let Some(existing) = table.locks.get(&key)
                && existing.owner != record.owner
            {
                return Err(EdlockError::PessimisticConflict {
                    lock: Box::new(existing.clone().into_lock()),
                });
            }
            table.locks.insert(key, record);
            Ok(((), true))
        })
    }

    fn get(&self, target: &EntityKey) -> Result<Option<DurableLockRecord>, EdlockError> {
        // The atomic rename on write keeps reads self-consistent without the
        // flock.
        Ok(self.load_table()?.locks.get(&target.to_string()).cloned())
    }

    fn remove(&self, target: &EntityKey, owner: Option<&str>) -> Result<bool, EdlockError> {
        self.with_table(|table| {
            let key = target.to_string();
            match table.locks.get(&key) {
                Some(existing) if owner.is_none_or(|o| existing.owner == o) => {
                    table.locks.remove(&key);
                    Ok((true, true))
                }
                _ => Ok((false, false)),
            }
        })
    }

    fn remove_owned_by(&self, owner: &str) -> Result<usize, EdlockError> {
        self.with_table(|table| {
            let before = table.locks.len();
            table.locks.retain(|_, record| record.owner != owner);
            let removed = before - table.locks.len();
            Ok((removed, removed > 0))
        })
    }

    fn list(&self) -> Result<Vec<DurableLockRecord>, EdlockError> {
        Ok(self.load_table()?.locks.into_values().collect())
    }
}

fn read_table(path: &Path) -> Result<LockTable, EdlockError> {
    let bytes = fs::read(path)?;
    let table: LockTable =
        serde_json::from_slice(&bytes).map_err(|e| EdlockError::Decode(e.to_string()))?;
    if table.version != LOCK_TABLE_FORMAT_VERSION {
        return Err(EdlockError::Decode(format!(
            "unsupported lock table version: {}",
            table.version
        )));
    }
    Ok(table)
}

struct FlockGuard {
    file: File,
}

impl FlockGuard {
    fn acquire(path: &Path) -> Result<Self, EdlockError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for FlockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

fn fsync_file(path: &Path) -> Result<(), EdlockError> {
    let file = fs::OpenOptions::new().read(true).open(path)?;
    file.sync_all()?;
    Ok(())
}

fn fsync_dir(path: &Path) -> Result<(), EdlockError> {
    let dir = fs::File::open(path)?;
    dir.sync_all()?;
    Ok(())
}
