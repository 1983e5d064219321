use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::entity::EntityKey;
use crate::error::EdlockError;
use crate::store::durable::{DurableLockRecord, DurableLockStore};

/// Process-local durable store for tests and single-process embeddings.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: Mutex<BTreeMap<EntityKey, DurableLockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableLockStore for MemoryLockStore {
    fn put(&self, record: DurableLockRecord) -> Result<(), EdlockError> {
        let mut records = self.records.lock();
        if let Some(existing) = records.get(&record.target)
            && existing.owner != record.owner
        {
            return Err(EdlockError::PessimisticConflict {
                lock: Box::new(existing.clone().into_lock()),
            });
        }
        records.insert(record.target.clone(), record);
        Ok(())
    }

    fn get(&self, target: &EntityKey) -> Result<Option<DurableLockRecord>, EdlockError> {
        Ok(self.records.lock().get(target).cloned())
    }

    fn remove(&self, target: &EntityKey, owner: Option<&str>) -> Result<bool, EdlockError> {
        let mut records = self.records.lock();
        match records.get(target) {
            Some(existing) if owner.is_none_or(|o| existing.owner == o) => {
                records.remove(target);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_owned_by(&self, owner: &str) -> Result<usize, EdlockError> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, record| record.owner != owner);
        Ok(before - records.len())
    }

    fn list(&self) -> Result<Vec<DurableLockRecord>, EdlockError> {
        Ok(self.records.lock().values().cloned().collect())
    }
}
