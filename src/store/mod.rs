pub mod durable;
pub mod file;
pub mod memory;

use std::sync::Arc;

use crate::entity::EntityKey;
use crate::error::EdlockError;
use crate::identity::IdentityContext;
use crate::lock::{Lock, LockKind};
use crate::metrics::LockMetrics;
use crate::store::durable::{DurableLockRecord, DurableLockStore};

/// Two-tier lock store. Optimistic locks live only in the caller's session
/// cache; pessimistic locks are additionally written to the durable tier so
/// other sessions and processes observe them. The session cache never holds a
/// lock owned by someone else.
#[derive(Clone)]
pub struct LockStore {
    durable: Arc<dyn DurableLockStore>,
    metrics: Arc<LockMetrics>,
}

impl LockStore {
    pub fn new(durable: Arc<dyn DurableLockStore>) -> Self {
        Self {
            durable,
            metrics: Arc::new(LockMetrics::default()),
        }
    }

    pub fn metrics(&self) -> &LockMetrics {
        &self.metrics
    }

    /// Stores `lock` for the calling session. A pessimistic lock is committed
    /// to the durable tier first; if another owner already holds the target
    /// the conflict propagates and the cache stays untouched.
    pub fn put(&self, ctx: &IdentityContext, lock: Lock) -> Result<(), EdlockError> {
        if lock.kind == LockKind::Pessimistic {
            self.durable.put(DurableLockRecord::from_lock(&lock))?;
        }
        let kind = lock.kind;
        ctx.cache().put(lock);
        self.metrics.record_acquired(kind);
        Ok(())
    }

    /// Looks up the lock on `target`, session cache first. A durable record
    /// held by the caller is cached on the way out; a foreign record is
    /// returned but never cached.
    pub fn get(
        &self,
        ctx: &IdentityContext,
        target: &EntityKey,
    ) -> Result<Option<Lock>, EdlockError> {
        if let Some(cached) = ctx.cache().get(target) {
            // Optimistic locks never leave the session, so the cached copy
            // is authoritative. An exclusive hold can be destroyed underneath
            // the session by `purge_target`; the cached copy is trusted only
            // while the durable record still backs it.
            let backed = cached.kind == LockKind::Optimistic
                || self
                    .durable
                    .get(target)?
                    .is_some_and(|record| record.owner == cached.owner);
            if backed {
                self.metrics.record_cache_hit();
                return Ok(Some(cached));
            }
            ctx.cache().remove(target);
        }
        self.metrics.record_cache_miss();
        let Some(record) = self.durable.get(target)? else {
            return Ok(None);
        };
        let lock = record.into_lock();
        if lock.is_held_by(ctx.owner()) {
            ctx.cache().put(lock.clone());
        }
        Ok(Some(lock))
    }

    /// Replaces the cached lock for its target. Used when a write refreshes
    /// an optimistic snapshot; does not count as a new acquisition.
    pub(crate) fn refresh(&self, ctx: &IdentityContext, lock: Lock) {
        ctx.cache().put(lock);
    }

    /// Drops the caller's lock on `target`. With `kind` set, only a lock of
    /// that kind is dropped. The durable tier is touched only when the kind
    /// filter admits pessimistic locks, and only records held by the caller
    /// are removed.
    pub fn remove(
        &self,
        ctx: &IdentityContext,
        target: &EntityKey,
        kind: Option<LockKind>,
    ) -> Result<bool, EdlockError> {
        let mut removed = false;
        if let Some(cached) = ctx.cache().get(target)
            && kind.is_none_or(|k| cached.kind == k)
        {
            ctx.cache().remove(target);
            removed = true;
        }
        if matches!(kind, None | Some(LockKind::Pessimistic)) {
            removed |= self.durable.remove(target, Some(ctx.owner()))?;
        }
        if removed {
            self.metrics.record_release();
        }
        Ok(removed)
    }

    /// Drops every lock on `target` regardless of owner. Reserved for the
    /// path where the entity itself was deleted and any lock on it is moot.
    /// Copies held in other sessions' caches die on their next `get`, which
    /// revalidates exclusive holds against the durable tier.
    pub fn purge_target(
        &self,
        ctx: &IdentityContext,
        target: &EntityKey,
    ) -> Result<bool, EdlockError> {
        let mut removed = ctx.cache().remove(target).is_some();
        removed |= self.durable.remove(target, None)?;
        if removed {
            self.metrics.record_release();
        }
        Ok(removed)
    }

    /// Drops everything the calling owner holds: the whole session cache plus
    /// the owner's durable records. Returns entries dropped across both
    /// tiers, so a pessimistic lock present in both counts twice.
    pub fn remove_owned_by(&self, ctx: &IdentityContext) -> Result<usize, EdlockError> {
        let cleared = ctx.cache().clear();
        let removed = self.durable.remove_owned_by(ctx.owner())?;
        let dropped = cleared + removed;
        if dropped > 0 {
            self.metrics.record_release();
        }
        Ok(dropped)
    }
}
