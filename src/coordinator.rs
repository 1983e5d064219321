use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{EdlockConfig, validate_config};
use crate::entity::{Entity, EntityKey, EntityStore, WriteTransaction};
use crate::error::EdlockError;
use crate::identity::IdentityContext;
use crate::lock::{Lock, LockKind};
use crate::snapshot::EntitySnapshot;
use crate::store::LockStore;

/// Locking strategy seam. `StoreCoordinator` enforces the real rules;
/// `NoopCoordinator` switches coordination off for embeddings that do not
/// need it. The implementation is chosen where the stack is composed, never
/// probed at call sites.
pub trait LockCoordinator: Send + Sync {
    /// Claims `target` for the current actor. Optimistic claims carry a
    /// baseline snapshot; when none is supplied it is captured from the
    /// currently persisted state.
    fn acquire_lock(
        &self,
        target: &EntityKey,
        kind: LockKind,
        snapshot: Option<EntitySnapshot>,
    ) -> Result<(), EdlockError>;

    /// Drops the caller's lock on `target`, optionally only of one kind.
    /// Idempotent; returns whether anything was dropped.
    fn release_lock(
        &self,
        target: &EntityKey,
        kind: Option<LockKind>,
    ) -> Result<bool, EdlockError>;

    /// Drops every lock on `target` regardless of owner. For the path where
    /// the entity itself was deleted.
    fn release_locks(&self, target: &EntityKey) -> Result<bool, EdlockError>;

    /// Drops everything the current actor holds, returning entries dropped.
    fn release_all_locks(&self) -> Result<usize, EdlockError>;

    /// The lock currently covering `target`, if any.
    fn lock(&self, target: &EntityKey) -> Result<Option<Lock>, EdlockError>;

    /// Gate before persisting `entity`. Fails fast with a typed conflict when
    /// someone else holds the target exclusively or the optimistic baseline
    /// no longer matches persisted state.
    fn check_before_write(&self, entity: &dyn Entity) -> Result<(), EdlockError>;

    /// After a successful write, refreshes the optimistic baseline to the
    /// just-written state so later writes in the same session stay clean.
    fn update_lock(&self, entity: &dyn Entity) -> Result<(), EdlockError>;
}

/// The real coordinator. A cheap per-request value: shared guts arrive as
/// `Arc`s, the identity context carries the caller and their session cache.
pub struct StoreCoordinator {
    store: LockStore,
    entities: Arc<dyn EntityStore>,
    tx: Arc<dyn WriteTransaction>,
    ctx: IdentityContext,
    config: EdlockConfig,
}

impl StoreCoordinator {
    pub fn new(
        store: LockStore,
        entities: Arc<dyn EntityStore>,
        tx: Arc<dyn WriteTransaction>,
        ctx: IdentityContext,
    ) -> Self {
        Self {
            store,
            entities,
            tx,
            ctx,
            config: EdlockConfig::default(),
        }
    }

    pub fn with_config(
        store: LockStore,
        entities: Arc<dyn EntityStore>,
        tx: Arc<dyn WriteTransaction>,
        ctx: IdentityContext,
        config: EdlockConfig,
    ) -> Result<Self, EdlockError> {
        validate_config(&config)?;
        Ok(Self {
            store,
            entities,
            tx,
            ctx,
            config,
        })
    }

    pub fn context(&self) -> &IdentityContext {
        &self.ctx
    }

    pub fn store(&self) -> &LockStore {
        &self.store
    }

    fn try_acquire(
        &self,
        target: &EntityKey,
        kind: LockKind,
        snapshot: Option<EntitySnapshot>,
    ) -> Result<(), EdlockError> {
        target.validate()?;
        let snapshot = match kind {
            // An exclusive hold needs no baseline.
            LockKind::Pessimistic => None,
            LockKind::Optimistic => Some(match snapshot {
                Some(given) => {
                    self.ensure_snapshot_size(&given)?;
                    given
                }
                None => self.capture_current(target)?,
            }),
        };

        if let Some(existing) = self.store.get(&self.ctx, target)?
            && existing.kind == LockKind::Pessimistic
        {
            if !existing.is_held_by(self.ctx.owner()) {
                return Err(EdlockError::PessimisticConflict {
                    lock: Box::new(existing),
                });
            }
            if kind == LockKind::Optimistic {
                // The exclusive hold already covers this target.
                debug!(key = %target, "optimistic claim subsumed by held exclusive lock");
                return Ok(());
            }
        }

        let lock = Lock::new(
            kind,
            target.clone(),
            self.ctx.owner(),
            self.ctx.session_id(),
            snapshot,
        );
        self.store.put(&self.ctx, lock)?;
        debug!(key = %target, kind = %kind, "lock acquired");
        Ok(())
    }

    fn try_check(&self, entity: &dyn Entity) -> Result<(), EdlockError> {
        let target = entity.key();
        let Some(held) = self.store.get(&self.ctx, &target)? else {
            return Ok(());
        };
        match held.kind {
            LockKind::Pessimistic => {
                if held.is_held_by(self.ctx.owner()) {
                    Ok(())
                } else {
                    Err(EdlockError::PessimisticConflict {
                        lock: Box::new(held),
                    })
                }
            }
            LockKind::Optimistic => {
                let baseline = held.snapshot.unwrap_or_default();
                // The fresh load must come from persisted state, not be
                // satisfied by the caller's in-flight transaction.
                self.tx.detach(&target);
                let Some(fresh) = self.entities.load(&target)? else {
                    return Err(EdlockError::OptimisticConflict { current: None });
                };
                let current = EntitySnapshot::capture(fresh.as_ref());
                if let Some(divergence) = baseline.first_divergence(&current) {
                    debug!(
                        key = %target,
                        attribute = %divergence.attribute,
                        "optimistic baseline diverged"
                    );
                    return Err(EdlockError::OptimisticConflict {
                        current: Some(Box::new(current)),
                    });
                }
                // Re-attach only once the write is known to be safe.
                self.tx.attach(entity);
                Ok(())
            }
        }
    }

    fn capture_current(&self, target: &EntityKey) -> Result<EntitySnapshot, EdlockError> {
        let entity = self.entities.load(target)?.ok_or_else(|| {
            EdlockError::IllegalArgument(format!("cannot snapshot missing entity '{target}'"))
        })?;
        let snapshot = EntitySnapshot::capture(entity.as_ref());
        self.ensure_snapshot_size(&snapshot)?;
        Ok(snapshot)
    }

    fn ensure_snapshot_size(&self, snapshot: &EntitySnapshot) -> Result<(), EdlockError> {
        if snapshot.len() > self.config.max_snapshot_attributes {
            return Err(EdlockError::IllegalArgument(format!(
                "snapshot holds {} attributes, limit is {}",
                snapshot.len(),
                self.config.max_snapshot_attributes
            )));
        }
        Ok(())
    }

    fn record_conflict<T>(&self, result: Result<T, EdlockError>) -> Result<T, EdlockError> {
        match &result {
            Err(EdlockError::PessimisticConflict { lock }) => {
                self.store.metrics().record_pessimistic_conflict();
                warn!(key = %lock.target, holder = %lock.owner, "pessimistic lock conflict");
            }
            Err(EdlockError::OptimisticConflict { current }) => {
                self.store.metrics().record_optimistic_conflict();
                warn!(deleted = current.is_none(), "optimistic lock conflict");
            }
            _ => {}
        }
        result
    }
}

impl LockCoordinator for StoreCoordinator {
    fn acquire_lock(
        &self,
        target: &EntityKey,
        kind: LockKind,
        snapshot: Option<EntitySnapshot>,
    ) -> Result<(), EdlockError> {
        let result = self.try_acquire(target, kind, snapshot);
        self.record_conflict(result)
    }

    fn release_lock(
        &self,
        target: &EntityKey,
        kind: Option<LockKind>,
    ) -> Result<bool, EdlockError> {
        let removed = self.store.remove(&self.ctx, target, kind)?;
        if removed {
            debug!(key = %target, "lock released");
        }
        Ok(removed)
    }

    fn release_locks(&self, target: &EntityKey) -> Result<bool, EdlockError> {
        let removed = self.store.purge_target(&self.ctx, target)?;
        if removed {
            debug!(key = %target, "all locks on target released");
        }
        Ok(removed)
    }

    fn release_all_locks(&self) -> Result<usize, EdlockError> {
        let dropped = self.store.remove_owned_by(&self.ctx)?;
        debug!(owner = self.ctx.owner(), dropped, "released all held locks");
        Ok(dropped)
    }

    fn lock(&self, target: &EntityKey) -> Result<Option<Lock>, EdlockError> {
        self.store.get(&self.ctx, target)
    }

    fn check_before_write(&self, entity: &dyn Entity) -> Result<(), EdlockError> {
        let result = self.try_check(entity);
        self.record_conflict(result)
    }

    fn update_lock(&self, entity: &dyn Entity) -> Result<(), EdlockError> {
        let target = entity.key();
        let Some(held) = self.store.get(&self.ctx, &target)? else {
            return Ok(());
        };
        if held.kind != LockKind::Optimistic {
            return Ok(());
        }
        let snapshot = EntitySnapshot::capture(entity);
        self.ensure_snapshot_size(&snapshot)?;
        let refreshed = Lock {
            snapshot: Some(snapshot),
            ..held
        };
        self.store.refresh(&self.ctx, refreshed);
        debug!(key = %target, "optimistic baseline refreshed");
        Ok(())
    }
}

/// Coordinator that never locks and never conflicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCoordinator;

impl LockCoordinator for NoopCoordinator {
    fn acquire_lock(
        &self,
        _target: &EntityKey,
        _kind: LockKind,
        _snapshot: Option<EntitySnapshot>,
    ) -> Result<(), EdlockError> {
        Ok(())
    }

    fn release_lock(
        &self,
        _target: &EntityKey,
        _kind: Option<LockKind>,
    ) -> Result<bool, EdlockError> {
        Ok(false)
    }

    fn release_locks(&self, _target: &EntityKey) -> Result<bool, EdlockError> {
        Ok(false)
    }

    fn release_all_locks(&self) -> Result<usize, EdlockError> {
        Ok(0)
    }

    fn lock(&self, _target: &EntityKey) -> Result<Option<Lock>, EdlockError> {
        Ok(None)
    }

    fn check_before_write(&self, _entity: &dyn Entity) -> Result<(), EdlockError> {
        Ok(())
    }

    fn update_lock(&self, _entity: &dyn Entity) -> Result<(), EdlockError> {
        Ok(())
    }
}
