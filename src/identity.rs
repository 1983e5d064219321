use compact_str::CompactString;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::entity::EntityKey;
use crate::lock::Lock;

/// Session-local lock cache, one slot per target. The host injects an
/// implementation bound to the request's identity; it must never be shared
/// across actors, since the store trusts cached locks to belong to the
/// context's owner.
pub trait SessionCache: Send + Sync {
    fn get(&self, target: &EntityKey) -> Option<Lock>;
    fn put(&self, lock: Lock);
    fn remove(&self, target: &EntityKey) -> Option<Lock>;
    /// Drops every entry, returning how many were held.
    fn clear(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemorySessionCache {
    slots: Mutex<HashMap<EntityKey, Lock>>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for InMemorySessionCache {
    fn get(&self, target: &EntityKey) -> Option<Lock> {
        self.slots.lock().get(target).cloned()
    }

    fn put(&self, lock: Lock) {
        self.slots.lock().insert(lock.target.clone(), lock);
    }

    fn remove(&self, target: &EntityKey) -> Option<Lock> {
        self.slots.lock().remove(target)
    }

    fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let count = slots.len();
        slots.clear();
        count
    }
}

/// Identity of the acting user for one request: lock owner, editing session,
/// and the session's lock cache.
#[derive(Clone)]
pub struct IdentityContext {
    owner: CompactString,
    session_id: CompactString,
    cache: Arc<dyn SessionCache>,
}

impl IdentityContext {
    pub fn new(owner: impl Into<CompactString>, session_id: impl Into<CompactString>) -> Self {
        Self::with_cache(owner, session_id, Arc::new(InMemorySessionCache::new()))
    }

    pub fn with_cache(
        owner: impl Into<CompactString>,
        session_id: impl Into<CompactString>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            owner: owner.into(),
            session_id: session_id.into(),
            cache,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn cache(&self) -> &dyn SessionCache {
        self.cache.as_ref()
    }
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("owner", &self.owner)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}
