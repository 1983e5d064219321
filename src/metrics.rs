use std::sync::atomic::{AtomicU64, Ordering};

use crate::lock::LockKind;

/// Operation counters shared by the store and coordinator. Counters are
/// advisory and use relaxed ordering.
#[derive(Debug, Default)]
pub struct LockMetrics {
    optimistic_acquired: AtomicU64,
    pessimistic_acquired: AtomicU64,
    releases: AtomicU64,
    optimistic_conflicts: AtomicU64,
    pessimistic_conflicts: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockMetricsSnapshot {
    pub optimistic_acquired: u64,
    pub pessimistic_acquired: u64,
    /// Release operations that removed at least one lock.
    pub releases: u64,
    pub optimistic_conflicts: u64,
    pub pessimistic_conflicts: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl LockMetrics {
    pub(crate) fn record_acquired(&self, kind: LockKind) {
        match kind {
            LockKind::Optimistic => self.optimistic_acquired.fetch_add(1, Ordering::Relaxed),
            LockKind::Pessimistic => self.pessimistic_acquired.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_optimistic_conflict(&self) {
        self.optimistic_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pessimistic_conflict(&self) {
        self.pessimistic_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockMetricsSnapshot {
        LockMetricsSnapshot {
            optimistic_acquired: self.optimistic_acquired.load(Ordering::Relaxed),
            pessimistic_acquired: self.pessimistic_acquired.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            optimistic_conflicts: self.optimistic_conflicts.load(Ordering::Relaxed),
            pessimistic_conflicts: self.pessimistic_conflicts.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}
