use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::entity::EntityKey;
use crate::snapshot::EntitySnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Optimistic,
    Pessimistic,
}

impl LockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LockKind::Optimistic => "optimistic",
            LockKind::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lock claim. `snapshot` is present exactly for optimistic locks; the
/// coordinator constructs locks so that invariant holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lock {
    pub kind: LockKind,
    pub target: EntityKey,
    pub owner: CompactString,
    pub session_id: CompactString,
    pub created_at_micros: u64,
    pub snapshot: Option<EntitySnapshot>,
}

impl Lock {
    pub fn new(
        kind: LockKind,
        target: EntityKey,
        owner: impl Into<CompactString>,
        session_id: impl Into<CompactString>,
        snapshot: Option<EntitySnapshot>,
    ) -> Self {
        Self {
            kind,
            target,
            owner: owner.into(),
            session_id: session_id.into(),
            created_at_micros: now_micros(),
            snapshot,
        }
    }

    pub fn is_held_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
