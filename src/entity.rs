use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::EdlockError;

/// Identifies one stored entity: entity type plus primary key. Rendered
/// canonically as `type:primary_key` in files, reports and log lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub entity_type: CompactString,
    pub primary_key: CompactString,
}

impl EntityKey {
    pub fn new(
        entity_type: impl Into<CompactString>,
        primary_key: impl Into<CompactString>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Both components must be non-empty; anything else is a caller
    /// programming error.
    pub fn validate(&self) -> Result<(), EdlockError> {
        if self.entity_type.is_empty() {
            return Err(EdlockError::IllegalArgument(
                "entity key has an empty entity type".into(),
            ));
        }
        if self.primary_key.is_empty() {
            return Err(EdlockError::IllegalArgument(format!(
                "entity key for '{}' has an empty primary key",
                self.entity_type
            )));
        }
        Ok(())
    }

    /// Parses the canonical `type:primary_key` form.
    pub fn parse(raw: &str) -> Option<Self> {
        let (entity_type, primary_key) = raw.split_once(':')?;
        if entity_type.is_empty() || primary_key.is_empty() {
            return None;
        }
        Some(Self::new(entity_type, primary_key))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.primary_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(CompactString),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
    Null,
}

impl AttributeValue {
    /// Canonical string form used for snapshot comparison. `Null` stringifies
    /// to the empty string, so a missing attribute and an explicit `Null`
    /// compare equal.
    pub fn canonical_string(&self) -> String {
        match self {
            AttributeValue::Text(v) => v.to_string(),
            AttributeValue::Integer(v) => v.to_string(),
            AttributeValue::Float(v) => v.to_string(),
            AttributeValue::Boolean(v) => v.to_string(),
            AttributeValue::Timestamp(v) => v.to_string(),
            AttributeValue::Null => String::new(),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            AttributeValue::Null => 0,
            AttributeValue::Boolean(_) => 1,
            AttributeValue::Integer(_) => 2,
            AttributeValue::Timestamp(_) => 3,
            AttributeValue::Float(_) => 4,
            AttributeValue::Text(_) => 5,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AttributeValue {}

impl PartialOrd for AttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (AttributeValue::Null, AttributeValue::Null) => Ordering::Equal,
            (AttributeValue::Boolean(a), AttributeValue::Boolean(b)) => a.cmp(b),
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => a.cmp(b),
            (AttributeValue::Timestamp(a), AttributeValue::Timestamp(b)) => a.cmp(b),
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.total_cmp(b),
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// One named attribute of an entity as reported by the host persistence
/// layer. Reference-valued and transient attributes are excluded from
/// snapshots and conflict comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    pub name: CompactString,
    pub value: AttributeValue,
    pub reference: bool,
    pub transient: bool,
}

impl Attribute {
    pub fn new(name: impl Into<CompactString>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
            reference: false,
            transient: false,
        }
    }

    pub fn reference(name: impl Into<CompactString>, value: AttributeValue) -> Self {
        Self {
            reference: true,
            ..Self::new(name, value)
        }
    }

    pub fn transient(name: impl Into<CompactString>, value: AttributeValue) -> Self {
        Self {
            transient: true,
            ..Self::new(name, value)
        }
    }
}

/// A stored entity as seen by the lock subsystem.
pub trait Entity {
    fn key(&self) -> EntityKey;
    fn attributes(&self) -> Vec<Attribute>;
}

/// Loads the currently persisted state of an entity, bypassing any
/// transaction-local copies held by the caller.
pub trait EntityStore: Send + Sync {
    fn load(&self, key: &EntityKey) -> Result<Option<Box<dyn Entity>>, EdlockError>;
}

/// The caller's in-flight write transaction. Detaching removes an entity so
/// a subsequent load is served from persisted state; attaching restores it.
pub trait WriteTransaction: Send + Sync {
    fn detach(&self, key: &EntityKey);
    fn attach(&self, entity: &dyn Entity);
}
