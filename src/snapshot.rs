use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::Entity;

/// Attribute values captured when an optimistic lock is acquired, keyed by
/// attribute name in canonical string form. Reference-valued and transient
/// attributes are never captured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySnapshot {
    pub attributes: BTreeMap<CompactString, String>,
}

/// First attribute found to differ between a snapshot and the current
/// persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub attribute: CompactString,
    pub baseline: String,
    pub current: String,
}

impl EntitySnapshot {
    pub fn capture(entity: &dyn Entity) -> Self {
        let mut attributes = BTreeMap::new();
        for attr in entity.attributes() {
            if attr.reference || attr.transient {
                continue;
            }
            attributes.insert(attr.name, attr.value.canonical_string());
        }
        Self { attributes }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Compares every snapshotted attribute against `current`. An attribute
    /// missing from `current` compares as `Null` (the empty string).
    pub fn first_divergence(&self, current: &EntitySnapshot) -> Option<Divergence> {
        for (name, baseline) in &self.attributes {
            let now = current.attributes.get(name).cloned().unwrap_or_default();
            if *baseline != now {
                return Some(Divergence {
                    attribute: name.clone(),
                    baseline: baseline.clone(),
                    current: now,
                });
            }
        }
        None
    }
}
