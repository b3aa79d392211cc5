//! Identity Cache
//!
//! Operation-scoped map from (entity type, canonical key) to the in-flight
//! record created earlier in the same build. Storage cannot see these records
//! until they are flushed, so the cache is what makes repeated occurrences of
//! one entity inside a document resolve to a single record.

pub mod key;

pub use key::{candidate_keys, CandidateKey, CanonicalKey};

use crate::types::{EntityName, RecordId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// In-flight records keyed by (entity type, canonical candidate key).
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<(EntityName, CanonicalKey), RecordId>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str, key: &CanonicalKey) -> Option<RecordId> {
        // (String, CanonicalKey) does not borrow as (&str, &CanonicalKey)
        self.entries
            .get(&(entity.to_string(), key.clone()))
            .copied()
    }

    /// Register `id` under `key`. An existing registration is never
    /// overwritten; returns whether the entry was inserted.
    pub fn register(&mut self, entity: &str, key: CanonicalKey, id: RecordId) -> bool {
        match self.entries.entry((entity.to_string(), key)) {
            Entry::Occupied(existing) => {
                if *existing.get() != id {
                    tracing::debug!(
                        entity,
                        kept = *existing.get(),
                        ignored = id,
                        "Identity cache key already registered"
                    );
                }
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
