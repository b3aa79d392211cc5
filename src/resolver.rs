//! Resolver
//!
//! Decides, for one entity occurrence, whether to reuse a committed record,
//! reuse an in-flight record from the identity cache, or create and stage a
//! new one. Committed identity is checked first since storage is
//! authoritative; the cache is checked second since storage cannot see
//! siblings created earlier in the same build.

use crate::error::BuildError;
use crate::identity::{candidate_keys, CandidateKey, IdentityCache};
use crate::schema::EntityType;
use crate::store::{Record, StorageSession};
use crate::types::{FieldName, FieldValues, RecordId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do when a later occurrence matches an in-flight record by key but
/// carries different values for other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the first occurrence's values; later differing values are dropped.
    #[default]
    FirstWins,
    /// Later occurrences overwrite the in-flight record's values.
    LastWins,
    /// Differing values fail the build.
    Reject,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-wins" => Ok(ConflictPolicy::FirstWins),
            "last-wins" => Ok(ConflictPolicy::LastWins),
            "reject" => Ok(ConflictPolicy::Reject),
            other => Err(format!(
                "unknown conflict policy '{}' (expected first-wins, last-wins, or reject)",
                other
            )),
        }
    }
}

/// Outcome of resolving one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Matched a record already in storage.
    Committed(RecordId),
    /// Matched a record created earlier in this build.
    InFlight(RecordId),
    /// A new record was created and staged.
    Created(RecordId),
}

impl Resolution {
    pub fn id(&self) -> RecordId {
        match self {
            Resolution::Committed(id) | Resolution::InFlight(id) | Resolution::Created(id) => *id,
        }
    }
}

/// Resolves occurrences against storage and an identity cache.
pub struct Resolver<'c> {
    cache: &'c mut IdentityCache,
    policy: ConflictPolicy,
}

impl<'c> Resolver<'c> {
    pub fn new(cache: &'c mut IdentityCache, policy: ConflictPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn resolve<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        values: FieldValues,
    ) -> Result<Resolution, BuildError> {
        let keys = candidate_keys(entity, &values);

        for key in &keys {
            if let Some(id) = session.query_unique(entity, key)? {
                debug!(entity = entity.name(), key = %key.canonical, id, "Reused committed record");
                return Ok(Resolution::Committed(id));
            }
        }

        let cached = keys
            .iter()
            .find_map(|key| self.cache.get(entity.name(), &key.canonical).map(|id| (id, key)));
        if let Some((id, matched)) = cached {
            self.reconcile(session, entity, id, matched, &values)?;
            self.register_all(entity, &keys, id);
            debug!(entity = entity.name(), key = %matched.canonical, id, "Reused in-flight record");
            return Ok(Resolution::InFlight(id));
        }

        let id = session.allocate_id()?;
        session.stage(Record::new(id, entity.name(), values))?;
        self.register_all(entity, &keys, id);
        if keys.is_empty() {
            debug!(entity = entity.name(), id, "Created record without candidate key");
        } else {
            debug!(entity = entity.name(), id, keys = keys.len(), "Created record");
        }
        Ok(Resolution::Created(id))
    }

    fn register_all(&mut self, entity: &EntityType, keys: &[CandidateKey], id: RecordId) {
        for key in keys {
            self.cache
                .register(entity.name(), key.canonical.clone(), id);
        }
    }

    fn reconcile<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        id: RecordId,
        matched: &CandidateKey,
        values: &FieldValues,
    ) -> Result<(), BuildError> {
        let existing = session.record(id)?;
        let differing: Vec<FieldName> = values
            .iter()
            .filter(|(field, value)| {
                existing
                    .get(field)
                    .map(|current| current.canonical_text() != value.canonical_text())
                    .unwrap_or(true)
            })
            .map(|(field, _)| field.clone())
            .collect();
        if differing.is_empty() {
            return Ok(());
        }

        match self.policy {
            ConflictPolicy::FirstWins => {
                warn!(
                    entity = entity.name(),
                    key = %matched.canonical,
                    fields = ?differing,
                    "Dropped differing values of a repeated occurrence"
                );
            }
            ConflictPolicy::LastWins => {
                let record = session.record_mut(id)?;
                for field in &differing {
                    if let Some(value) = values.get(field) {
                        record.fields.insert(field.clone(), value.clone());
                    }
                }
            }
            ConflictPolicy::Reject => {
                return Err(BuildError::Conflict {
                    entity: entity.name().to_string(),
                    field: differing[0].clone(),
                    key: matched.canonical.to_string(),
                });
            }
        }
        Ok(())
    }
}
