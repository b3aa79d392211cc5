//! Record Store
//!
//! Records, the committed-storage backend contract, and the session that
//! stages new records on top of a backend. The materialization engine only
//! talks to [`StorageSession`]; backends are swappable (in-memory for tests
//! and dry runs, sled for on-disk stores).

pub mod memory;
pub mod persistence;
pub mod session;

pub use memory::MemoryBackend;
pub use persistence::SledBackend;
pub use session::{Session, StorageSession};

use crate::document::Scalar;
use crate::error::StorageError;
use crate::schema::EntityType;
use crate::types::{EntityName, FieldName, FieldValues, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a relationship slot on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    One(RecordId),
    Many(Vec<RecordId>),
}

/// Record: one instance of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: EntityName,
    pub fields: FieldValues,
    pub links: BTreeMap<FieldName, Link>,
}

impl Record {
    pub fn new(id: RecordId, entity: &str, fields: FieldValues) -> Self {
        Self {
            id,
            entity: entity.to_string(),
            fields,
            links: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    /// Target of a single-valued relationship slot.
    pub fn one(&self, relationship: &str) -> Option<RecordId> {
        match self.links.get(relationship) {
            Some(Link::One(id)) => Some(*id),
            _ => None,
        }
    }

    /// Members of a multi-valued relationship slot, in attachment order.
    pub fn many(&self, relationship: &str) -> &[RecordId] {
        match self.links.get(relationship) {
            Some(Link::Many(ids)) => ids,
            _ => &[],
        }
    }

    pub fn set_one(&mut self, relationship: &str, target: RecordId) {
        self.links
            .insert(relationship.to_string(), Link::One(target));
    }

    /// Append to a multi-valued slot in the given order. Repeated ids stay
    /// repeated; a collection holds one member per document occurrence.
    pub fn append_many(&mut self, relationship: &str, targets: &[RecordId]) {
        let slot = self
            .links
            .entry(relationship.to_string())
            .or_insert_with(|| Link::Many(Vec::new()));
        if let Link::One(existing) = *slot {
            *slot = Link::Many(vec![existing]);
        }
        if let Link::Many(ids) = slot {
            ids.extend_from_slice(targets);
        }
    }

    /// Value of a storage column: scalar field, surrogate id, or the id held
    /// by a single-valued foreign key.
    pub fn column(&self, entity: &EntityType, column: &str) -> Option<Scalar> {
        if entity.is_surrogate(column) {
            return i64::try_from(self.id).ok().map(Scalar::Int);
        }
        if let Some(rel) = entity.foreign_key_relationship(column) {
            return self
                .one(&rel.name)
                .and_then(|id| i64::try_from(id).ok())
                .map(Scalar::Int);
        }
        self.fields.get(column).cloned()
    }
}

/// Writes applied to a backend in one step.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub records: Vec<Record>,
    /// Unique index entries: digest of (entity, constraint values) -> record.
    pub unique: Vec<([u8; 32], RecordId)>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.unique.is_empty()
    }
}

/// Committed storage as seen by a session.
pub trait Backend {
    fn load(&self, id: RecordId) -> Result<Option<Record>, StorageError>;

    /// Exact-match lookup through the unique index.
    fn lookup_unique(&self, digest: &[u8; 32]) -> Result<Option<RecordId>, StorageError>;

    fn next_id(&mut self) -> Result<RecordId, StorageError>;

    fn apply(&mut self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Make applied writes durable.
    fn persist(&mut self) -> Result<(), StorageError>;

    /// All committed records of one entity type, ordered by id.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, StorageError>;
}
