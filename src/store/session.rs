//! Storage Session
//!
//! A unit of work over one backend. Holds an identity map of every record it
//! has loaded or created, stages new records without writing them, and writes
//! everything in one batch on flush. Queries flush pending writes first while
//! autoflush is enabled; the builder suspends autoflush for a whole build so
//! that uniqueness lookups never see half-wired siblings.

use super::{Backend, Record, WriteBatch};
use crate::error::StorageError;
use crate::identity::{CandidateKey, CanonicalKey};
use crate::schema::{EntityType, SchemaIndex};
use crate::types::{FieldValues, RecordId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Storage operations the materialization engine depends on.
pub trait StorageSession {
    /// Exact-match lookup of a committed record by a candidate key.
    fn query_unique(
        &mut self,
        entity: &EntityType,
        key: &CandidateKey,
    ) -> Result<Option<RecordId>, StorageError>;

    /// Reserve an id for a record about to be created.
    fn allocate_id(&mut self) -> Result<RecordId, StorageError>;

    /// Mark a newly created record for persistence. Nothing is written.
    fn stage(&mut self, record: Record) -> Result<(), StorageError>;

    fn record(&mut self, id: RecordId) -> Result<&Record, StorageError>;

    fn record_mut(&mut self, id: RecordId) -> Result<&mut Record, StorageError>;

    fn autoflush(&self) -> bool;

    fn set_autoflush(&mut self, enabled: bool);

    /// Run `f` with automatic pre-query flushing suspended.
    fn no_autoflush<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let previous = self.autoflush();
        self.set_autoflush(false);
        let result = f(self);
        self.set_autoflush(previous);
        result
    }
}

/// Session over a [`Backend`].
pub struct Session<B: Backend> {
    backend: B,
    schema: Arc<SchemaIndex>,
    identity_map: HashMap<RecordId, Record>,
    new: Vec<RecordId>,
    dirty: BTreeSet<RecordId>,
    autoflush: bool,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, schema: Arc<SchemaIndex>) -> Self {
        Self {
            backend,
            schema,
            identity_map: HashMap::new(),
            new: Vec::new(),
            dirty: BTreeSet::new(),
            autoflush: true,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaIndex> {
        &self.schema
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// A record already present in the identity map.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.identity_map.get(&id)
    }

    /// Ids of staged records not yet flushed, in creation order.
    pub fn pending(&self) -> &[RecordId] {
        &self.new
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.new.is_empty() || !self.dirty.is_empty()
    }

    /// Write staged and modified records to the backend.
    ///
    /// Unique constraints are checked against the backend index and within
    /// the batch; a violation fails the flush and leaves the session intact.
    pub fn flush(&mut self) -> Result<usize, StorageError> {
        if !self.has_pending_changes() {
            return Ok(0);
        }

        let mut order: Vec<RecordId> = self.new.clone();
        order.extend(self.dirty.iter().copied().filter(|id| !self.new.contains(id)));

        let mut batch = WriteBatch::default();
        let mut claimed: HashMap<[u8; 32], RecordId> = HashMap::new();
        for id in &order {
            let record = self
                .identity_map
                .get(id)
                .ok_or(StorageError::UnknownRecord(*id))?;
            for (digest, fields, key) in self.unique_entries(record)? {
                let existing = match claimed.get(&digest) {
                    Some(owner) => Some(*owner),
                    None => self.backend.lookup_unique(&digest)?,
                };
                if let Some(owner) = existing {
                    if owner != record.id {
                        tracing::debug!(
                            digest = %hex::encode(digest),
                            owner,
                            record = record.id,
                            "Unique index collision"
                        );
                        return Err(StorageError::UniqueViolation {
                            entity: record.entity.clone(),
                            fields,
                            key,
                        });
                    }
                }
                claimed.insert(digest, record.id);
            }
            batch.records.push(record.clone());
        }
        batch.unique = claimed.into_iter().collect();

        let written = batch.records.len();
        self.backend.apply(batch)?;
        self.new.clear();
        self.dirty.clear();
        tracing::debug!(records = written, "Session flushed");
        Ok(written)
    }

    /// Flush and make everything durable.
    pub fn commit(&mut self) -> Result<usize, StorageError> {
        let written = self.flush()?;
        self.backend.persist()?;
        tracing::info!(records = written, "Session committed");
        Ok(written)
    }

    /// Discard unflushed work: staged records are dropped and modified
    /// records are evicted so they reload from the backend.
    pub fn rollback(&mut self) {
        let discarded = self.new.len() + self.dirty.len();
        for id in self.new.drain(..) {
            self.identity_map.remove(&id);
        }
        for id in std::mem::take(&mut self.dirty) {
            self.identity_map.remove(&id);
        }
        tracing::debug!(records = discarded, "Session rolled back");
    }

    /// Committed records of an entity type.
    pub fn scan(&self, entity: &str) -> Result<Vec<Record>, StorageError> {
        self.backend.scan(entity)
    }

    fn unique_entries(
        &self,
        record: &Record,
    ) -> Result<Vec<([u8; 32], String, String)>, StorageError> {
        let entity = self.schema.entity(&record.entity).ok_or_else(|| {
            StorageError::InvalidState(format!(
                "record {} has unknown entity type '{}'",
                record.id, record.entity
            ))
        })?;
        let mut entries = Vec::new();
        for constraint in entity.unique_constraints() {
            let mut values = FieldValues::new();
            for column in constraint {
                if let Some(value) = record.column(entity, column) {
                    values.insert(column.clone(), value);
                }
            }
            // NULL in any column exempts the row, as in SQL
            if values.len() != constraint.len() {
                continue;
            }
            let key = CanonicalKey::from_values(values.iter());
            entries.push((
                key.digest(entity.name()),
                constraint.join(", "),
                key.to_string(),
            ));
        }
        Ok(entries)
    }

    fn ensure_loaded(&mut self, id: RecordId) -> Result<(), StorageError> {
        if !self.identity_map.contains_key(&id) {
            let record = self
                .backend
                .load(id)?
                .ok_or(StorageError::UnknownRecord(id))?;
            self.identity_map.insert(id, record);
        }
        Ok(())
    }
}

impl<B: Backend> StorageSession for Session<B> {
    fn query_unique(
        &mut self,
        entity: &EntityType,
        key: &CandidateKey,
    ) -> Result<Option<RecordId>, StorageError> {
        if self.autoflush {
            self.flush()?;
        }
        let digest = key.canonical.digest(entity.name());
        match self.backend.lookup_unique(&digest)? {
            Some(id) => {
                self.ensure_loaded(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    fn allocate_id(&mut self) -> Result<RecordId, StorageError> {
        self.backend.next_id()
    }

    fn stage(&mut self, record: Record) -> Result<(), StorageError> {
        if self.identity_map.contains_key(&record.id) {
            return Err(StorageError::InvalidState(format!(
                "record {} is already in the session",
                record.id
            )));
        }
        self.new.push(record.id);
        self.identity_map.insert(record.id, record);
        Ok(())
    }

    fn record(&mut self, id: RecordId) -> Result<&Record, StorageError> {
        self.ensure_loaded(id)?;
        self.identity_map
            .get(&id)
            .ok_or(StorageError::UnknownRecord(id))
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut Record, StorageError> {
        self.ensure_loaded(id)?;
        self.dirty.insert(id);
        self.identity_map
            .get_mut(&id)
            .ok_or(StorageError::UnknownRecord(id))
    }

    fn autoflush(&self) -> bool {
        self.autoflush
    }

    fn set_autoflush(&mut self, enabled: bool) {
        self.autoflush = enabled;
    }
}
