//! In-memory backend for tests and dry runs.

use super::{Backend, Record, WriteBatch};
use crate::error::StorageError;
use crate::types::RecordId;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: BTreeMap<RecordId, Record>,
    unique: HashMap<[u8; 32], RecordId>,
    last_id: RecordId,
    persisted: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of `persist` calls (commits) seen so far.
    pub fn persisted(&self) -> usize {
        self.persisted
    }
}

impl Backend for MemoryBackend {
    fn load(&self, id: RecordId) -> Result<Option<Record>, StorageError> {
        Ok(self.records.get(&id).cloned())
    }

    fn lookup_unique(&self, digest: &[u8; 32]) -> Result<Option<RecordId>, StorageError> {
        Ok(self.unique.get(digest).copied())
    }

    fn next_id(&mut self) -> Result<RecordId, StorageError> {
        self.last_id += 1;
        Ok(self.last_id)
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), StorageError> {
        for record in batch.records {
            self.records.insert(record.id, record);
        }
        self.unique.extend(batch.unique);
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        self.persisted += 1;
        Ok(())
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.entity == entity)
            .cloned()
            .collect())
    }
}
