//! Sled-backed record storage.
//!
//! Two trees: `records` maps big-endian record ids to bincode-encoded
//! [`Record`]s, `unique` maps unique-index digests to record ids. Batches are
//! applied in a single transaction across both trees.

use super::{Backend, Record, WriteBatch};
use crate::error::StorageError;
use crate::types::RecordId;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;

pub struct SledBackend {
    db: sled::Db,
    records: sled::Tree,
    unique: sled::Tree,
}

impl SledBackend {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Temporary store removed on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let records = db.open_tree("records")?;
        let unique = db.open_tree("unique")?;
        Ok(Self {
            db,
            records,
            unique,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn decode_id(bytes: &[u8]) -> Result<RecordId, StorageError> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        StorageError::InvalidState(format!("record id has {} bytes, expected 8", bytes.len()))
    })?;
    Ok(RecordId::from_be_bytes(array))
}

impl Backend for SledBackend {
    fn load(&self, id: RecordId) -> Result<Option<Record>, StorageError> {
        match self.records.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn lookup_unique(&self, digest: &[u8; 32]) -> Result<Option<RecordId>, StorageError> {
        match self.unique.get(digest)? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn next_id(&mut self) -> Result<RecordId, StorageError> {
        // sled ids start at 0; keep 0 free
        Ok(self.db.generate_id()? + 1)
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut encoded = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            encoded.push((record.id.to_be_bytes(), bincode::serialize(record)?));
        }

        let result = (&self.records, &self.unique).transaction(|(records, unique)| {
            for (key, value) in &encoded {
                records.insert(&key[..], value.as_slice())?;
            }
            for (digest, id) in &batch.unique {
                unique.insert(&digest[..], &id.to_be_bytes()[..])?;
            }
            Ok::<(), ConflictableTransactionError<()>>(())
        });

        result.map_err(|e| match e {
            TransactionError::Storage(err) => StorageError::Sled(err),
            TransactionError::Abort(()) => {
                StorageError::InvalidState("record batch transaction aborted".to_string())
            }
        })?;

        tracing::debug!(
            records = batch.records.len(),
            unique = batch.unique.len(),
            "Applied record batch"
        );
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn scan(&self, entity: &str) -> Result<Vec<Record>, StorageError> {
        let mut out = Vec::new();
        for item in self.records.iter() {
            let (_, bytes) = item?;
            let record: Record = bincode::deserialize(&bytes)?;
            if record.entity == entity {
                out.push(record);
            }
        }
        Ok(out)
    }
}
