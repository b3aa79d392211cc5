//! Core types shared by the schema, store, and builder layers.

/// RecordId: storage-assigned identifier of a record instance.
///
/// Two references with the same `RecordId` within a session are the same
/// record (object identity), not merely records with equal field values.
pub type RecordId = u64;

/// EntityName: declared name of an entity type (e.g. `Customer`).
pub type EntityName = String;

/// FieldName: name of a scalar attribute or relationship slot.
pub type FieldName = String;

/// FieldValues: scalar attribute values of one entity occurrence, keyed by field.
pub type FieldValues = std::collections::BTreeMap<FieldName, crate::document::Scalar>;
