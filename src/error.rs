//! Error types for the materialization engine and its front-end.

use crate::types::{EntityName, FieldName, RecordId};
use std::fmt;
use thiserror::Error;

/// Errors raised by the storage collaborator (session and backends).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("unique constraint ({fields}) violated for {entity}: {key}")]
    UniqueViolation {
        entity: EntityName,
        fields: String,
        key: String,
    },

    #[error("record {0} not found in session or backend")]
    UnknownRecord(RecordId),

    #[error("invalid storage state: {0}")]
    InvalidState(String),
}

/// Errors found while validating a set of entity-type descriptors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity type '{0}' is declared more than once")]
    DuplicateEntity(EntityName),

    #[error("entity type '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: EntityName, field: FieldName },

    #[error("relationship '{entity}.{relationship}' targets unknown entity type '{target}'")]
    UnknownTarget {
        entity: EntityName,
        relationship: FieldName,
        target: String,
    },

    #[error("unique constraint on '{entity}' names '{field}', which is not a scalar field")]
    InvalidConstraintField { entity: EntityName, field: FieldName },

    #[error("unique constraint on '{0}' lists no fields")]
    EmptyConstraint(EntityName),

    #[error("failed to parse schema: {0}")]
    Parse(String),
}

/// Why a document fragment could not be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// A node expected to hold record data was null or absent.
    NullNode,
    /// A single-valued relationship slot was given a sequence.
    SequenceForSingle,
    /// A multi-valued relationship slot was given a single occurrence.
    ExpectedSequence,
    /// A sequence element was itself a sequence.
    NestedSequence,
    /// A scalar appeared where a mapping (record data) was expected.
    ScalarForRecord,
    /// A scalar attribute was given a mapping or sequence.
    NestedScalarValue,
    /// The document root is not a mapping with exactly one key, or holds a
    /// sequence where a single root record was requested.
    InvalidRoot,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MalformedReason::NullNode => "record data is null",
            MalformedReason::SequenceForSingle => {
                "a sequence was given for a single-valued relationship"
            }
            MalformedReason::ExpectedSequence => {
                "a single occurrence was given for a multi-valued relationship"
            }
            MalformedReason::NestedSequence => "a sequence element was itself a sequence",
            MalformedReason::ScalarForRecord => "a scalar was given where record data was expected",
            MalformedReason::NestedScalarValue => "a nested value was given for a scalar attribute",
            MalformedReason::InvalidRoot => {
                "the root must be a mapping with exactly one key holding one occurrence"
            }
        };
        f.write_str(text)
    }
}

/// Coarse classification of build failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    MalformedDocument,
    Conflict,
    Storage,
}

/// Errors raised by a `build` invocation.
///
/// All variants abort the build immediately. Records staged before the failure
/// stay staged in the session; discarding them is the caller's decision.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown entity type '{name}' (referenced by {referenced_by})")]
    UnknownEntity {
        name: String,
        referenced_by: String,
    },

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("malformed document at {}: {reason}", location(.entity, .field.as_deref()))]
    Malformed {
        entity: EntityName,
        field: Option<FieldName>,
        reason: MalformedReason,
    },

    #[error("conflicting occurrences of {entity} {key}: field '{field}' differs")]
    Conflict {
        entity: EntityName,
        field: FieldName,
        key: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn location(entity: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{}.{}", entity, field),
        None => entity.to_string(),
    }
}

impl BuildError {
    pub(crate) fn malformed(
        entity: &str,
        field: Option<&str>,
        reason: MalformedReason,
    ) -> Self {
        BuildError::Malformed {
            entity: entity.to_string(),
            field: field.map(str::to_string),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::UnknownEntity { .. } | BuildError::Schema(_) => ErrorKind::Configuration,
            BuildError::Malformed { .. } => ErrorKind::MalformedDocument,
            BuildError::Conflict { .. } => ErrorKind::Conflict,
            BuildError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Front-end errors: CLI, configuration, logging, and file loading.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_entity_and_field() {
        let err = BuildError::malformed("Ticket", Some("customer"), MalformedReason::SequenceForSingle);
        let message = err.to_string();
        assert!(message.contains("Ticket.customer"), "{}", message);
        assert!(message.contains("single-valued"), "{}", message);
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    }

    #[test]
    fn schema_errors_classify_as_configuration() {
        let err: BuildError = SchemaError::DuplicateEntity("Ticket".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
