//! Entity Schema
//!
//! Statically declared entity-type descriptors and the index built from them.
//! Descriptors are plain serde data so a schema can live in a YAML, JSON, or
//! TOML file next to the documents it describes.

pub mod index;

pub use index::{EntityType, Multiplicity, Relationship, SchemaIndex, SchemaOptions};

use crate::document::Scalar;
use crate::error::SchemaError;
use crate::types::{EntityName, FieldName};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declared value kind of a field.
///
/// Kinds only drive coercion of textual values (so dates canonicalize stably);
/// storage is responsible for enforcing types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Any,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    #[serde(alias = "timestamp")]
    DateTime,
}

impl FieldKind {
    pub fn coerce(&self, value: Scalar) -> Scalar {
        match (self, value) {
            (FieldKind::Float, Scalar::Int(i)) => Scalar::Float(i as f64),
            (FieldKind::Date, Scalar::Text(s)) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(date) => Scalar::Date(date),
                Err(_) => Scalar::Text(s),
            },
            (FieldKind::DateTime, Scalar::Text(s)) => parse_datetime(&s).unwrap_or(Scalar::Text(s)),
            (_, value) => value,
        }
    }
}

fn parse_datetime(text: &str) -> Option<Scalar> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(Scalar::DateTime(dt));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Scalar::DateTime(naive.and_utc().fixed_offset()));
        }
    }
    None
}

/// A declared field (column) of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: FieldName,

    #[serde(default)]
    pub kind: FieldKind,

    /// Storage-generated identifier; never taken from documents.
    #[serde(default)]
    pub surrogate: bool,
}

/// A declared relationship slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub name: FieldName,

    /// Entity type name, or the target's storage name.
    pub target: String,

    #[serde(default)]
    pub many: bool,

    /// Column holding the reference. For single-valued slots it lives on the
    /// declaring entity, for multi-valued slots on the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<FieldName>,
}

/// Declaration of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: EntityName,

    /// Storage name; defaults to the snake_case form of `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    /// Uniqueness constraints, each a set of column names.
    #[serde(default)]
    pub unique: Vec<Vec<FieldName>>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            fields: Vec::new(),
            unique: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn field(self, name: &str) -> Self {
        self.typed_field(name, FieldKind::Any)
    }

    pub fn typed_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            surrogate: false,
        });
        self
    }

    pub fn surrogate(mut self, name: &str) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Integer,
            surrogate: true,
        });
        self
    }

    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.unique
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn one(self, name: &str, target: &str) -> Self {
        self.relationship(name, target, false, None)
    }

    pub fn one_via(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relationship(name, target, false, Some(foreign_key))
    }

    pub fn many(self, name: &str, target: &str) -> Self {
        self.relationship(name, target, true, None)
    }

    /// Multi-valued slot whose `foreign_key` column lives on the target.
    pub fn many_via(self, name: &str, target: &str, foreign_key: &str) -> Self {
        self.relationship(name, target, true, Some(foreign_key))
    }

    fn relationship(
        mut self,
        name: &str,
        target: &str,
        many: bool,
        foreign_key: Option<&str>,
    ) -> Self {
        self.relationships.push(RelationshipDescriptor {
            name: name.to_string(),
            target: target.to_string(),
            many,
            foreign_key: foreign_key.map(str::to_string),
        });
        self
    }

    /// Storage name of this entity type.
    pub fn storage_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| snake_case(&self.name))
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Top-level schema file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
}

/// Load entity descriptors from a YAML, JSON, or TOML file.
pub fn load_schema(path: &Path) -> Result<Vec<EntityDescriptor>, SchemaError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SchemaError::Parse(format!("failed to read {}: {}", path.display(), e))
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let parsed: SchemaFile = match extension.as_str() {
        "json" => serde_json::from_str(&content)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?,
        "toml" => toml::from_str(&content)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?,
        _ => serde_yaml::from_str(&content)
            .map_err(|e| SchemaError::Parse(format!("{}: {}", path.display(), e)))?,
    };
    tracing::debug!(
        path = %path.display(),
        entities = parsed.entities.len(),
        "Loaded schema"
    );
    Ok(parsed.entities)
}
