//! Schema Index
//!
//! Resolves a descriptor set once into per-entity answers: scalar fields,
//! relationships with resolved targets, and uniqueness constraints. All
//! cross-references are validated up front so that configuration errors
//! surface before any record is touched.

use super::{EntityDescriptor, FieldKind};
use crate::error::{BuildError, SchemaError};
use crate::types::{EntityName, FieldName};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Options controlling which declared fields count as document data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Exclude every field whose name ends with this suffix from scalar
    /// attributes (e.g. `"id"` excludes `id` and `customer_id`).
    pub exclude_id_suffix: Option<String>,
}

/// Whether a relationship slot holds one record or an ordered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Many,
}

/// A relationship with its target resolved to an entity type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: FieldName,
    pub target: EntityName,
    pub multiplicity: Multiplicity,
    pub foreign_key: Option<FieldName>,
}

/// Indexed view of one entity type.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: EntityName,
    storage_name: String,
    scalar_fields: Vec<FieldName>,
    kinds: HashMap<FieldName, FieldKind>,
    surrogates: BTreeSet<FieldName>,
    relationships: BTreeMap<FieldName, Relationship>,
    /// Single-valued foreign key column -> relationship name.
    foreign_keys: BTreeMap<FieldName, FieldName>,
    unique: Vec<Vec<FieldName>>,
}

impl EntityType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Fields supplied by documents: declared fields that are neither
    /// surrogate identifiers nor foreign key columns, in declaration order.
    pub fn scalar_fields(&self) -> &[FieldName] {
        &self.scalar_fields
    }

    pub fn is_scalar(&self, field: &str) -> bool {
        self.scalar_fields.iter().any(|f| f == field)
    }

    pub fn kind(&self, field: &str) -> FieldKind {
        self.kinds.get(field).copied().unwrap_or_default()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    /// Uniqueness constraints, each sorted by column name.
    pub fn unique_constraints(&self) -> &[Vec<FieldName>] {
        &self.unique
    }

    pub fn is_surrogate(&self, column: &str) -> bool {
        self.surrogates.contains(column)
    }

    /// Relationship backing a single-valued foreign key column, if any.
    pub fn foreign_key_relationship(&self, column: &str) -> Option<&Relationship> {
        self.foreign_keys
            .get(column)
            .and_then(|rel| self.relationships.get(rel))
    }
}

/// Index over a validated descriptor set.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    entities: BTreeMap<EntityName, EntityType>,
}

impl SchemaIndex {
    /// Build the index, failing fast on any inconsistent declaration.
    pub fn new(
        descriptors: Vec<EntityDescriptor>,
        options: SchemaOptions,
    ) -> Result<Self, SchemaError> {
        let mut by_name: BTreeMap<EntityName, &EntityDescriptor> = BTreeMap::new();
        let mut by_storage: HashMap<String, EntityName> = HashMap::new();
        for descriptor in &descriptors {
            if by_name.insert(descriptor.name.clone(), descriptor).is_some() {
                return Err(SchemaError::DuplicateEntity(descriptor.name.clone()));
            }
            by_storage.insert(descriptor.storage_name(), descriptor.name.clone());
        }

        let resolve_target = |target: &str| -> Option<EntityName> {
            if by_name.contains_key(target) {
                Some(target.to_string())
            } else {
                by_storage.get(target).cloned()
            }
        };

        // Foreign keys of multi-valued slots live on the target entity.
        let mut inbound_keys: HashMap<EntityName, BTreeSet<FieldName>> = HashMap::new();
        let mut resolved: BTreeMap<EntityName, BTreeMap<FieldName, Relationship>> = BTreeMap::new();
        for descriptor in &descriptors {
            let mut relationships = BTreeMap::new();
            for rel in &descriptor.relationships {
                let target =
                    resolve_target(&rel.target).ok_or_else(|| SchemaError::UnknownTarget {
                        entity: descriptor.name.clone(),
                        relationship: rel.name.clone(),
                        target: rel.target.clone(),
                    })?;
                let multiplicity = if rel.many {
                    if let Some(fk) = &rel.foreign_key {
                        inbound_keys
                            .entry(target.clone())
                            .or_default()
                            .insert(fk.clone());
                    }
                    Multiplicity::Many
                } else {
                    Multiplicity::Single
                };
                relationships.insert(
                    rel.name.clone(),
                    Relationship {
                        name: rel.name.clone(),
                        target,
                        multiplicity,
                        foreign_key: rel.foreign_key.clone(),
                    },
                );
            }
            resolved.insert(descriptor.name.clone(), relationships);
        }

        let mut entities = BTreeMap::new();
        for descriptor in &descriptors {
            let relationships = resolved.remove(&descriptor.name).unwrap_or_default();
            let entity = index_entity(
                descriptor,
                relationships,
                inbound_keys.get(&descriptor.name),
                &options,
            )?;
            entities.insert(descriptor.name.clone(), entity);
        }

        tracing::debug!(entities = entities.len(), "Schema index built");
        Ok(Self { entities })
    }

    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.entities.get(name)
    }

    /// Look up an entity type, reporting where the name was referenced.
    pub fn require(&self, name: &str, referenced_by: &str) -> Result<&EntityType, BuildError> {
        self.entity(name).ok_or_else(|| BuildError::UnknownEntity {
            name: name.to_string(),
            referenced_by: referenced_by.to_string(),
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn index_entity(
    descriptor: &EntityDescriptor,
    relationships: BTreeMap<FieldName, Relationship>,
    inbound_keys: Option<&BTreeSet<FieldName>>,
    options: &SchemaOptions,
) -> Result<EntityType, SchemaError> {
    let mut declared = BTreeSet::new();
    for field in &descriptor.fields {
        if !declared.insert(field.name.clone()) {
            return Err(SchemaError::DuplicateField {
                entity: descriptor.name.clone(),
                field: field.name.clone(),
            });
        }
    }

    let foreign_keys: BTreeMap<FieldName, FieldName> = relationships
        .values()
        .filter(|rel| rel.multiplicity == Multiplicity::Single)
        .filter_map(|rel| rel.foreign_key.clone().map(|fk| (fk, rel.name.clone())))
        .collect();

    let surrogates: BTreeSet<FieldName> = descriptor
        .fields
        .iter()
        .filter(|f| f.surrogate)
        .map(|f| f.name.clone())
        .collect();

    let excluded_by_suffix = |name: &str| {
        options
            .exclude_id_suffix
            .as_deref()
            .map(|suffix| name.ends_with(suffix))
            .unwrap_or(false)
    };

    let scalar_fields: Vec<FieldName> = descriptor
        .fields
        .iter()
        .filter(|f| !f.surrogate)
        .filter(|f| !foreign_keys.contains_key(&f.name))
        .filter(|f| !inbound_keys.map(|keys| keys.contains(&f.name)).unwrap_or(false))
        .filter(|f| !relationships.contains_key(&f.name))
        .filter(|f| !excluded_by_suffix(&f.name))
        .map(|f| f.name.clone())
        .collect();

    let mut unique = Vec::with_capacity(descriptor.unique.len());
    for constraint in &descriptor.unique {
        if constraint.is_empty() {
            return Err(SchemaError::EmptyConstraint(descriptor.name.clone()));
        }
        let mut columns: Vec<FieldName> = constraint.clone();
        columns.sort();
        columns.dedup();
        for column in &columns {
            let known = declared.contains(column)
                || foreign_keys.contains_key(column)
                || inbound_keys.map(|keys| keys.contains(column)).unwrap_or(false);
            if !known {
                return Err(SchemaError::InvalidConstraintField {
                    entity: descriptor.name.clone(),
                    field: column.clone(),
                });
            }
        }
        unique.push(columns);
    }

    Ok(EntityType {
        name: descriptor.name.clone(),
        storage_name: descriptor.storage_name(),
        kinds: descriptor
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.kind))
            .collect(),
        scalar_fields,
        surrogates,
        relationships,
        foreign_keys,
        unique,
    })
}
