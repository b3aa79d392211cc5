//! Tree Builder
//!
//! Walks a parsed document depth-first and materializes it into records.
//! Each mapping is one entity occurrence: its scalar attributes are collected
//! first and handed to the [`Resolver`], then every relationship present in
//! the mapping is built recursively and attached to the resolved record.

use crate::document::Node;
use crate::error::{BuildError, MalformedReason};
use crate::identity::IdentityCache;
use crate::resolver::{ConflictPolicy, Resolution, Resolver};
use crate::schema::{EntityType, Multiplicity, Relationship, SchemaIndex};
use crate::store::StorageSession;
use crate::types::{FieldValues, RecordId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Options for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub conflict_policy: ConflictPolicy,
}

/// Record(s) produced for one document node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Materialized {
    One(RecordId),
    Many(Vec<RecordId>),
}

impl Materialized {
    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Materialized::One(id) => vec![*id],
            Materialized::Many(ids) => ids.clone(),
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub entity: String,
    pub root: Materialized,
    pub created: usize,
    pub reused_committed: usize,
    pub reused_in_flight: usize,
}

/// Materializes documents against one schema.
pub struct TreeBuilder<'s> {
    schema: &'s SchemaIndex,
    options: BuildOptions,
}

impl<'s> TreeBuilder<'s> {
    pub fn new(schema: &'s SchemaIndex, options: BuildOptions) -> Self {
        Self { schema, options }
    }

    /// Build a document whose root holds a single occurrence and return the
    /// root record. Nothing is committed.
    pub fn build<S: StorageSession>(
        &self,
        session: &mut S,
        document: &Node,
    ) -> Result<RecordId, BuildError> {
        let (root_name, root_node) = split_root(document)?;
        let entity = self.schema.require(root_name, "document root")?;
        if let Node::Seq(_) = root_node {
            return Err(BuildError::malformed(
                entity.name(),
                None,
                MalformedReason::InvalidRoot,
            ));
        }
        let report = self.build_with_report(session, document)?;
        match report.root {
            Materialized::One(id) => Ok(id),
            Materialized::Many(_) => Err(BuildError::malformed(
                &report.entity,
                None,
                MalformedReason::InvalidRoot,
            )),
        }
    }

    /// Build a document and report what was created or reused. A root
    /// holding a sequence yields one record per element.
    pub fn build_with_report<S: StorageSession>(
        &self,
        session: &mut S,
        document: &Node,
    ) -> Result<BuildReport, BuildError> {
        let (root_name, root_node) = split_root(document)?;
        // Unknown root types fail before anything is staged.
        let entity = self.schema.require(root_name, "document root")?;

        session.no_autoflush(|session| {
            let mut cache = IdentityCache::new();
            let mut walk = Walk {
                schema: self.schema,
                resolver: Resolver::new(&mut cache, self.options.conflict_policy),
                counts: Counts::default(),
            };
            let root = walk.build_node(session, entity, root_node, None)?;
            let report = BuildReport {
                entity: entity.name().to_string(),
                root,
                created: walk.counts.created,
                reused_committed: walk.counts.committed,
                reused_in_flight: walk.counts.in_flight,
            };
            info!(
                entity = %report.entity,
                created = report.created,
                reused_committed = report.reused_committed,
                reused_in_flight = report.reused_in_flight,
                "Built document"
            );
            Ok(report)
        })
    }
}

/// The single `EntityType: body` entry at the top of a document.
fn split_root(document: &Node) -> Result<(&String, &Node), BuildError> {
    match document.as_map() {
        Some(map) if map.len() == 1 => map
            .iter()
            .next()
            .ok_or_else(|| BuildError::malformed("<document>", None, MalformedReason::InvalidRoot)),
        _ => Err(BuildError::malformed(
            "<document>",
            None,
            MalformedReason::InvalidRoot,
        )),
    }
}

/// Build `document` with default options.
pub fn build<S: StorageSession>(
    session: &mut S,
    schema: &SchemaIndex,
    document: &Node,
) -> Result<RecordId, BuildError> {
    TreeBuilder::new(schema, BuildOptions::default()).build(session, document)
}

#[derive(Debug, Default)]
struct Counts {
    created: usize,
    committed: usize,
    in_flight: usize,
}

struct Walk<'a, 'c> {
    schema: &'a SchemaIndex,
    resolver: Resolver<'c>,
    counts: Counts,
}

impl Walk<'_, '_> {
    /// `slot` names the relationship the node was found under, if any.
    fn build_node<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        node: &Node,
        slot: Option<&str>,
    ) -> Result<Materialized, BuildError> {
        match node {
            Node::Seq(items) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    if let Node::Seq(_) = item {
                        return Err(BuildError::malformed(
                            entity.name(),
                            slot,
                            MalformedReason::NestedSequence,
                        ));
                    }
                    ids.extend(self.build_node(session, entity, item, slot)?.ids());
                }
                Ok(Materialized::Many(ids))
            }
            Node::Null => Err(BuildError::malformed(
                entity.name(),
                slot,
                MalformedReason::NullNode,
            )),
            Node::Scalar(_) => Err(BuildError::malformed(
                entity.name(),
                slot,
                MalformedReason::ScalarForRecord,
            )),
            Node::Map(map) => self.build_record(session, entity, map).map(Materialized::One),
        }
    }

    fn build_record<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        map: &BTreeMap<String, Node>,
    ) -> Result<RecordId, BuildError> {
        let mut values = FieldValues::new();
        for field in entity.scalar_fields() {
            match map.get(field) {
                None | Some(Node::Null) => {}
                Some(Node::Scalar(value)) => {
                    values.insert(field.clone(), entity.kind(field).coerce(value.clone()));
                }
                Some(_) => {
                    return Err(BuildError::malformed(
                        entity.name(),
                        Some(field),
                        MalformedReason::NestedScalarValue,
                    ))
                }
            }
        }

        for key in map.keys() {
            if !entity.is_scalar(key) && entity.relationship(key).is_none() {
                debug!(entity = entity.name(), field = %key, "Ignored field");
            }
        }

        let resolution = self.resolver.resolve(session, entity, values)?;
        match resolution {
            Resolution::Created(_) => self.counts.created += 1,
            Resolution::Committed(_) => self.counts.committed += 1,
            Resolution::InFlight(_) => self.counts.in_flight += 1,
        }
        let id = resolution.id();

        for relationship in entity.relationships() {
            if let Some(child) = map.get(&relationship.name) {
                self.attach(session, entity, id, relationship, child)?;
            }
        }
        Ok(id)
    }

    fn attach<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        parent: RecordId,
        relationship: &Relationship,
        node: &Node,
    ) -> Result<(), BuildError> {
        let slot = relationship.name.as_str();
        // Multiplicity is checked before recursing so a mismatch stages nothing.
        match (relationship.multiplicity, node) {
            (Multiplicity::Single, Node::Seq(_)) => {
                return Err(BuildError::malformed(
                    entity.name(),
                    Some(slot),
                    MalformedReason::SequenceForSingle,
                ))
            }
            (Multiplicity::Many, Node::Map(_)) => {
                return Err(BuildError::malformed(
                    entity.name(),
                    Some(slot),
                    MalformedReason::ExpectedSequence,
                ))
            }
            _ => {}
        }

        let schema = self.schema;
        let target = schema.require(
            &relationship.target,
            &format!("relationship {}.{}", entity.name(), slot),
        )?;
        let built = self.build_node(session, target, node, Some(slot))?;

        match (relationship.multiplicity, built) {
            (Multiplicity::Single, Materialized::One(child)) => {
                session.record_mut(parent)?.set_one(slot, child);
            }
            (Multiplicity::Many, Materialized::Many(children)) => {
                session.record_mut(parent)?.append_many(slot, &children);
                self.back_populate(session, entity, parent, relationship, target, &children)?;
            }
            (Multiplicity::Single, Materialized::Many(_)) => {
                return Err(BuildError::malformed(
                    entity.name(),
                    Some(slot),
                    MalformedReason::SequenceForSingle,
                ))
            }
            (Multiplicity::Many, Materialized::One(_)) => {
                return Err(BuildError::malformed(
                    entity.name(),
                    Some(slot),
                    MalformedReason::ExpectedSequence,
                ))
            }
        }
        Ok(())
    }

    /// Point children back at `parent` when the collection's foreign key is
    /// also a single-valued relationship on the child.
    fn back_populate<S: StorageSession>(
        &mut self,
        session: &mut S,
        entity: &EntityType,
        parent: RecordId,
        relationship: &Relationship,
        target: &EntityType,
        children: &[RecordId],
    ) -> Result<(), BuildError> {
        let Some(fk) = relationship.foreign_key.as_deref() else {
            return Ok(());
        };
        let Some(back) = target.foreign_key_relationship(fk) else {
            return Ok(());
        };
        if back.target != entity.name() {
            return Ok(());
        }
        for child in children {
            if session.record(*child)?.one(&back.name).is_none() {
                session.record_mut(*child)?.set_one(&back.name, parent);
            }
        }
        Ok(())
    }
}
