//! Candidate keys and their canonical form.

use crate::document::Scalar;
use crate::schema::EntityType;
use crate::types::{FieldName, FieldValues};
use std::fmt;

/// Order-independent, type-stable rendering of a set of field values.
///
/// Pairs are sorted by field name and each value is rendered with
/// [`Scalar::canonical_text`], so two semantically equal value sets always
/// produce the same key regardless of source map ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(Vec<(FieldName, String)>);

impl CanonicalKey {
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = (&'a FieldName, &'a Scalar)>,
    {
        let mut pairs: Vec<(FieldName, String)> = values
            .into_iter()
            .map(|(field, value)| (field.clone(), value.canonical_text()))
            .collect();
        pairs.sort();
        CanonicalKey(pairs)
    }

    pub fn pairs(&self) -> &[(FieldName, String)] {
        &self.0
    }

    /// Unambiguous serialization (JSON array of `[field, value]` pairs).
    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// Stable digest of this key scoped to an entity type.
    pub fn digest(&self, entity: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(entity.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.serialize().as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            // drop the type tag for display
            let shown = value.split_once(':').map(|(_, v)| v).unwrap_or(value);
            write!(f, "{}: {}", field, shown)?;
        }
        f.write_str("}")
    }
}

/// A node's values restricted to one fully satisfied uniqueness constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateKey {
    pub constraint: Vec<FieldName>,
    pub values: FieldValues,
    pub canonical: CanonicalKey,
}

/// Candidate keys of `values` for every constraint of `entity` whose columns
/// are all present among the supplied scalar values.
pub fn candidate_keys(entity: &EntityType, values: &FieldValues) -> Vec<CandidateKey> {
    entity
        .unique_constraints()
        .iter()
        .filter(|constraint| constraint.iter().all(|column| values.contains_key(column)))
        .map(|constraint| {
            let restricted: FieldValues = constraint
                .iter()
                .filter_map(|column| values.get(column).map(|v| (column.clone(), v.clone())))
                .collect();
            let canonical = CanonicalKey::from_values(restricted.iter());
            CandidateKey {
                constraint: constraint.clone(),
                values: restricted,
                canonical,
            }
        })
        .collect()
}
