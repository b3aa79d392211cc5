//! Document Nodes
//!
//! The parsed, schema-agnostic shape of a source document: mappings of field
//! name to value, sequences of mappings, and scalars. YAML and JSON parsers
//! produce their own value trees; both are converted into [`Node`] before the
//! builder sees them.

use crate::error::ApiError;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// A scalar document value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Scalar {
    /// Stable textual form used for identity comparison.
    ///
    /// Text is NFC-normalized. Dates and timestamps render as text (timestamps
    /// in UTC) so that a date and its ISO string compare equal.
    pub fn canonical_text(&self) -> String {
        match self {
            Scalar::Bool(b) => format!("b:{}", b),
            Scalar::Int(i) => format!("i:{}", i),
            Scalar::Float(f) => format!("f:{}", f),
            Scalar::Text(s) => format!("s:{}", s.nfc().collect::<String>()),
            Scalar::Date(d) => format!("s:{}", d.format("%Y-%m-%d")),
            Scalar::DateTime(dt) => format!(
                "s:{}",
                dt.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Scalar::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

/// A node in a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Scalar(Scalar),
    Map(BTreeMap<String, Node>),
    Seq(Vec<Node>),
}

impl Node {
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Parse YAML text into a document node.
    pub fn from_yaml_str(text: &str) -> Result<Node, ApiError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid YAML document: {}", e)))?;
        Ok(Node::from(value))
    }

    /// Parse JSON text into a document node.
    pub fn from_json_str(text: &str) -> Result<Node, ApiError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid JSON document: {}", e)))?;
        Ok(Node::from(value))
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "~".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl From<serde_yaml::Value> for Node {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Scalar(Scalar::Int(i))
                } else {
                    // u64 beyond i64 range and floats
                    Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Node::Scalar(Scalar::Text(s)),
            Value::Sequence(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::Mapping(map) => Node::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Node::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Int(i)),
                None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Node::Scalar(Scalar::Text(s)),
            Value::Array(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => {
                Node::Map(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

/// Load a document file, choosing the parser by extension (`.json` is JSON,
/// everything else is YAML).
pub fn load_document(path: &Path) -> Result<Node, ApiError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ApiError::InvalidInput(format!("Failed to read document {}: {}", path.display(), e))
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let parsed = if is_json {
        Node::from_json_str(&text)
    } else {
        Node::from_yaml_str(&text)
    };
    parsed.map_err(|e| ApiError::InvalidInput(format!("{}: {}", path.display(), e)))
}
