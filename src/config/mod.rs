//! Configuration
//!
//! Layered settings for the `sayml` front-end: logging, import behavior, and
//! the on-disk store location. Sources are merged by [`MergeService`].

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage;

pub use facade::ConfigLoader;
pub use merge::service::MergeService;
pub use storage::StorageConfig;

use crate::builder::BuildOptions;
use crate::logging::LoggingConfig;
use crate::resolver::ConflictPolicy;
use crate::schema::SchemaOptions;
use serde::{Deserialize, Serialize};

/// Import behavior configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Policy for repeated occurrences whose non-key fields differ.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Field-name suffix excluded from document data (e.g. "id"); unset keeps
    /// every declared non-surrogate field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_id_suffix: Option<String>,
}

impl ImportConfig {
    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            exclude_id_suffix: self
                .exclude_id_suffix
                .clone()
                .filter(|suffix| !suffix.is_empty()),
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            conflict_policy: self.conflict_policy,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaymlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}
