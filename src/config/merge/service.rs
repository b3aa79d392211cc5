//! Layers configuration sources and deserializes the result.

use crate::config::sources::{environment, global_file, local_file};
use crate::config::SaymlConfig;
use config::{ConfigError, File};
use std::path::Path;

use super::builder_with_defaults;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Defaults, then the global file, then `sayml.toml` in `working_dir`,
    /// then the environment.
    pub fn load(working_dir: &Path) -> Result<SaymlConfig, ConfigError> {
        let builder = global_file::overlay(builder_with_defaults()?);
        let builder = local_file::overlay(builder, working_dir);
        environment::overlay(builder).build()?.try_deserialize()
    }

    /// Defaults, then the required file at `path`, then the environment.
    pub fn load_from_file(path: &Path) -> Result<SaymlConfig, ConfigError> {
        let builder = builder_with_defaults()?.add_source(File::from(path));
        environment::overlay(builder).build()?.try_deserialize()
    }
}
