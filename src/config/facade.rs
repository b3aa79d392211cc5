//! Entry point used by the CLI to obtain a [`SaymlConfig`].

use super::merge::service::MergeService;
use super::SaymlConfig;
use config::ConfigError;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit file replaces the global and working-directory files;
    /// environment variables apply either way.
    pub fn load(working_dir: &Path, explicit: Option<&Path>) -> Result<SaymlConfig, ConfigError> {
        match explicit {
            Some(path) => MergeService::load_from_file(path),
            None => MergeService::load(working_dir),
        }
    }
}
