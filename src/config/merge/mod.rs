//! Config merge: defaults plus ordered sources.

pub mod service;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the built-in defaults (lowest precedence).
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("import.conflict_policy", "first-wins")?
        .set_default("storage.store_path", ".sayml/store")?
        .set_default("logging.level", "info")
}
