//! `SAYML_*` environment overlay, highest precedence.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

/// Nested keys use `__`: `SAYML_IMPORT__CONFLICT_POLICY=reject` sets
/// `import.conflict_policy`.
pub fn overlay(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("SAYML")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}
