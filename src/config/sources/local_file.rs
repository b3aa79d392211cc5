//! Optional `sayml.toml` next to the documents being imported.

use config::builder::DefaultState;
use config::{ConfigBuilder, File};
use std::path::Path;

pub const LOCAL_CONFIG_FILE: &str = "sayml.toml";

pub fn overlay(builder: ConfigBuilder<DefaultState>, working_dir: &Path) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(working_dir.join(LOCAL_CONFIG_FILE)).required(false))
}
