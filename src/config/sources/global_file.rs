//! Optional user-wide file: `$XDG_CONFIG_HOME/sayml/config.toml`.

use crate::config::paths::xdg_root;
use config::builder::DefaultState;
use config::{ConfigBuilder, File};

pub fn overlay(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match xdg_root::global_config_path() {
        Some(path) => builder.add_source(File::from(path).required(false)),
        None => builder,
    }
}
