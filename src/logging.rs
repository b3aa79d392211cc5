//! Logging
//!
//! Installs a `tracing` subscriber for the `sayml` binary. The library only
//! emits events; embedding applications bring their own subscriber.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "SAYML_LOG";
const ENV_FORMAT: &str = "SAYML_LOG_FORMAT";
const ENV_OUTPUT: &str = "SAYML_LOG_OUTPUT";
const ENV_FILE: &str = "SAYML_LOG_FILE";
const ENV_MODULES: &str = "SAYML_LOG_MODULES";

/// Event rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum LogOutput {
    #[serde(rename = "stdout")]
    #[value(name = "stdout")]
    Stdout,
    #[default]
    #[serde(rename = "stderr")]
    #[value(name = "stderr")]
    Stderr,
    #[serde(rename = "file")]
    #[value(name = "file")]
    File,
    #[serde(rename = "file+stderr")]
    #[value(name = "file+stderr")]
    FileAndStderr,
    /// stdout and stderr
    #[serde(rename = "both")]
    #[value(name = "both")]
    Both,
}

impl LogOutput {
    fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }
}

impl FromStr for LogOutput {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                other
            ))),
        }
    }
}

/// `[logging]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// Default filter level: trace, debug, info, warn, error, off
    pub level: String,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Log file when output includes a file; unset uses the platform state dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// ANSI colors for terminal text output
    pub color: bool,

    /// Per-module filter levels, e.g. `sayml::resolver = "debug"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

/// Log file location: explicit path, then `SAYML_LOG_FILE`, then
/// `<state dir>/sayml.log`.
pub fn resolve_log_file_path(explicit: Option<&Path>) -> Result<PathBuf, ApiError> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(ENV_FILE).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::ProjectDirs::from("", "sayml", "sayml").ok_or_else(|| {
        ApiError::ConfigError("Could not determine a state directory for the log file".to_string())
    })?;
    let state = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(state.join("sayml.log"))
}

/// Install the global subscriber. Environment variables take precedence over
/// `config`, which already has CLI flags folded in.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let installed = if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
    } else {
        let filter = env_filter(config)?;
        let format = env_override(ENV_FORMAT)?.unwrap_or(config.format);
        let output = env_override(ENV_OUTPUT)?.unwrap_or(config.output);
        let writer = make_writer(output, config.file.as_deref())?;
        let registry = Registry::default().with(filter);
        match format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_writer(writer),
                )
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(config.color && !output.to_file())
                        .with_writer(writer),
                )
                .try_init(),
        }
    };
    installed.map_err(|e| ApiError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn env_override<T: FromStr<Err = ApiError>>(name: &str) -> Result<Option<T>, ApiError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

fn make_writer(output: LogOutput, file: Option<&Path>) -> Result<BoxMakeWriter, ApiError> {
    let writer = match output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        LogOutput::File => BoxMakeWriter::new(Mutex::new(open_log_file(file)?)),
        LogOutput::FileAndStderr => {
            BoxMakeWriter::new(Mutex::new(open_log_file(file)?).and(std::io::stderr))
        }
    };
    Ok(writer)
}

fn open_log_file(explicit: Option<&Path>) -> Result<std::fs::File, ApiError> {
    let path = resolve_log_file_path(explicit)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ConfigError(format!(
                "Failed to create log directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            ApiError::ConfigError(format!("Failed to open log file {}: {}", path.display(), e))
        })
}

/// `SAYML_LOG` replaces the whole filter; otherwise the configured level plus
/// per-module directives from the config and `SAYML_LOG_MODULES`.
fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    let mut directives: Vec<String> = vec![config.level.clone()];
    directives.extend(
        config
            .modules
            .iter()
            .map(|(module, level)| format!("{}={}", module, level)),
    );
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(
            modules
                .split(',')
                .filter_map(|entry| entry.split_once('='))
                .map(|(module, level)| format!("{}={}", module.trim(), level.trim())),
        );
    }
    EnvFilter::builder()
        .parse(directives.join(","))
        .map_err(|e| ApiError::ConfigError(format!("Invalid log directive: {}", e)))
}
