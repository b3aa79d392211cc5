//! CLI Tooling
//!
//! `sayml` commands. Every command returns its output as a string so it can
//! be asserted on in tests; the binary prints it.

use crate::builder::{BuildReport, TreeBuilder};
use crate::config::{ConfigLoader, SaymlConfig};
use crate::document::load_document;
use crate::error::ApiError;
use crate::logging::{LogFormat, LogOutput, LoggingConfig};
use crate::schema::{load_schema, SchemaIndex};
use crate::store::{Session, SledBackend};
use crate::tooling::format::{format_import_text, format_records_text, format_schema_text};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use walkdir::WalkDir;

/// Sayml CLI - materialize nested documents into deduplicated record graphs
#[derive(Parser)]
#[command(name = "sayml")]
#[command(about = "Materialize nested YAML/JSON documents into deduplicated relational records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Record store directory (overrides storage.store_path)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log output destination
    #[arg(long, value_enum)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Logging configuration with CLI flags folded over the loaded config.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            logging.format = format;
        }
        if let Some(output) = self.log_output {
            logging.output = output;
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

/// Rendering of command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build documents into the record store
    Import {
        /// Schema file (YAML, JSON, or TOML)
        #[arg(long)]
        schema: PathBuf,
        /// Document files or directories of documents
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        /// Build and report without committing
        #[arg(long)]
        dry_run: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate a schema and summarize its entity types
    Check {
        /// Schema file (YAML, JSON, or TOML)
        #[arg(long)]
        schema: PathBuf,
    },
    /// List committed records of one entity type
    Show {
        /// Schema file (YAML, JSON, or TOML)
        #[arg(long)]
        schema: PathBuf,
        /// Entity type name
        entity: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Resolved settings shared by all commands.
pub struct CliContext {
    config: SaymlConfig,
    store_path: PathBuf,
}

impl CliContext {
    pub fn new(store: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let working_dir = std::env::current_dir()
            .map_err(|e| ApiError::ConfigError(format!("Cannot read working directory: {}", e)))?;
        let config = ConfigLoader::load(&working_dir, config_path.as_deref())?;
        Ok(Self::with_config(config, store, &working_dir))
    }

    pub fn with_config(config: SaymlConfig, store: Option<PathBuf>, working_dir: &Path) -> Self {
        let store_path = store.unwrap_or_else(|| config.storage.resolve_store_path(working_dir));
        Self { config, store_path }
    }

    pub fn config(&self) -> &SaymlConfig {
        &self.config
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Import {
                schema,
                documents,
                dry_run,
                format,
            } => self.import(schema, documents, *dry_run, *format),
            Commands::Check { schema } => {
                let index = self.load_index(schema)?;
                Ok(format_schema_text(&index))
            }
            Commands::Show {
                schema,
                entity,
                format,
            } => self.show(schema, entity, *format),
        }
    }

    fn load_index(&self, schema: &Path) -> Result<SchemaIndex, ApiError> {
        let descriptors = load_schema(schema)?;
        Ok(SchemaIndex::new(
            descriptors,
            self.config.import.schema_options(),
        )?)
    }

    fn open_session(&self, index: SchemaIndex) -> Result<Session<SledBackend>, ApiError> {
        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::ConfigError(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let backend = SledBackend::open(&self.store_path)?;
        Ok(Session::new(backend, Arc::new(index)))
    }

    fn import(
        &self,
        schema: &Path,
        documents: &[PathBuf],
        dry_run: bool,
        format: OutputFormat,
    ) -> Result<String, ApiError> {
        let index = self.load_index(schema)?;
        let paths = collect_documents(documents)?;
        let mut session = self.open_session(index)?;
        let index = session.schema().clone();
        let builder = TreeBuilder::new(&index, self.config.import.build_options());

        let mut reports: Vec<(PathBuf, BuildReport)> = Vec::with_capacity(paths.len());
        for path in paths {
            let document = load_document(&path)?;
            let report = match builder.build_with_report(&mut session, &document) {
                Ok(report) => report,
                Err(e) => {
                    session.rollback();
                    error!(document = %path.display(), error = %e, "Import failed");
                    return Err(ApiError::InvalidInput(format!("{}: {}", path.display(), e)));
                }
            };
            if dry_run {
                session.rollback();
            } else if let Err(e) = session.commit() {
                session.rollback();
                return Err(ApiError::InvalidInput(format!("{}: {}", path.display(), e)));
            }
            info!(document = %path.display(), dry_run, "Imported document");
            reports.push((path, report));
        }

        if format == OutputFormat::Json {
            let items: Vec<_> = reports
                .iter()
                .map(|(path, report)| json!({ "document": path, "report": report }))
                .collect();
            let body = json!({ "dry_run": dry_run, "documents": items });
            return serde_json::to_string_pretty(&body)
                .map_err(|e| ApiError::InvalidInput(format!("Failed to render JSON: {}", e)));
        }
        Ok(format_import_text(&reports, dry_run))
    }

    fn show(&self, schema: &Path, entity: &str, format: OutputFormat) -> Result<String, ApiError> {
        let index = self.load_index(schema)?;
        let entity_type = index
            .require(entity, "show command")
            .map_err(ApiError::from)?
            .clone();
        let session = self.open_session(index)?;
        let records = session.scan(entity_type.name())?;
        if format == OutputFormat::Json {
            return serde_json::to_string_pretty(&records)
                .map_err(|e| ApiError::InvalidInput(format!("Failed to render JSON: {}", e)));
        }
        Ok(format_records_text(&entity_type, &records))
    }
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml") | Some("json")
    )
}

/// Expand directories into their document files (sorted), keeping explicit
/// file arguments as given.
pub fn collect_documents(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, ApiError> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(|e| {
                    ApiError::InvalidInput(format!("Failed to walk {}: {}", input.display(), e))
                })?;
                if entry.file_type().is_file() && is_document(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            out.extend(found);
        } else if input.is_file() {
            out.push(dunce::canonicalize(input).unwrap_or_else(|_| input.clone()));
        } else {
            return Err(ApiError::InvalidInput(format!(
                "Document not found: {}",
                input.display()
            )));
        }
    }
    Ok(out)
}
