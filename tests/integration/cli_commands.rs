use std::fs;

use clap::Parser;
use sayml::config::SaymlConfig;
use sayml::tooling::cli::{Cli, CliContext, Commands, OutputFormat};
use tempfile::TempDir;

use crate::support::{CUSTOMER_DOCUMENT, SCHEMA_YAML};

fn context(temp_dir: &TempDir) -> CliContext {
    CliContext::with_config(
        SaymlConfig::default(),
        Some(temp_dir.path().join("store")),
        temp_dir.path(),
    )
}

fn write_inputs(temp_dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let schema = temp_dir.path().join("schema.yml");
    fs::write(&schema, SCHEMA_YAML).unwrap();
    let docs = temp_dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("customer.yml"), CUSTOMER_DOCUMENT).unwrap();
    (schema, docs)
}

#[test]
fn import_parses_from_arguments() {
    let cli = Cli::try_parse_from([
        "sayml",
        "--store",
        "/tmp/store",
        "import",
        "--schema",
        "schema.yml",
        "--dry-run",
        "a.yml",
        "b.json",
    ])
    .unwrap();
    match cli.command {
        Commands::Import {
            documents, dry_run, format, ..
        } => {
            assert_eq!(documents.len(), 2);
            assert!(dry_run);
            assert_eq!(format, OutputFormat::Text);
        }
        _ => panic!("expected import"),
    }
    assert!(Cli::try_parse_from(["sayml", "import", "--schema", "s.yml"]).is_err());
}

#[test]
fn output_format_is_checked_at_parse_time() {
    let cli = Cli::try_parse_from([
        "sayml", "show", "--schema", "s.yml", "--format", "json", "Product",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Show {
            format: OutputFormat::Json,
            ..
        }
    ));
    assert!(Cli::try_parse_from([
        "sayml", "show", "--schema", "s.yml", "--format", "xml", "Product",
    ])
    .is_err());
}

#[test]
fn check_summarizes_the_schema() {
    let temp_dir = TempDir::new().unwrap();
    let (schema, _) = write_inputs(&temp_dir);
    let output = context(&temp_dir)
        .execute(&Commands::Check { schema })
        .unwrap();
    assert!(output.contains("TicketLine"));
    assert!(output.contains("Schema OK: 4 entity types."));
}

#[test]
fn import_then_show_lists_committed_records() {
    let temp_dir = TempDir::new().unwrap();
    let (schema, docs) = write_inputs(&temp_dir);
    let ctx = context(&temp_dir);

    let output = ctx
        .execute(&Commands::Import {
            schema: schema.clone(),
            documents: vec![docs],
            dry_run: false,
            format: OutputFormat::Text,
        })
        .unwrap();
    assert!(output.contains("Imported 1 documents, 8 records created."), "{output}");

    let listing = ctx
        .execute(&Commands::Show {
            schema,
            entity: "Product".to_string(),
            format: OutputFormat::Json,
        })
        .unwrap();
    let records: serde_json::Value = serde_json::from_str(&listing).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 2);
}

#[test]
fn dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (schema, docs) = write_inputs(&temp_dir);
    let ctx = context(&temp_dir);

    let output = ctx
        .execute(&Commands::Import {
            schema: schema.clone(),
            documents: vec![docs],
            dry_run: true,
            format: OutputFormat::Json,
        })
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(body["dry_run"], serde_json::Value::Bool(true));
    assert_eq!(body["documents"][0]["report"]["created"], 8);

    let listing = ctx
        .execute(&Commands::Show {
            schema,
            entity: "Customer".to_string(),
            format: OutputFormat::Text,
        })
        .unwrap();
    assert_eq!(listing, "No Customer records.\n");
}

#[test]
fn unknown_entities_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (schema, _) = write_inputs(&temp_dir);
    let ctx = context(&temp_dir);

    assert!(ctx
        .execute(&Commands::Show {
            schema,
            entity: "Invoice".to_string(),
            format: OutputFormat::Text,
        })
        .is_err());
}
