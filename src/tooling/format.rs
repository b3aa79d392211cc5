//! Format schema summaries, import reports, and stored records as text.

use crate::builder::BuildReport;
use crate::schema::{EntityType, Multiplicity, SchemaIndex};
use crate::store::{Link, Record};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::path::PathBuf;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(header);
    table
}

/// Format the entity types of a schema as human-readable text.
pub fn format_schema_text(schema: &SchemaIndex) -> String {
    let mut out = String::new();
    if schema.is_empty() {
        out.push_str("No entity types declared.\n");
        return out;
    }
    let mut entities: Vec<&EntityType> = schema.entities().collect();
    entities.sort_by(|a, b| a.name().cmp(b.name()));

    let mut summary = table(vec!["Entity", "Storage", "Fields", "Relationships", "Unique"]);
    for entity in &entities {
        let relationships: Vec<String> = entity
            .relationships()
            .map(|rel| match rel.multiplicity {
                Multiplicity::Single => format!("{} -> {}", rel.name, rel.target),
                Multiplicity::Many => format!("{} -> [{}]", rel.name, rel.target),
            })
            .collect();
        let unique: Vec<String> = entity
            .unique_constraints()
            .iter()
            .map(|constraint| format!("({})", constraint.join(", ")))
            .collect();
        summary.add_row(vec![
            entity.name().to_string(),
            entity.storage_name().to_string(),
            entity.scalar_fields().join(", "),
            relationships.join("\n"),
            unique.join("\n"),
        ]);
    }
    out.push_str(&format!("{}\n\n", summary));
    out.push_str(&format!("Schema OK: {} entity types.\n", entities.len()));
    out
}

/// Format per-document build reports as human-readable text.
pub fn format_import_text(reports: &[(PathBuf, BuildReport)], dry_run: bool) -> String {
    let mut out = String::new();
    if reports.is_empty() {
        out.push_str("No documents found.\n");
        return out;
    }
    let mut summary = table(vec!["Document", "Root", "Created", "Reused (stored)", "Reused (document)"]);
    for (path, report) in reports {
        let ids: Vec<String> = report.root.ids().iter().map(|id| id.to_string()).collect();
        summary.add_row(vec![
            path.display().to_string(),
            format!("{} {}", report.entity, ids.join(", ")),
            report.created.to_string(),
            report.reused_committed.to_string(),
            report.reused_in_flight.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n\n", summary));
    let created: usize = reports.iter().map(|(_, r)| r.created).sum();
    if dry_run {
        out.push_str(&format!(
            "Dry run: {} documents, {} records would be created. Nothing was written.\n",
            reports.len(),
            created
        ));
    } else {
        out.push_str(&format!(
            "Imported {} documents, {} records created.\n",
            reports.len(),
            created
        ));
    }
    out
}

fn link_text(link: &Link) -> String {
    match link {
        Link::One(id) => id.to_string(),
        Link::Many(ids) => {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            format!("[{}]", ids.join(", "))
        }
    }
}

/// Format committed records of one entity type as human-readable text.
pub fn format_records_text(entity: &EntityType, records: &[Record]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        out.push_str(&format!("No {} records.\n", entity.name()));
        return out;
    }
    let relationships: Vec<&str> = entity.relationships().map(|rel| rel.name.as_str()).collect();
    let mut header = vec!["Id"];
    header.extend(entity.scalar_fields().iter().map(String::as_str));
    header.extend(relationships.iter().copied());

    let mut listing = table(header);
    for record in records {
        let mut row = vec![record.id.to_string()];
        for field in entity.scalar_fields() {
            row.push(
                record
                    .get(field)
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        for name in &relationships {
            row.push(
                record
                    .links
                    .get(*name)
                    .map(link_text)
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        listing.add_row(row);
    }
    out.push_str(&format!("{}\n\n", listing));
    out.push_str(&format!("Total: {} {} records.\n", records.len(), entity.name()));
    out
}
