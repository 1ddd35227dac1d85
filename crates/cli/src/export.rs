//! Flat CSV schedule: one row per ordered record.

use std::collections::BTreeSet;
use std::path::Path;

use specmerge_recon::{OrderedRecord, ReconConfig, ReconResult};

use crate::CliError;

const FIXED_COLUMNS: &[&str] = &[
    "no",
    "anchor",
    "canonical_key",
    "identifier",
    "quantity",
    "match_status",
    "quantity_source",
    "source_page",
    "image",
    "reference_targets",
    "sources",
];

/// Attribute columns: every attribute seen, sorted, unit first.
fn attribute_columns(records: &[OrderedRecord], unit_field: &str) -> Vec<String> {
    let seen: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.record.attributes.keys().map(String::as_str))
        .filter(|k| *k != unit_field)
        .collect();
    std::iter::once(unit_field.to_string())
        .chain(seen.into_iter().map(str::to_string))
        .collect()
}

fn row(rec: &OrderedRecord, attributes: &[String]) -> Vec<String> {
    let r = &rec.record;
    let image = r
        .selected_image
        .as_ref()
        .map(|img| format!("{}:p{}#{}", img.source_document_id, img.source_page, img.index))
        .unwrap_or_default();
    let targets: Vec<&str> = r.reference_targets.iter().map(|k| k.as_str()).collect();

    let mut out = vec![
        rec.no.to_string(),
        rec.anchor.as_ref().map(|k| k.to_string()).unwrap_or_default(),
        r.canonical_key.to_string(),
        r.identifier.clone(),
        r.quantity
            .map(|q| specmerge_recon::FieldValue::Number(q).to_string())
            .unwrap_or_default(),
        r.match_status.to_string(),
        r.quantity_source.to_string(),
        r.source_page.map(|p| p.to_string()).unwrap_or_default(),
        image,
        targets.join("|"),
        r.contributing_source_ids.join("|"),
    ];
    for field in attributes {
        out.push(r.attr(field).map(|v| v.to_string()).unwrap_or_default());
    }
    out
}

pub fn write_csv(path: &Path, result: &ReconResult, config: &ReconConfig) -> Result<(), CliError> {
    let attributes = attribute_columns(&result.records, &config.merge.unit_field);
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    let header: Vec<&str> = FIXED_COLUMNS
        .iter()
        .copied()
        .chain(attributes.iter().map(String::as_str))
        .collect();
    writer
        .write_record(&header)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    for rec in &result.records {
        writer
            .write_record(row(rec, &attributes))
            .map_err(|e| CliError::runtime(e.to_string()))?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| CliError::runtime(e.to_string()))?;
    std::fs::write(path, data)
        .map_err(|e| CliError::runtime(format!("cannot write {}: {e}", path.display())))
}
