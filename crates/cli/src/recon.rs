//! `specmerge run` / `specmerge validate` — config-driven reconciliation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use specmerge_recon::{Image, ReconConfig, ReconInput, ReconResult, SourceDocument};

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_REVIEW_REQUIRED, EXIT_RUNTIME};
use crate::{export, CliError};

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

pub(crate) fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(CliError::recon)
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    csv_file: Option<PathBuf>,
) -> Result<(), CliError> {
    if let (Some(out), Some(csv)) = (&output_file, &csv_file) {
        if out == csv {
            return Err(CliError::usage("--output and --csv point at the same file"));
        }
    }

    let config = read_config(&config_path)?;
    if config.documents.is_empty() {
        return Err(recon_err(EXIT_INVALID_CONFIG, format!("config '{}' declares no documents", config.name))
            .with_hint("add [[documents]] entries with an id and an extraction file"));
    }

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let documents = load_documents(&config, base_dir)?;
    let images = match config.images.manifest {
        Some(ref manifest) => load_images(&base_dir.join(manifest))?,
        None => Vec::new(),
    };
    log::info!("loaded {} documents, {} images", documents.len(), images.len());

    let input = ReconInput { documents, images };
    let result = specmerge_recon::run(&config, &input).map_err(CliError::recon)?;

    // Output
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if let Some(ref path) = csv_file {
        export::write_csv(path, &result, &config)?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    if result.report.needs_review() {
        return Err(recon_err(EXIT_REVIEW_REQUIRED, "reconciliation report needs review")
            .with_hint("check the report section of the JSON output before accepting the schedule"));
    }

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: recon '{}' with {} document(s), {} field policy override(s), {} image exclusion(s)",
        config.name,
        config.documents.len(),
        config.merge.fields.len(),
        config.images.exclusions.len(),
    );
    Ok(())
}

/// Read every declared extraction file. Array position is the upload
/// order unless the document sets one.
fn load_documents(config: &ReconConfig, base_dir: &Path) -> Result<Vec<SourceDocument>, CliError> {
    let mut documents = Vec::with_capacity(config.documents.len());
    for (i, doc) in config.documents.iter().enumerate() {
        let path = base_dir.join(&doc.file);
        let extraction = std::fs::read_to_string(&path).map_err(|e| {
            recon_err(EXIT_RUNTIME, format!("document '{}': cannot read {}: {e}", doc.id, path.display()))
        })?;
        documents.push(SourceDocument {
            id: doc.id.clone(),
            filename: doc.display_filename().to_string(),
            upload_order: doc.upload_order.unwrap_or(i as u32),
            role_override: doc.role,
            extraction,
        });
    }
    Ok(documents)
}

// ---------------------------------------------------------------------------
// Image manifest
// ---------------------------------------------------------------------------

/// One extracted image. Either `file` (dimensions probed from the header) or
/// explicit `width` + `height` must be given.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    document: String,
    page: u32,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

fn load_images(manifest_path: &Path) -> Result<Vec<Image>, CliError> {
    let manifest_str = std::fs::read_to_string(manifest_path).map_err(|e| {
        recon_err(EXIT_RUNTIME, format!("cannot read image manifest {}: {e}", manifest_path.display()))
    })?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&manifest_str).map_err(|e| {
        recon_err(EXIT_RUNTIME, format!("invalid image manifest {}: {e}", manifest_path.display()))
    })?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    // Default index: position among the same document's entries
    let mut next_index: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    let mut images = Vec::with_capacity(entries.len());

    for entry in entries {
        let counter = next_index.entry(entry.document.clone()).or_insert(0);
        let index = entry.index.unwrap_or(*counter);
        *counter += 1;

        let image = match (entry.width, entry.height, &entry.file) {
            (Some(w), Some(h), _) => Image::new(&entry.document, entry.page, w, h).with_index(index),
            (_, _, Some(file)) => {
                let path = base_dir.join(file);
                let bytes = std::fs::read(&path).map_err(|e| {
                    recon_err(EXIT_RUNTIME, format!("cannot read image {}: {e}", path.display()))
                })?;
                Image::from_bytes(&entry.document, entry.page, index, bytes).map_err(CliError::recon)?
            }
            _ => {
                return Err(recon_err(
                    EXIT_RUNTIME,
                    format!(
                        "image manifest entry for document '{}', page {} needs a file or width and height",
                        entry.document, entry.page
                    ),
                ))
            }
        };
        images.push(image);
    }
    Ok(images)
}

// ---------------------------------------------------------------------------
// Human summary (stderr)
// ---------------------------------------------------------------------------

fn print_summary(result: &ReconResult) {
    let r = &result.report;
    eprintln!(
        "{}: {} records; {} matched, {} unmatched in summary, {} summary only ({:.1}% matched)",
        result.meta.config_name,
        r.total_records,
        r.matched_count,
        r.unmatched_in_summary_count,
        r.summary_only_count,
        r.match_rate(),
    );

    let lines = [
        (r.identifier_format_warnings.len(), "identifier format warning(s)"),
        (r.rejected_records.len(), "rejected record(s)"),
        (r.quantity_unverified.len(), "quantit(ies) not verified by the summary"),
        (r.missing_images.len(), "record(s) without a product image"),
        (r.orphaned_dependents.len(), "orphaned dependent record(s)"),
        (r.dangling_references.len(), "dangling reference(s)"),
        (r.duplicate_quantity_keys.len(), "duplicate quantity summary key(s)"),
        (r.ignored_documents.len(), "ignored document(s)"),
    ];
    for (count, label) in lines {
        if count > 0 {
            eprintln!("  {count} {label}");
        }
    }
    for warning in &r.warnings {
        eprintln!("warning: {warning}");
    }
}
