use std::collections::HashSet;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::image::ImageIndex;
use crate::loader::{load_detail_records, load_quantity_records};
use crate::merge::merge_into;
use crate::model::{ReconInput, ReconMeta, ReconResult, SourceDocument};
use crate::ordering::order;
use crate::report::ReportBuilder;
use crate::role::{classify_with_source, Role};

/// Run one reconciliation. Returns ordered records + report.
///
/// Any fatal error aborts before output is produced; per-record problems
/// land in the report.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let mut seen = HashSet::new();
    for doc in &input.documents {
        if !seen.insert(doc.id.as_str()) {
            return Err(ReconError::DuplicateDocument(doc.id.clone()));
        }
    }

    let mut report = ReportBuilder::new();

    // Classify
    let mut quantity_docs: Vec<&SourceDocument> = Vec::new();
    let mut detail_docs: Vec<&SourceDocument> = Vec::new();
    for doc in &input.documents {
        let (role, source) = classify_with_source(&doc.filename, doc.role_override, &config.roles);
        log::info!("document '{}' ({}): {role} [{source:?}]", doc.id, doc.filename);
        match role {
            Role::QuantitySummary => quantity_docs.push(doc),
            Role::DetailSpecification => detail_docs.push(doc),
            Role::Unknown => {
                log::warn!("document '{}' has no usable filename and no role; ignored", doc.id);
                report.ignore_document(&doc.id, &doc.filename);
            }
        }
    }

    if quantity_docs.len() > 1 {
        return Err(ReconError::MultipleQuantitySources {
            sources: quantity_docs.iter().map(|d| d.id.clone()).collect(),
        });
    }

    // Load
    let mut quantity = Vec::new();
    if let Some(doc) = quantity_docs.first() {
        let (records, rejected) = load_quantity_records(&doc.id, &doc.extraction, config)?;
        for r in rejected {
            report.reject(&r.source_document_id, r.source_page, r.reason);
        }
        quantity = records;
    }

    let mut detail = Vec::new();
    for doc in &detail_docs {
        detail.extend(load_detail_records(&doc.id, doc.upload_order, &doc.extraction, config)?);
    }

    report.set_quantity_summary_available(!quantity.is_empty());

    // Merge + order
    let images = ImageIndex::build(&input.images);
    let merged = merge_into(&detail, &quantity, &images, config, &mut report)?;
    let total = merged.len();

    let ordered = order(merged);
    ordered.record_in(&mut report);

    let report = report.finish(total)?;
    log::info!(
        "reconciled {total} records: {} matched, {} unmatched in summary, {} summary only",
        report.matched_count,
        report.unmatched_in_summary_count,
        report.summary_only_count
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            quantity_document: quantity_docs.first().map(|d| d.id.clone()),
            detail_documents: detail_docs.iter().map(|d| d.id.clone()).collect(),
        },
        report,
        records: ordered.records,
    })
}
