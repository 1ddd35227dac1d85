//! Record merge: joins detail-specification records and the quantity
//! summary on canonical key.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{FieldPolicy, ReconConfig};
use crate::error::ReconError;
use crate::image::{candidates_for, select_best, Image, ImageIndex, ImageRef};
use crate::model::{
    CanonicalKey, FieldValue, MatchStatus, MergedRecord, QuantityRecord, QuantitySource, RawRecord,
};
use crate::normalize::Normalizer;
use crate::report::{ReconciliationReport, ReportBuilder};

/// Merge detail and quantity records and close the report over the result.
pub fn merge(
    detail: &[RawRecord],
    quantity: &[QuantityRecord],
    images: &[Image],
    config: &ReconConfig,
) -> Result<(Vec<MergedRecord>, ReconciliationReport), ReconError> {
    let index = ImageIndex::build(images);
    let mut report = ReportBuilder::new();
    report.set_quantity_summary_available(!quantity.is_empty());

    let records = merge_into(detail, quantity, &index, config, &mut report)?;
    let report = report.finish(records.len())?;
    Ok((records, report))
}

/// Merge, pushing counts and warnings into an existing report. Records come
/// back sorted by canonical key.
pub fn merge_into(
    detail: &[RawRecord],
    quantity: &[QuantityRecord],
    images: &ImageIndex<'_>,
    config: &ReconConfig,
    report: &mut ReportBuilder,
) -> Result<Vec<MergedRecord>, ReconError> {
    // Fatal checks run before any merging
    let sources = quantity_sources(quantity);
    if sources.len() > 1 {
        return Err(ReconError::MultipleQuantitySources { sources });
    }
    check_quantity_records(quantity)?;

    let normalizer = Normalizer::new(config.normalize.clone());

    // Detail index. Sorting first keeps every group in upload order.
    let mut ordered: Vec<&RawRecord> = detail.iter().collect();
    ordered.sort_by_key(|r| r.upload_order);

    let mut detail_index: BTreeMap<CanonicalKey, Vec<&RawRecord>> = BTreeMap::new();
    for rec in ordered {
        let key = match normalizer.normalize(&rec.identifier) {
            Ok(key) => key,
            Err(_) => {
                log::warn!(
                    "document '{}': detail record without identifier rejected",
                    rec.source_document_id
                );
                report.reject(
                    &rec.source_document_id,
                    rec.source_page,
                    "detail record has an empty identifier",
                );
                continue;
            }
        };
        if normalizer.is_format_different(&rec.identifier, key.as_str()) {
            report.format_warning(&rec.identifier, &key, &rec.source_document_id);
        }
        detail_index.entry(key).or_default().push(rec);
    }

    // Quantity index. First entry per key wins.
    let mut quantity_index: BTreeMap<CanonicalKey, &QuantityRecord> = BTreeMap::new();
    for q in quantity {
        let key = normalizer.normalize(&q.identifier)?;
        if normalizer.is_format_different(&q.identifier, key.as_str()) {
            report.format_warning(&q.identifier, &key, &q.source_document_id);
        }
        if quantity_index.contains_key(&key) {
            log::warn!("quantity summary lists '{key}' more than once; keeping the first entry");
            report.duplicate_quantity_key(&key);
            continue;
        }
        quantity_index.insert(key, q);
    }

    let mut merged = Vec::with_capacity(detail_index.len() + quantity_index.len());

    for (key, group) in &detail_index {
        let mut rec = merge_group(key, group, &normalizer, config);

        match quantity_index.get(key) {
            Some(q) => {
                rec.quantity = Some(q.total_quantity);
                rec.quantity_source = QuantitySource::QuantitySummary;
                rec.match_status = MatchStatus::Matched;
                rec.field_sources
                    .insert(config.merge.quantity_field.clone(), vec![q.source_document_id.clone()]);
                fill_unit(&mut rec, q, &config.merge.unit_field);
                push_unique(&mut rec.contributing_source_ids, &q.source_document_id);
            }
            None => {
                rec.match_status = MatchStatus::UnmatchedInSummary;
                report.quantity_unverified(key);
            }
        }

        if rec.source_page.is_some() && !images.is_empty() {
            let best = select_best(
                group
                    .iter()
                    .flat_map(|r| candidates_for(r, images, &config.images)),
            );
            match best {
                Some(img) => rec.selected_image = Some(ImageRef::from(img)),
                None => {
                    log::warn!("no product image for '{key}'");
                    report.missing_image(key);
                }
            }
        }

        report.count(rec.match_status);
        merged.push(rec);
    }

    for (key, q) in &quantity_index {
        if detail_index.contains_key(key) {
            continue;
        }
        log::debug!("'{key}' appears only in the quantity summary");
        let mut rec = summary_only(key, q, &config.merge.quantity_field);
        fill_unit(&mut rec, q, &config.merge.unit_field);
        report.count(rec.match_status);
        merged.push(rec);
    }

    merged.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));

    log::info!(
        "merged {} records ({} detail keys, {} quantity keys)",
        merged.len(),
        detail_index.len(),
        quantity_index.len()
    );
    Ok(merged)
}

/// Distinct quantity source documents, in first-seen order.
pub fn quantity_sources(quantity: &[QuantityRecord]) -> Vec<String> {
    let mut sources = Vec::new();
    for q in quantity {
        push_unique(&mut sources, &q.source_document_id);
    }
    sources
}

fn check_quantity_records(quantity: &[QuantityRecord]) -> Result<(), ReconError> {
    for q in quantity {
        if q.identifier.trim().is_empty() {
            return Err(ReconError::EmptyQuantityIdentifier {
                document: q.source_document_id.clone(),
                page: q.source_page,
            });
        }
        if !q.total_quantity.is_finite() || q.total_quantity < 0.0 {
            return Err(ReconError::InvalidQuantity {
                document: q.source_document_id.clone(),
                identifier: q.identifier.trim().to_string(),
                value: q.total_quantity,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-key merge
// ---------------------------------------------------------------------------

fn merge_group(
    key: &CanonicalKey,
    group: &[&RawRecord],
    normalizer: &Normalizer,
    config: &ReconConfig,
) -> MergedRecord {
    let quantity_field = config.merge.quantity_field.as_str();

    let fields: BTreeSet<&str> = group
        .iter()
        .flat_map(|r| r.attributes.keys().map(String::as_str))
        .collect();

    let mut attributes = BTreeMap::new();
    let mut field_sources = BTreeMap::new();
    for field in fields {
        if field == quantity_field {
            continue;
        }
        if let Some((value, sources)) = merge_field(field, group, config.merge.policy_for(field)) {
            attributes.insert(field.to_string(), value);
            field_sources.insert(field.to_string(), sources);
        }
    }

    let detail_quantity = group
        .iter()
        .find_map(|r| r.attr(quantity_field).and_then(|v| v.as_number()).map(|n| (n, r)));
    let (quantity, quantity_source) = match detail_quantity {
        Some((n, r)) => {
            field_sources.insert(quantity_field.to_string(), vec![r.source_document_id.clone()]);
            (Some(n), QuantitySource::DetailSpecification)
        }
        None => (None, QuantitySource::None),
    };

    let mut contributing_source_ids = Vec::new();
    for r in group {
        push_unique(&mut contributing_source_ids, &r.source_document_id);
    }

    let mut reference_targets: Vec<CanonicalKey> = Vec::new();
    for raw in group.iter().flat_map(|r| r.references.iter()) {
        let Ok(target) = normalizer.normalize(raw) else {
            log::debug!("'{key}': ignoring blank reference");
            continue;
        };
        if &target == key {
            log::debug!("'{key}': dropping self-reference");
            continue;
        }
        if !reference_targets.contains(&target) {
            reference_targets.push(target);
        }
    }

    MergedRecord {
        canonical_key: key.clone(),
        identifier: group
            .first()
            .map(|r| r.identifier.trim().to_string())
            .unwrap_or_else(|| key.to_string()),
        attributes,
        quantity,
        source_page: group.iter().find_map(|r| r.source_page),
        contributing_source_ids,
        quantity_source,
        selected_image: None,
        match_status: MatchStatus::UnmatchedInSummary,
        reference_targets,
        field_sources,
    }
}

fn merge_field(
    field: &str,
    group: &[&RawRecord],
    policy: &FieldPolicy,
) -> Option<(FieldValue, Vec<String>)> {
    match policy {
        FieldPolicy::FillEmpty => fill_empty(field, group),
        FieldPolicy::Concatenate { separator } => concatenate(field, group, separator),
        FieldPolicy::Override { source } => group
            .iter()
            .filter(|r| &r.source_document_id == source)
            .find_map(|r| r.attr(field).map(|v| (v.clone(), vec![r.source_document_id.clone()])))
            .or_else(|| fill_empty(field, group)),
    }
}

fn fill_empty(field: &str, group: &[&RawRecord]) -> Option<(FieldValue, Vec<String>)> {
    group
        .iter()
        .find_map(|r| r.attr(field).map(|v| (v.clone(), vec![r.source_document_id.clone()])))
}

fn concatenate(
    field: &str,
    group: &[&RawRecord],
    separator: &str,
) -> Option<(FieldValue, Vec<String>)> {
    let mut values: Vec<&FieldValue> = Vec::new();
    let mut texts: Vec<String> = Vec::new();
    let mut sources = Vec::new();

    for r in group {
        let Some(v) = r.attr(field) else { continue };
        let text = v.to_string();
        if !texts.contains(&text) {
            texts.push(text);
            values.push(v);
        }
        push_unique(&mut sources, &r.source_document_id);
    }

    match values.as_slice() {
        [] => None,
        [only] => Some(((*only).clone(), sources)),
        _ => Some((FieldValue::Text(texts.join(separator)), sources)),
    }
}

/// The summary's unit only fills an empty unit.
fn fill_unit(rec: &mut MergedRecord, q: &QuantityRecord, unit_field: &str) {
    let Some(unit) = q.unit.as_deref().filter(|u| !u.trim().is_empty()) else {
        return;
    };
    let has_unit = rec.attributes.get(unit_field).is_some_and(|v| !v.is_empty());
    if !has_unit {
        rec.attributes
            .insert(unit_field.to_string(), FieldValue::Text(unit.trim().to_string()));
        rec.field_sources
            .insert(unit_field.to_string(), vec![q.source_document_id.clone()]);
    }
}

fn summary_only(key: &CanonicalKey, q: &QuantityRecord, quantity_field: &str) -> MergedRecord {
    let mut field_sources = BTreeMap::new();
    field_sources.insert(quantity_field.to_string(), vec![q.source_document_id.clone()]);

    MergedRecord {
        canonical_key: key.clone(),
        identifier: q.identifier.trim().to_string(),
        attributes: BTreeMap::new(),
        quantity: Some(q.total_quantity),
        source_page: None,
        contributing_source_ids: vec![q.source_document_id.clone()],
        quantity_source: QuantitySource::QuantitySummary,
        selected_image: None,
        match_status: MatchStatus::SummaryOnly,
        reference_targets: Vec::new(),
        field_sources,
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
