//! Turns extraction output into engine records.
//!
//! The extraction step returns a JSON array of record objects, sometimes
//! wrapped in a markdown code fence. Each object carries an identifier, a
//! page number and any number of scalar attributes.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{FieldValue, QuantityRecord, RawRecord};
use crate::references::{extract_references, split_reference_list};
use crate::report::RejectedRecord;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?```").expect("static regex");
}

const IDENTIFIER_KEYS: &[&str] = &["identifier", "item_no"];
const PAGE_KEYS: &[&str] = &["source_page", "page"];
const REFERENCE_KEYS: &[&str] = &["references", "affiliate"];
const QUANTITY_ALIASES: &[&str] = &["qty", "quantity", "total_qty"];
const UNIT_ALIASES: &[&str] = &["uom", "unit"];

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => text.trim(),
    }
}

fn parse_entries(document: &str, text: &str) -> Result<Vec<Map<String, Value>>, ReconError> {
    let parse_err = |message: String| ReconError::ExtractionParse {
        document: document.to_string(),
        message,
    };

    let value: Value = serde_json::from_str(strip_code_fence(text)).map_err(|e| parse_err(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("records").or_else(|| obj.remove("items")) {
            Some(Value::Array(items)) => items,
            _ => return Err(parse_err("expected an array of records".into())),
        },
        _ => return Err(parse_err("expected an array of records".into())),
    };

    let mut entries = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(obj) => entries.push(obj),
            other => log::debug!("document '{document}': skipping non-object entry {i}: {other}"),
        }
    }
    Ok(entries)
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

fn identifier_of(obj: &Map<String, Value>) -> String {
    match first_of(obj, IDENTIFIER_KEYS) {
        Some(Value::String(s)) => s.clone(),
        // 100.0 and 100 name the same item
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => FieldValue::Number(f).to_string(),
            None => n.to_string(),
        },
        _ => String::new(),
    }
}

/// Page numbers are 1-based. Anything unparseable or < 1 means "unknown".
pub fn parse_page(value: &Value) -> Option<u32> {
    let page = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64))?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(page).ok().filter(|p| *p >= 1)
}

fn page_of(obj: &Map<String, Value>) -> Option<u32> {
    first_of(obj, PAGE_KEYS).and_then(parse_page)
}

fn scalar(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn references_of(obj: &Map<String, Value>) -> Vec<String> {
    match first_of(obj, REFERENCE_KEYS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => split_reference_list(s),
        _ => Vec::new(),
    }
}

/// Load detail-specification records. Records with blank identifiers are
/// kept here; the merge engine rejects and reports them.
pub fn load_detail_records(
    document_id: &str,
    upload_order: u32,
    text: &str,
    config: &ReconConfig,
) -> Result<Vec<RawRecord>, ReconError> {
    let quantity_field = config.merge.quantity_field.as_str();
    let unit_field = config.merge.unit_field.as_str();
    let mut records = Vec::new();

    for obj in parse_entries(document_id, text)? {
        let mut attributes = BTreeMap::new();
        for (key, value) in &obj {
            let reserved = IDENTIFIER_KEYS.contains(&key.as_str())
                || PAGE_KEYS.contains(&key.as_str())
                || REFERENCE_KEYS.contains(&key.as_str());
            if reserved {
                continue;
            }
            match scalar(value) {
                Some(v) => {
                    attributes.insert(key.clone(), v);
                }
                None if value.is_array() || value.is_object() => {
                    log::debug!("document '{document_id}': skipping nested field '{key}'");
                }
                None => {}
            }
        }

        // Quantity may arrive under an alias
        if !attributes.contains_key(quantity_field) {
            if let Some(v) = QUANTITY_ALIASES.iter().find_map(|a| attributes.remove(*a)) {
                attributes.insert(quantity_field.to_string(), v);
            }
        }
        if !attributes.contains_key(unit_field) {
            if let Some(v) = UNIT_ALIASES.iter().find_map(|a| attributes.remove(*a)) {
                attributes.insert(unit_field.to_string(), v);
            }
        }

        let mut references = references_of(&obj);
        if references.is_empty() {
            if let Some(ref field) = config.references.derive_from {
                if let Some(text) = attributes.get(field).and_then(|v| v.as_text()) {
                    references = extract_references(text);
                }
            }
        }

        records.push(RawRecord {
            identifier: identifier_of(&obj),
            attributes,
            references,
            source_document_id: document_id.to_string(),
            source_page: page_of(&obj),
            upload_order,
        });
    }

    log::debug!("document '{document_id}': loaded {} detail records", records.len());
    Ok(records)
}

/// Load quantity-summary records. Entries without a usable quantity are
/// rejected per record. A blank identifier aborts the load.
pub fn load_quantity_records(
    document_id: &str,
    text: &str,
    config: &ReconConfig,
) -> Result<(Vec<QuantityRecord>, Vec<RejectedRecord>), ReconError> {
    let merge = &config.merge;
    let quantity_keys: Vec<&str> = std::iter::once(merge.quantity_field.as_str())
        .chain(QUANTITY_ALIASES.iter().copied())
        .collect();
    let unit_keys: Vec<&str> = std::iter::once(merge.unit_field.as_str())
        .chain(UNIT_ALIASES.iter().copied())
        .collect();

    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for obj in parse_entries(document_id, text)? {
        let identifier = identifier_of(&obj);
        let page = page_of(&obj);
        if identifier.trim().is_empty() {
            return Err(ReconError::EmptyQuantityIdentifier {
                document: document_id.to_string(),
                page,
            });
        }

        let quantity = first_of(&obj, &quantity_keys)
            .and_then(scalar)
            .and_then(|v| v.as_number());
        let Some(total_quantity) = quantity else {
            log::warn!("document '{document_id}': '{identifier}' has no usable quantity, skipped");
            rejected.push(RejectedRecord {
                source_document_id: document_id.to_string(),
                source_page: page,
                reason: format!("quantity summary entry '{}' has no usable quantity", identifier.trim()),
            });
            continue;
        };

        let unit = first_of(&obj, &unit_keys)
            .and_then(scalar)
            .map(|v| v.to_string());

        records.push(QuantityRecord {
            identifier,
            total_quantity,
            unit,
            source_document_id: document_id.to_string(),
            source_page: page,
        });
    }

    log::debug!("document '{document_id}': loaded {} quantity records", records.len());
    Ok((records, rejected))
}
