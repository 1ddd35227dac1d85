use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::image::{Image, ImageRef};
use crate::report::ReconciliationReport;
use crate::role::Role;

// ---------------------------------------------------------------------------
// Keys + values
// ---------------------------------------------------------------------------

/// Normalized identifier. The only join key across documents.
///
/// Ordering is lexicographic over the canonical string, which is what the
/// ordering pass sorts primaries by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Wrap an already-normalized string. Callers outside the normalizer
    /// should go through [`crate::normalize::normalize`].
    pub(crate) fn from_normalized(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single attribute value as reported by a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Blank text counts as absent for every merge policy.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => !n.is_finite(),
        }
    }

    /// Numeric view: numbers as-is, text with thousands separators stripped.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s.trim()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One entity as reported by a single detail-specification document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub identifier: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
    /// Raw identifiers of the primary records this record augments.
    #[serde(default)]
    pub references: Vec<String>,
    pub source_document_id: String,
    #[serde(default)]
    pub source_page: Option<u32>,
    #[serde(default)]
    pub upload_order: u32,
}

impl RawRecord {
    pub fn new(identifier: impl Into<String>, source_document_id: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            attributes: BTreeMap::new(),
            references: Vec::new(),
            source_document_id: source_document_id.into(),
            source_page: None,
            upload_order: 0,
        }
    }

    pub fn with_attr(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(field.to_string(), value.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.source_page = Some(page);
        self
    }

    pub fn with_upload_order(mut self, order: u32) -> Self {
        self.upload_order = order;
        self
    }

    pub fn with_references(mut self, refs: &[&str]) -> Self {
        self.references = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Attribute value, treating blank text as absent.
    pub fn attr(&self, field: &str) -> Option<&FieldValue> {
        self.attributes.get(field).filter(|v| !v.is_empty())
    }
}

/// Identifier + authoritative total from the quantity-summary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityRecord {
    pub identifier: String,
    pub total_quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub source_document_id: String,
    #[serde(default)]
    pub source_page: Option<u32>,
}

impl QuantityRecord {
    pub fn new(
        identifier: impl Into<String>,
        total_quantity: f64,
        source_document_id: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            total_quantity,
            unit: None,
            source_document_id: source_document_id.into(),
            source_page: None,
        }
    }
}

/// A parsed document handed to the pipeline: extraction output plus the
/// metadata needed to classify it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    pub filename: String,
    pub upload_order: u32,
    pub role_override: Option<Role>,
    /// Raw extraction output (JSON array of record objects).
    pub extraction: String,
}

/// Pre-loaded documents and images for one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconInput {
    pub documents: Vec<SourceDocument>,
    pub images: Vec<Image>,
}

// ---------------------------------------------------------------------------
// Merge output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    UnmatchedInSummary,
    SummaryOnly,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::UnmatchedInSummary => write!(f, "unmatched_in_summary"),
            Self::SummaryOnly => write!(f, "summary_only"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySource {
    QuantitySummary,
    DetailSpecification,
    None,
}

impl fmt::Display for QuantitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuantitySummary => write!(f, "quantity_summary"),
            Self::DetailSpecification => write!(f, "detail_specification"),
            Self::None => write!(f, "none"),
        }
    }
}

/// The reconciled unit of output: every raw record sharing a canonical key.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRecord {
    pub canonical_key: CanonicalKey,
    /// Display identifier: first contributing raw identifier, trimmed.
    pub identifier: String,
    pub attributes: BTreeMap<String, FieldValue>,
    pub quantity: Option<f64>,
    pub source_page: Option<u32>,
    pub contributing_source_ids: Vec<String>,
    pub quantity_source: QuantitySource,
    pub selected_image: Option<ImageRef>,
    pub match_status: MatchStatus,
    pub reference_targets: Vec<CanonicalKey>,
    /// Field name -> documents that supplied the merged value.
    pub field_sources: BTreeMap<String, Vec<String>>,
}

impl MergedRecord {
    pub fn is_dependent(&self) -> bool {
        !self.reference_targets.is_empty()
    }

    pub fn attr(&self, field: &str) -> Option<&FieldValue> {
        self.attributes.get(field)
    }
}

/// One position in the final sequence. A dependent shared by several
/// primaries occurs once per primary, each with its own anchor.
#[derive(Debug, Clone, Serialize)]
pub struct OrderedRecord {
    pub no: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<CanonicalKey>,
    #[serde(flatten)]
    pub record: MergedRecord,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_document: Option<String>,
    pub detail_documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub report: ReconciliationReport,
    pub records: Vec<OrderedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_parses_thousands_separators() {
        assert_eq!(FieldValue::from("1,250").as_number(), Some(1250.0));
        assert_eq!(FieldValue::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(FieldValue::from("ea").as_number(), None);
        assert_eq!(FieldValue::Number(239.0).as_number(), Some(239.0));
    }

    #[test]
    fn field_value_display_drops_integral_fraction() {
        assert_eq!(FieldValue::Number(239.0).to_string(), "239");
        assert_eq!(FieldValue::Number(1.74).to_string(), "1.74");
        assert_eq!(FieldValue::from("  King Bed ").to_string(), "King Bed");
    }

    #[test]
    fn blank_text_is_absent() {
        let rec = RawRecord::new("A-1", "doc1")
            .with_attr("note", "   ")
            .with_attr("brand", "Fairmont");
        assert!(rec.attr("note").is_none());
        assert_eq!(rec.attr("brand"), Some(&FieldValue::from("Fairmont")));
    }

    #[test]
    fn untagged_value_deserializes_numbers_and_text() {
        let v: BTreeMap<String, FieldValue> =
            serde_json::from_str(r#"{"qty": 12, "uom": "ea"}"#).unwrap();
        assert_eq!(v["qty"], FieldValue::Number(12.0));
        assert_eq!(v["uom"], FieldValue::Text("ea".into()));
    }
}
