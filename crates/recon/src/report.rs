//! Reconciliation report: counts and warnings accumulated during a run.

use serde::Serialize;

use crate::error::ReconError;
use crate::model::{CanonicalKey, MatchStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatWarning {
    pub original: String,
    pub normalized: String,
    pub source_document_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub source_document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub dependent: CanonicalKey,
    pub target: CanonicalKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredDocument {
    pub document_id: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub total_records: usize,
    pub matched_count: usize,
    pub unmatched_in_summary_count: usize,
    pub summary_only_count: usize,
    pub quantity_summary_available: bool,
    pub identifier_format_warnings: Vec<FormatWarning>,
    pub quantity_unverified: Vec<CanonicalKey>,
    pub rejected_records: Vec<RejectedRecord>,
    pub missing_images: Vec<CanonicalKey>,
    pub orphaned_dependents: Vec<CanonicalKey>,
    pub dangling_references: Vec<DanglingReference>,
    pub duplicate_quantity_keys: Vec<CanonicalKey>,
    pub ignored_documents: Vec<IgnoredDocument>,
    pub warnings: Vec<String>,
}

impl ReconciliationReport {
    /// Percentage of records matched against the quantity summary.
    pub fn match_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.matched_count as f64 / self.total_records as f64 * 100.0
    }

    /// Anything a reviewer should look at before accepting the output.
    pub fn needs_review(&self) -> bool {
        self.unmatched_in_summary_count > 0
            || self.summary_only_count > 0
            || !self.quantity_summary_available
            || !self.identifier_format_warnings.is_empty()
            || !self.rejected_records.is_empty()
            || !self.orphaned_dependents.is_empty()
            || !self.dangling_references.is_empty()
            || !self.duplicate_quantity_keys.is_empty()
    }
}

/// Additive report builder. Components push entries as they run;
/// `finish` checks the totals add up.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    matched: usize,
    unmatched_in_summary: usize,
    summary_only: usize,
    quantity_summary_available: bool,
    format_warnings: Vec<FormatWarning>,
    quantity_unverified: Vec<CanonicalKey>,
    rejected: Vec<RejectedRecord>,
    missing_images: Vec<CanonicalKey>,
    orphans: Vec<CanonicalKey>,
    dangling: Vec<DanglingReference>,
    duplicate_quantity_keys: Vec<CanonicalKey>,
    ignored_documents: Vec<IgnoredDocument>,
    warnings: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&mut self, status: MatchStatus) {
        match status {
            MatchStatus::Matched => self.matched += 1,
            MatchStatus::UnmatchedInSummary => self.unmatched_in_summary += 1,
            MatchStatus::SummaryOnly => self.summary_only += 1,
        }
    }

    pub fn set_quantity_summary_available(&mut self, available: bool) {
        self.quantity_summary_available = available;
        if !available {
            self.warn("no quantity summary available; quantities come from detail specifications only");
        }
    }

    /// Record a raw identifier that differs from its canonical form.
    /// The same (original, normalized, source) triple is kept once.
    pub fn format_warning(&mut self, original: &str, normalized: &CanonicalKey, source_document_id: &str) {
        let warning = FormatWarning {
            original: original.trim().to_string(),
            normalized: normalized.to_string(),
            source_document_id: source_document_id.to_string(),
        };
        if !self.format_warnings.contains(&warning) {
            self.format_warnings.push(warning);
        }
    }

    pub fn quantity_unverified(&mut self, key: &CanonicalKey) {
        self.quantity_unverified.push(key.clone());
    }

    pub fn reject(&mut self, source_document_id: &str, source_page: Option<u32>, reason: impl Into<String>) {
        self.rejected.push(RejectedRecord {
            source_document_id: source_document_id.to_string(),
            source_page,
            reason: reason.into(),
        });
    }

    pub fn missing_image(&mut self, key: &CanonicalKey) {
        self.missing_images.push(key.clone());
    }

    pub fn orphan(&mut self, key: &CanonicalKey) {
        self.orphans.push(key.clone());
    }

    pub fn dangling(&mut self, dependent: &CanonicalKey, target: &CanonicalKey) {
        self.dangling.push(DanglingReference {
            dependent: dependent.clone(),
            target: target.clone(),
        });
    }

    pub fn duplicate_quantity_key(&mut self, key: &CanonicalKey) {
        if !self.duplicate_quantity_keys.contains(key) {
            self.duplicate_quantity_keys.push(key.clone());
        }
    }

    pub fn ignore_document(&mut self, document_id: &str, filename: &str) {
        self.ignored_documents.push(IgnoredDocument {
            document_id: document_id.to_string(),
            filename: filename.to_string(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Close the report over `total_records` merged records.
    pub fn finish(self, total_records: usize) -> Result<ReconciliationReport, ReconError> {
        let counted = self.matched + self.unmatched_in_summary + self.summary_only;
        if counted != total_records {
            return Err(ReconError::InconsistentTotals {
                total: total_records,
                matched: self.matched,
                unmatched: self.unmatched_in_summary,
                summary_only: self.summary_only,
            });
        }

        Ok(ReconciliationReport {
            total_records,
            matched_count: self.matched,
            unmatched_in_summary_count: self.unmatched_in_summary,
            summary_only_count: self.summary_only,
            quantity_summary_available: self.quantity_summary_available,
            identifier_format_warnings: self.format_warnings,
            quantity_unverified: self.quantity_unverified,
            rejected_records: self.rejected,
            missing_images: self.missing_images,
            orphaned_dependents: self.orphans,
            dangling_references: self.dangling,
            duplicate_quantity_keys: self.duplicate_quantity_keys,
            ignored_documents: self.ignored_documents,
            warnings: self.warnings,
        })
    }
}
