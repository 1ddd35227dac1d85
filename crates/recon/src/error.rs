use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (duplicate document, bad policy source, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Identifier is empty or whitespace-only.
    #[error("invalid identifier: {raw:?} is empty after trimming")]
    InvalidIdentifier { raw: String },
    /// More than one document supplied quantity-summary records.
    #[error("multiple quantity summary sources in one run: {}", sources.join(", "))]
    MultipleQuantitySources { sources: Vec<String> },
    /// A quantity-summary record has a blank identifier.
    #[error("document '{document}'{}: quantity summary entry has an empty identifier", page_suffix(*page))]
    EmptyQuantityIdentifier { document: String, page: Option<u32> },
    /// A quantity-summary record carries a negative or non-finite total.
    #[error("document '{document}', item '{identifier}': invalid quantity {value}")]
    InvalidQuantity { document: String, identifier: String, value: f64 },
    /// Two documents share the same id.
    #[error("duplicate document id: {0}")]
    DuplicateDocument(String),
    /// Extraction output could not be read as a record list.
    #[error("document '{document}': cannot parse extraction output: {message}")]
    ExtractionParse { document: String, message: String },
    /// Image bytes could not be decoded far enough to read dimensions.
    #[error("document '{document}', page {page}: cannot read image dimensions: {message}")]
    ImageProbe { document: String, page: u32, message: String },
    /// Report totals do not add up.
    #[error(
        "report totals inconsistent: matched {matched} + unmatched {unmatched} + summary-only {summary_only} != total {total}"
    )]
    InconsistentTotals {
        total: usize,
        matched: usize,
        unmatched: usize,
        summary_only: usize,
    },
}

fn page_suffix(page: Option<u32>) -> String {
    match page {
        Some(p) => format!(", page {p}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_sources_lists_documents() {
        let err = ReconError::MultipleQuantitySources {
            sources: vec!["qty-a".into(), "qty-b".into()],
        };
        assert_eq!(
            err.to_string(),
            "multiple quantity summary sources in one run: qty-a, qty-b"
        );
    }

    #[test]
    fn empty_quantity_identifier_mentions_page() {
        let err = ReconError::EmptyQuantityIdentifier { document: "qty".into(), page: Some(3) };
        assert!(err.to_string().contains("'qty', page 3"));

        let err = ReconError::EmptyQuantityIdentifier { document: "qty".into(), page: None };
        assert!(err.to_string().starts_with("document 'qty':"));
    }
}
