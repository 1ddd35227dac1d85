//! Identifier canonicalization.
//!
//! `normalize` is lossy on purpose: `DLX-100`, `dlx.100`, `DLX 100` and
//! `DLX__100` all collapse to `DLX-100`. Divergence between a raw identifier
//! and its canonical form is reported as a format warning, never rejected.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::NormalizeConfig;
use crate::error::ReconError;
use crate::model::CanonicalKey;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("static regex");
    static ref SEPARATOR_RUN: Regex = Regex::new(r"[\s._\-]+").expect("static regex");
}

/// Canonicalize with the default four-step rule set.
pub fn normalize(raw: &str) -> Result<CanonicalKey, ReconError> {
    Normalizer::default().normalize(raw)
}

/// Configurable normalizer. Each rule maps to one step of the default
/// algorithm; all are on by default.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    rules: NormalizeConfig,
}

impl Normalizer {
    pub fn new(rules: NormalizeConfig) -> Self {
        Self { rules }
    }

    pub fn normalize(&self, raw: &str) -> Result<CanonicalKey, ReconError> {
        if raw.trim().is_empty() {
            return Err(ReconError::InvalidIdentifier { raw: raw.to_string() });
        }

        let mut s = if self.rules.trim { raw.trim().to_string() } else { raw.to_string() };

        if self.rules.uppercase {
            s = s.to_uppercase();
        }

        if self.rules.collapse_whitespace {
            s = WHITESPACE_RUN.replace_all(&s, " ").into_owned();
        }

        if self.rules.unify_separators {
            s = SEPARATOR_RUN.replace_all(&s, "-").into_owned();
            // A bare separator run ("---") stays as "-" rather than vanishing.
            let stripped = s.trim_matches('-');
            if !stripped.is_empty() {
                s = stripped.to_string();
            }
        }

        Ok(CanonicalKey::from_normalized(s))
    }

    /// Both identifiers canonicalize to the same key.
    pub fn are_equivalent(&self, a: &str, b: &str) -> bool {
        match (self.normalize(a), self.normalize(b)) {
            (Ok(ka), Ok(kb)) => ka == kb,
            _ => false,
        }
    }

    /// Equivalent, but spelled differently once surrounding whitespace is ignored.
    pub fn is_format_different(&self, a: &str, b: &str) -> bool {
        self.are_equivalent(a, b) && a.trim() != b.trim()
    }
}
