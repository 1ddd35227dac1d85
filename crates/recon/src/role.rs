use serde::{Deserialize, Serialize};

use crate::config::RoleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    QuantitySummary,
    DetailSpecification,
    Unknown,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuantitySummary => write!(f, "quantity_summary"),
            Self::DetailSpecification => write!(f, "detail_specification"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// How a role was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    Manual,
    Filename,
}

/// Assign a document role. A manual override always wins; otherwise any
/// quantity keyword in the filename (case-insensitive) marks a quantity
/// summary and everything else is a detail specification.
pub fn classify(filename: &str, override_role: Option<Role>, config: &RoleConfig) -> Role {
    classify_with_source(filename, override_role, config).0
}

pub fn classify_with_source(
    filename: &str,
    override_role: Option<Role>,
    config: &RoleConfig,
) -> (Role, RoleSource) {
    if let Some(role) = override_role {
        return (role, RoleSource::Manual);
    }

    if filename.trim().is_empty() {
        return (Role::Unknown, RoleSource::Filename);
    }

    let lower = filename.to_lowercase();
    let is_summary = config
        .quantity_keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .any(|k| lower.contains(&k.to_lowercase()));

    if is_summary {
        (Role::QuantitySummary, RoleSource::Filename)
    } else {
        (Role::DetailSpecification, RoleSource::Filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> RoleConfig {
        RoleConfig::default()
    }

    #[test]
    fn quantity_keywords_match_case_insensitively() {
        assert_eq!(classify("Bay Tower - Overall Qty.pdf", None, &roles()), Role::QuantitySummary);
        assert_eq!(classify("QUANTITY SUMMARY.PDF", None, &roles()), Role::QuantitySummary);
        assert_eq!(classify("數量總表.pdf", None, &roles()), Role::QuantitySummary);
    }

    #[test]
    fn everything_else_is_detail() {
        assert_eq!(classify("Casegoods & Seatings.pdf", None, &roles()), Role::DetailSpecification);
        assert_eq!(classify("Fabric.pdf", None, &roles()), Role::DetailSpecification);
    }

    #[test]
    fn blank_filename_is_unknown() {
        assert_eq!(classify("   ", None, &roles()), Role::Unknown);
    }

    #[test]
    fn override_wins() {
        let (role, source) =
            classify_with_source("Overall Qty.pdf", Some(Role::DetailSpecification), &roles());
        assert_eq!(role, Role::DetailSpecification);
        assert_eq!(source, RoleSource::Manual);

        assert_eq!(classify("", Some(Role::QuantitySummary), &roles()), Role::QuantitySummary);
    }

    #[test]
    fn custom_keywords() {
        let config = RoleConfig { quantity_keywords: vec!["TOTALS".into()] };
        assert_eq!(classify("Project totals.pdf", None, &config), Role::QuantitySummary);
        assert_eq!(classify("Overall Qty.pdf", None, &config), Role::DetailSpecification);
    }
}
