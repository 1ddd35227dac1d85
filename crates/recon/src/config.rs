use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::role::Role;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<DocumentConfig>,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub references: ReferenceConfig,
}

impl ReconConfig {
    /// Config with every section at its default. Useful for engine callers
    /// that build inputs in memory.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Vec::new(),
            roles: RoleConfig::default(),
            normalize: NormalizeConfig::default(),
            merge: MergeConfig::default(),
            images: ImageConfig::default(),
            references: ReferenceConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// One uploaded document. Array position is the upload order unless
/// `upload_order` is given explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    pub id: String,
    /// Extraction output (JSON), relative to the config file.
    pub file: String,
    /// Original document filename, used for role classification.
    /// Falls back to `file` when absent.
    #[serde(default)]
    pub filename: Option<String>,
    /// Forced role, bypassing the filename heuristic.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub upload_order: Option<u32>,
}

impl DocumentConfig {
    pub fn display_filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.file)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Case-insensitive filename keywords marking a quantity summary.
    #[serde(default = "default_quantity_keywords")]
    pub quantity_keywords: Vec<String>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            quantity_keywords: default_quantity_keywords(),
        }
    }
}

fn default_quantity_keywords() -> Vec<String> {
    ["qty", "overall", "summary", "quantity", "quantities", "數量", "總量", "總表"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default = "enabled")]
    pub trim: bool,
    #[serde(default = "enabled")]
    pub uppercase: bool,
    #[serde(default = "enabled")]
    pub collapse_whitespace: bool,
    /// Collapse runs of `.`, `-`, `_` and whitespace into a single `-`.
    #[serde(default = "enabled")]
    pub unify_separators: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            trim: true,
            uppercase: true,
            collapse_whitespace: true,
            unify_separators: true,
        }
    }
}

fn enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Merge policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_quantity_field")]
    pub quantity_field: String,
    #[serde(default = "default_unit_field")]
    pub unit_field: String,
    /// Per-field policies. Fields not listed use `fill_empty`.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldPolicy>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            quantity_field: default_quantity_field(),
            unit_field: default_unit_field(),
            fields: BTreeMap::new(),
        }
    }
}

impl MergeConfig {
    pub fn policy_for(&self, field: &str) -> &FieldPolicy {
        static FILL_EMPTY: FieldPolicy = FieldPolicy::FillEmpty;
        self.fields.get(field).unwrap_or(&FILL_EMPTY)
    }
}

fn default_quantity_field() -> String {
    "quantity".into()
}

fn default_unit_field() -> String {
    "unit".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FieldPolicy {
    /// First non-empty value by ascending upload order.
    FillEmpty,
    /// Distinct non-empty values in upload order, joined by `separator`.
    Concatenate {
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// The named document's value when it has one, otherwise `fill_empty`.
    Override { source: String },
}

fn default_separator() -> String {
    ", ".into()
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Images for a record on page N are looked up on page N + offset.
    #[serde(default = "default_page_offset")]
    pub page_offset: i32,
    /// Images smaller than this (width * height) are treated as logos/icons.
    #[serde(default = "default_min_area")]
    pub min_area_px: u64,
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    /// Image manifest (JSON), relative to the config file. CLI only.
    #[serde(default)]
    pub manifest: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            page_offset: default_page_offset(),
            min_area_px: default_min_area(),
            exclusions: Vec::new(),
            manifest: None,
        }
    }
}

fn default_page_offset() -> i32 {
    1
}

fn default_min_area() -> u64 {
    10_000
}

/// Size-based exclusion (swatches, hardware details).
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionRule {
    pub label: String,
    #[serde(default)]
    pub max_area_px: Option<u64>,
    #[serde(default)]
    pub max_width_px: Option<u32>,
    #[serde(default)]
    pub max_height_px: Option<u32>,
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceConfig {
    /// Attribute whose text ("Vinyl to DLX-100, DLX-101") yields reference
    /// targets for records that carry no explicit reference list.
    #[serde(default)]
    pub derive_from: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        // Document ids must be unique
        let mut seen = HashSet::new();
        for doc in &self.documents {
            if doc.id.trim().is_empty() {
                return Err(ReconError::ConfigValidation("document id must not be empty".into()));
            }
            if !seen.insert(doc.id.as_str()) {
                return Err(ReconError::DuplicateDocument(doc.id.clone()));
            }
        }

        let merge = &self.merge;
        if merge.quantity_field.trim().is_empty() || merge.unit_field.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "merge.quantity_field and merge.unit_field must not be empty".into(),
            ));
        }
        if merge.quantity_field == merge.unit_field {
            return Err(ReconError::ConfigValidation(format!(
                "merge.quantity_field and merge.unit_field are both '{}'",
                merge.quantity_field
            )));
        }

        // Quantity follows the summary override rule, never a field policy
        if merge.fields.contains_key(&merge.quantity_field) {
            return Err(ReconError::ConfigValidation(format!(
                "field '{}' is the quantity field and cannot carry a merge policy",
                merge.quantity_field
            )));
        }

        // Override sources must name a declared document
        if !self.documents.is_empty() {
            for (field, policy) in &merge.fields {
                if let FieldPolicy::Override { source } = policy {
                    if !seen.contains(source.as_str()) {
                        return Err(ReconError::ConfigValidation(format!(
                            "field '{field}': override source '{source}' is not a declared document"
                        )));
                    }
                }
            }
        }

        for rule in &self.images.exclusions {
            let bounded_box = rule.max_width_px.is_some() && rule.max_height_px.is_some();
            if rule.max_area_px.is_none() && !bounded_box {
                return Err(ReconError::ConfigValidation(format!(
                    "image exclusion '{}' needs max_area_px or both max_width_px and max_height_px",
                    rule.label
                )));
            }
        }

        if let Some(ref field) = self.references.derive_from {
            if field.trim().is_empty() {
                return Err(ReconError::ConfigValidation(
                    "references.derive_from must not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
