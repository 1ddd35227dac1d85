//! `specmerge-recon` — Cross-document reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded extraction output and images,
//! returns ordered, merged records plus a reconciliation report.
//! No CLI or filesystem dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod loader;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod ordering;
pub mod references;
pub mod report;
pub mod role;

pub use config::ReconConfig;
pub use engine::run;
pub use error::ReconError;
pub use image::{Image, ImageRef};
pub use merge::merge;
pub use model::{
    CanonicalKey, FieldValue, MatchStatus, MergedRecord, OrderedRecord, QuantityRecord, QuantitySource, RawRecord,
    ReconInput, ReconResult, SourceDocument,
};
pub use normalize::{normalize, Normalizer};
pub use ordering::order;
pub use report::ReconciliationReport;
pub use role::{classify, Role};
