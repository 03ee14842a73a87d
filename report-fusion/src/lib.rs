//! Fusion core for chest radiograph reporting.
//!
//! Combines per-image pathology scores and per-view generated report text into one
//! length-bounded findings/impression pair. The models themselves live behind the
//! traits in [`collaborators`]; everything in this crate is deterministic given their
//! outputs.

pub mod aggregate;
pub mod budget;
pub mod collaborators;
pub mod enrich;
pub mod error;
pub mod findings;
pub mod models;
pub mod pipeline;
pub mod scores;
pub mod view;

// Re-export commonly used types
pub use aggregate::aggregate_scores;
pub use budget::SummaryBudget;
pub use collaborators::{
    Classifier, Collaborators, LiteratureSearch, ReportGenerator, Summarizer, Throttled,
};
pub use enrich::LiteratureEnricher;
pub use error::{FusionError, Result};
pub use findings::{DEFAULT_THRESHOLD, JoinStyle, textualize_findings};
pub use models::{EnrichedRecord, FusedRecord, PatientCase, ReportSection, Study};
pub use pipeline::{FailedViewPolicy, FusionConfig, ReportFusionPipeline};
pub use scores::{PATHOLOGY_VOCABULARY, PathologyScoreMap};
pub use view::{ViewKind, ViewOutcome, ViewReport, ViewStatus, select_largest_image};
