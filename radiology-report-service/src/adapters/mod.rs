//! HTTP-backed implementations of the fusion collaborators.

pub mod classifier;
pub mod imaging;
pub mod openrouter;
pub mod pubmed;
pub mod report_generator;
pub mod summarizer;

pub use classifier::HttpClassifier;
pub use pubmed::PubMedSearch;
pub use report_generator::VisionReportGenerator;
pub use summarizer::LlmSummarizer;
