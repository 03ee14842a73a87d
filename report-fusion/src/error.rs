use thiserror::Error;

use crate::models::ReportSection;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Summarization of {section} failed for case {uid}: {message}")]
    Summarization {
        uid: String,
        section: ReportSection,
        message: String,
    },

    #[error("Invalid fusion configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FusionError>;
