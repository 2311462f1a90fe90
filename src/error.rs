use thiserror::Error;

use crate::schema::Section;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Unknown field '{field}' requested from section '{section}'")]
    UnknownField { section: Section, field: String },

    #[error("Document extraction failed: {0}")]
    ExtractionFailed(String),

    #[cfg(feature = "llm")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
