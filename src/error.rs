// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::utils::Validator;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    /// Only ever observed inside a location resolver, which downgrades it to an absent location.
    #[error("Location lookup failed: {0}")]
    LocationLookup(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether the interactive session can keep accepting queries after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PipelineError::Config(_))
    }

    /// The message on a single line, with upstream response bodies flattened.
    pub fn one_line(&self) -> String {
        Validator::normalize_whitespace(&self.to_string())
    }
}
