//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// File content is not valid UTF-8
    #[error("Content is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// Nothing to extract from
    #[error("Content is empty")]
    EmptyContent,

    /// Text exceeds maximum length
    #[error("Text too long: {0} chars (max: {1})")]
    TextTooLong(usize, usize),

    /// LLM response does not have the expected shape
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),

    /// Parsed record failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
