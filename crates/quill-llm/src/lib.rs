//! Quill LLM Provider Layer
//!
//! Pluggable LLM provider implementations of the `LlmProvider` trait from
//! `quill-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: OpenAI-compatible chat-completions API
//!
//! # Examples
//!
//! ```
//! use quill_llm::MockProvider;
//! use quill_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new(r#"{"title": "Sync"}"#);
//! let result = provider.complete_json("system", "user").unwrap();
//! assert_eq!(result, r#"{"title": "Sync"}"#);
//! ```

#![warn(missing_docs)]

pub mod openai;

use quill_domain::traits::LlmProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use openai::OpenAiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// API key rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls.
/// Responses can be keyed by the user message.
///
/// # Examples
///
/// ```
/// use quill_llm::MockProvider;
/// use quill_domain::traits::LlmProvider;
///
/// let mut provider = MockProvider::default();
/// provider.add_response("Filename: a.md", "{}");
/// assert_eq!(provider.complete_json("sys", "Filename: a.md").unwrap(), "{}");
/// assert_eq!(provider.call_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, Option<String>>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Add a specific response for a given user message
    pub fn add_response(&mut self, user: impl Into<String>, response: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(user.into(), Some(response.into()));
        }
    }

    /// Configure to return an error for a specific user message
    pub fn add_error(&mut self, user: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(user.into(), None);
        }
    }

    /// Get the number of times the provider was called
    pub fn call_count(&self) -> usize {
        self.call_count.lock().map(|c| *c).unwrap_or(0)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        if let Ok(mut count) = self.call_count.lock() {
            *count = 0;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmProvider for MockProvider {
    type Error = LlmError;

    fn complete_json(&self, _system: &str, user: &str) -> Result<String, Self::Error> {
        if let Ok(mut count) = self.call_count.lock() {
            *count += 1;
        }

        let responses = self
            .responses
            .lock()
            .map_err(|e| LlmError::Other(format!("Mock lock poisoned: {}", e)))?;
        match responses.get(user) {
            Some(Some(response)) => Ok(response.clone()),
            Some(None) => Err(LlmError::Other("Mock error".to_string())),
            None => Ok(self.default_response.clone()),
        }
    }
}
