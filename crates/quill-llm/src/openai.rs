//! OpenAI Provider Implementation
//!
//! Talks to any OpenAI-compatible chat-completions endpoint using JSON
//! response mode.
//!
//! # Features
//!
//! - Configurable endpoint, model and request timeout
//! - Retry logic with exponential backoff for transient failures
//! - Distinct errors for bad credentials and unknown models
//!
//! The provider uses the blocking `reqwest` client. Call it from a plain
//! thread or from `tokio::task::spawn_blocking`, never directly on an async
//! runtime worker.

use crate::LlmError;
use quill_domain::traits::LlmProvider;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Default model; notes arrive already summarized so a small model suffices
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default timeout for a single request
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// OpenAI chat-completions provider
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quill_llm::OpenAiProvider;
    /// use std::time::Duration;
    ///
    /// let provider = OpenAiProvider::new("sk-...", "gpt-4o-mini", Duration::from_secs(60)).unwrap();
    /// ```
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Point the provider at a different OpenAI-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Model name used for requests
    pub fn model(&self) -> &str {
        &self.model
    }

    fn send_once(&self, url: &str, body: &ChatRequest<'_>) -> Result<String, Attempt> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| Attempt::Retry(LlmError::Communication(format!("Request failed: {}", e))))?;

        let status = response.status();
        if status.is_success() {
            let parsed: ChatResponse = response.json().map_err(|e| {
                Attempt::Fatal(LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
            })?;
            return parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| {
                    Attempt::Fatal(LlmError::InvalidResponse("Response has no content".to_string()))
                });
        }

        let error_text = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(Attempt::Fatal(LlmError::Unauthorized(format!("HTTP {}", status))))
            }
            reqwest::StatusCode::NOT_FOUND => {
                Err(Attempt::Fatal(LlmError::ModelNotAvailable(self.model.clone())))
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(Attempt::Retry(LlmError::RateLimitExceeded)),
            s if s.is_server_error() => Err(Attempt::Retry(LlmError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )))),
            _ => Err(Attempt::Fatal(LlmError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, error_text
            )))),
        }
    }
}

/// Classification of one failed attempt
enum Attempt {
    Retry(LlmError),
    Fatal(LlmError),
}

impl LlmProvider for OpenAiProvider {
    type Error = LlmError;

    fn complete_json(&self, system: &str, user: &str) -> Result<String, Self::Error> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self.send_once(&url, &body) {
                Ok(content) => {
                    debug!("Completion received ({} chars)", content.len());
                    return Ok(content);
                }
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    warn!("Completion attempt {} failed: {}", attempts + 1, e);
                    last_error = Some(e);
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                std::thread::sleep(Duration::from_secs(2u64.pow(attempts - 1)));
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}
