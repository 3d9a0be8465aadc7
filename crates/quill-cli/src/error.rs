//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or unusable credentials
    #[error("Credential error: {0}")]
    Credentials(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider setup error
    #[error("LLM error: {0}")]
    Llm(#[from] quill_llm::LlmError),

    /// Store setup error
    #[error("Store error: {0}")]
    Store(#[from] quill_store::StoreError),

    /// Watcher could not start or stopped abnormally
    #[error("Watcher error: {0}")]
    Watcher(#[from] quill_watcher::WatcherError),

    /// A single-file import did not succeed
    #[error("Import failed: {0}")]
    Import(String),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Toml(_) | Self::Watcher(quill_watcher::WatcherError::Config(_)) => 1,
            Self::Credentials(_) | Self::Llm(quill_llm::LlmError::Unauthorized(_)) => 2,
            Self::Io(_) | Self::Llm(_) | Self::Store(_) | Self::Watcher(_) => 3,
            Self::Import(_) => 4,
        }
    }
}
