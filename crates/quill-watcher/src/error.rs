//! Error types for the ingestion pipeline

use quill_domain::PersistedReference;
use thiserror::Error;

/// Errors that can occur while watching or processing a candidate
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory subscription error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// File never stopped changing within the stability budget
    #[error("File did not stabilize after {attempts} attempt(s)")]
    StabilityTimeout {
        /// Number of stability waits performed
        attempts: u32,
    },

    /// Extraction adapter failed or produced an unusable record
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Persistence adapter failed; the file was not moved
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// The record is stored but the file could not be moved
    #[error("Move failed after persisting {reference}: {message}")]
    Move {
        /// Reference of the already stored record
        reference: PersistedReference,
        /// Underlying failure
        message: String,
    },

    /// Completion journal could not be read
    #[error("Journal error: {0}")]
    Journal(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}

impl WatcherError {
    /// Short kind label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Watch(_) => "watch",
            Self::StabilityTimeout { .. } => "stability_timeout",
            Self::Extraction(_) => "extraction",
            Self::Persistence(_) => "persistence",
            Self::Move { .. } => "move",
            Self::Journal(_) => "journal",
            Self::Worker(_) => "worker",
        }
    }
}

impl From<tokio::task::JoinError> for WatcherError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Worker(e.to_string())
    }
}
