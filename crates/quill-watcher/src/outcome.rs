//! Terminal outcomes reported for each candidate

use crate::WatcherError;
use quill_domain::PersistedReference;
use std::fmt;

/// Why a candidate was skipped without side effects
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Extension not in the recognized set
    UnsupportedExtension(String),
    /// Dotfile, directory or something inside the processed area
    Excluded,
    /// The file disappeared before it could be processed
    Vanished,
    /// Another worker holds the claim for this path
    AlreadyInFlight,
    /// The path was completed earlier in this run
    AlreadyProcessed,
    /// Shutdown began before the candidate reached persistence
    Interrupted,
}

impl SkipReason {
    /// Short label used for metrics and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedExtension(_) => "unsupported_extension",
            Self::Excluded => "excluded",
            Self::Vanished => "vanished",
            Self::AlreadyInFlight => "already_in_flight",
            Self::AlreadyProcessed => "already_processed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension(ext) if ext.is_empty() => f.write_str("no file extension"),
            Self::UnsupportedExtension(ext) => write!(f, "unsupported extension .{}", ext),
            Self::Excluded => f.write_str("excluded"),
            Self::Vanished => f.write_str("file vanished"),
            Self::AlreadyInFlight => f.write_str("already being processed"),
            Self::AlreadyProcessed => f.write_str("already processed"),
            Self::Interrupted => f.write_str("interrupted by shutdown"),
        }
    }
}

/// Terminal result for one candidate
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Record persisted and file moved to the processed area
    Success {
        /// Reference returned by the store
        reference: PersistedReference,
        /// True when the reference came from the completion journal rather
        /// than a fresh persist
        recovered: bool,
    },
    /// Nothing was written and the file was not touched
    Skipped(SkipReason),
    /// A step failed; the file was left in the watched directory
    Failed(WatcherError),
}

impl ProcessingOutcome {
    /// Whether the candidate completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The persisted reference, if one exists for this outcome
    ///
    /// Move failures carry the reference of the record that was stored.
    pub fn reference(&self) -> Option<&PersistedReference> {
        match self {
            Self::Success { reference, .. } => Some(reference),
            Self::Failed(WatcherError::Move { reference, .. }) => Some(reference),
            _ => None,
        }
    }

    /// The skip reason, if skipped
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { reference, recovered: false } => write!(f, "imported {}", reference),
            Self::Success { reference, recovered: true } => {
                write!(f, "moved previously imported {}", reference)
            }
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}
