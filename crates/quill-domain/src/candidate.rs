//! Candidates and their per-file state machine

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hour of day assigned to meetings dated only by their filename
pub const DEFAULT_MEETING_HOUR: u32 = 9;

/// A file path under consideration for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Absolute path of the file
    pub path: PathBuf,

    /// Lowercased extension without the dot (empty when there is none)
    pub extension: String,

    /// When the file was first observed
    pub first_seen: SystemTime,
}

impl Candidate {
    /// Create a candidate observed now
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            path,
            extension,
            first_seen: SystemTime::now(),
        }
    }

    /// File name for display and adapter requests
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// True when the file name starts with a dot
    pub fn is_hidden(&self) -> bool {
        self.file_name().starts_with('.')
    }

    /// Meeting timestamp derived from a leading `YYYY-MM-DD` in the file name
    pub fn meeting_date(&self) -> Option<NaiveDateTime> {
        let stem = self.path.file_stem()?.to_str()?;
        meeting_date_from_stem(stem)
    }
}

/// Parse a leading `YYYY-MM-DD` from a file stem.
///
/// The date is pinned to 09:00 local meeting time.
///
/// # Examples
///
/// ```
/// use quill_domain::candidate::meeting_date_from_stem;
///
/// let date = meeting_date_from_stem("2024-01-15 Standup").unwrap();
/// assert_eq!(date.to_string(), "2024-01-15 09:00:00");
/// assert!(meeting_date_from_stem("notes").is_none());
/// ```
pub fn meeting_date_from_stem(stem: &str) -> Option<NaiveDateTime> {
    let prefix = stem.get(..10)?;
    if !prefix.chars().take(4).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()?;
    let time = NaiveTime::from_hms_opt(DEFAULT_MEETING_HOUR, 0, 0)?;
    Some(date.and_time(time))
}

/// Identity of one generation of a file: path, size and modification time.
///
/// Two observations with equal fingerprints are treated as the same content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFingerprint {
    /// Normalized absolute path
    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,

    /// Modification time in nanoseconds since the Unix epoch
    pub modified_nanos: i64,
}

impl SourceFingerprint {
    /// Build a fingerprint from file metadata
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let modified_nanos = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified_nanos,
        }
    }
}

/// States a candidate moves through.
///
/// ```text
/// Detected → Stabilizing → Claimed → Extracting → Persisting → Moving → Done
///    │            │           │           │            │          │
///    └→ Skipped   ├→ Skipped  ├→ Skipped  ├→ Skipped   └→ Failed  └→ Failed
///                 └→ Failed   ├→ Failed   └→ Failed
///                             └→ Moving
/// ```
///
/// `Claimed → Moving` is taken when the completion journal shows the file
/// was already persisted by an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateState {
    /// Named by an event or a scan
    Detected,
    /// Waiting for the file size to settle
    Stabilizing,
    /// Holding the ledger claim
    Claimed,
    /// Extraction adapter in progress
    Extracting,
    /// Persistence adapter in progress
    Persisting,
    /// Relocating into the processed area
    Moving,
    /// Persisted and moved
    Done,
    /// Terminal failure; file left in place
    Failed,
    /// Terminal no-op; nothing was written
    Skipped,
}

impl CandidateState {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Detected, Stabilizing)
                | (Detected, Skipped)
                | (Stabilizing, Claimed)
                | (Stabilizing, Skipped)
                | (Stabilizing, Failed)
                // shutting down before extraction
                | (Claimed, Skipped)
                // journal unreadable
                | (Claimed, Failed)
                | (Claimed, Extracting)
                // journal hit: data is already durable
                | (Claimed, Moving)
                | (Extracting, Persisting)
                | (Extracting, Skipped)
                | (Extracting, Failed)
                | (Persisting, Moving)
                | (Persisting, Failed)
                | (Moving, Done)
                | (Moving, Failed)
        )
    }

    /// Lowercase name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Stabilizing => "stabilizing",
            Self::Claimed => "claimed",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Moving => "moving",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
