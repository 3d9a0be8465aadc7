//! Quill Storage Layer
//!
//! Implements the `PersistenceAdapter` and `CompletionJournal` traits.
//!
//! # Backends
//!
//! - `SupabaseStore`: inserts notes and action items through Supabase's
//!   PostgREST API
//! - `SqliteStore`: local SQLite database with the same two tables, for
//!   offline use and tests
//! - `SqliteJournal`: on-disk `(path, size, mtime) → reference` journal
//!   written after a successful persist and before the file is moved
//!
//! # Examples
//!
//! ```
//! use quill_domain::traits::PersistenceAdapter;
//! use quill_domain::ExtractedRecord;
//! use quill_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! let record = ExtractedRecord::new("Standup", "Notes");
//! let reference = store.persist(&record, "org-1", None).unwrap();
//! assert_eq!(reference.item_count, 0);
//! ```

#![warn(missing_docs)]

mod journal;
mod sqlite;
mod supabase;

use thiserror::Error;

pub use journal::SqliteJournal;
pub use sqlite::{SqliteStore, StoredNote};
pub use supabase::SupabaseStore;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Network or HTTP-level failure talking to the remote store
    #[error("Connection error: {0}")]
    Connection(String),

    /// Credentials rejected by the remote store
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The store rejected the data
    #[error("Rejected by store: {0}")]
    Rejected(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Lock poisoned by a panicking thread
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Status stamped on notes created by the importer
pub const NOTE_STATUS: &str = "published";

/// Status stamped on newly created action items
pub const ITEM_STATUS: &str = "open";

/// Format a zone-less timestamp the way both backends store it
pub(crate) fn format_timestamp(ts: chrono::NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}
