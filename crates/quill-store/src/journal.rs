//! Completion journal
//!
//! Remembers which file generations were persisted so that a crash between
//! persisting and moving does not produce a duplicate record on restart.
//! Entries are keyed by `(path, size, mtime)`: an edited file with the same
//! name is a new generation and gets processed again.

use crate::StoreError;
use chrono::Local;
use quill_domain::traits::CompletionJournal;
use quill_domain::{PersistedReference, RecordId, SourceFingerprint};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS completions (
    path TEXT NOT NULL,
    size INTEGER NOT NULL,
    modified_nanos INTEGER NOT NULL,
    record_id TEXT NOT NULL,
    item_count INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (path, size, modified_nanos)
);
";

/// SQLite implementation of `CompletionJournal`
pub struct SqliteJournal {
    conn: Mutex<Connection>,
}

impl SqliteJournal {
    /// Open (or create) a journal at `path`
    ///
    /// `:memory:` gives a journal that only lives as long as the process.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of journal entries
    pub fn len(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM completions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the journal has no entries
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

fn key(fingerprint: &SourceFingerprint) -> Result<(String, i64), StoreError> {
    let size = i64::try_from(fingerprint.size)
        .map_err(|_| StoreError::InvalidData(format!("file size {} out of range", fingerprint.size)))?;
    Ok((fingerprint.path.to_string_lossy().into_owned(), size))
}

impl CompletionJournal for SqliteJournal {
    type Error = StoreError;

    fn lookup(&self, fingerprint: &SourceFingerprint) -> Result<Option<PersistedReference>, Self::Error> {
        let (path, size) = key(fingerprint)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let entry = conn
            .query_row(
                "SELECT record_id, item_count FROM completions
                 WHERE path = ?1 AND size = ?2 AND modified_nanos = ?3",
                params![path, size, fingerprint.modified_nanos],
                |row| {
                    let record_id: String = row.get(0)?;
                    let item_count: i64 = row.get(1)?;
                    Ok((record_id, item_count))
                },
            )
            .optional()?;

        Ok(entry.map(|(record_id, item_count)| {
            PersistedReference::new(RecordId::new(record_id), item_count.max(0) as usize)
        }))
    }

    fn record(&self, fingerprint: &SourceFingerprint, reference: &PersistedReference) -> Result<(), Self::Error> {
        let (path, size) = key(fingerprint)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        conn.execute(
            "INSERT OR REPLACE INTO completions
             (path, size, modified_nanos, record_id, item_count, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                path,
                size,
                fingerprint.modified_nanos,
                reference.record_id.as_str(),
                reference.item_count as i64,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
