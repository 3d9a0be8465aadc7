//! SQLite-backed persistence adapter

use crate::{format_timestamp, StoreError, ITEM_STATUS, NOTE_STATUS};
use chrono::{Local, NaiveDateTime};
use quill_domain::traits::PersistenceAdapter;
use quill_domain::{ExtractedRecord, PersistedReference, RecordId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// SQLite implementation of `PersistenceAdapter`
///
/// Notes and their action items are written in one transaction, so a note
/// is never visible without its items.
///
/// # Thread Safety
///
/// The connection sits behind a mutex; concurrent persists are serialized.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// A note as read back from the local store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNote {
    /// Record identifier
    pub id: String,
    /// Owning organization
    pub org_id: String,
    /// Meeting title
    pub title: String,
    /// Notes body
    pub content: String,
    /// Meeting timestamp, `YYYY-MM-DDTHH:MM:SS`
    pub meeting_date: String,
    /// Tags (empty when none were stored)
    pub tags: Vec<String>,
    /// Action item titles in order
    pub item_titles: Vec<String>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored notes
    pub fn note_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM meeting_notes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Fetch a note and its action item titles
    pub fn fetch_note(&self, id: &RecordId) -> Result<Option<StoredNote>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let note = conn
            .query_row(
                "SELECT id, org_id, title, content, meeting_date, tags FROM meeting_notes WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    let tags: Option<String> = row.get(5)?;
                    Ok((
                        StoredNote {
                            id: row.get(0)?,
                            org_id: row.get(1)?,
                            title: row.get(2)?,
                            content: row.get(3)?,
                            meeting_date: row.get(4)?,
                            tags: Vec::new(),
                            item_titles: Vec::new(),
                        },
                        tags,
                    ))
                },
            )
            .optional()?;

        let Some((mut note, tags)) = note else {
            return Ok(None);
        };

        if let Some(tags) = tags {
            note.tags = serde_json::from_str(&tags)
                .map_err(|e| StoreError::InvalidData(format!("tags column: {}", e)))?;
        }

        let mut stmt =
            conn.prepare("SELECT title FROM action_items WHERE note_id = ?1 ORDER BY position")?;
        note.item_titles = stmt
            .query_map(params![id.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(Some(note))
    }
}

impl PersistenceAdapter for SqliteStore {
    type Error = StoreError;

    fn persist(
        &self,
        record: &ExtractedRecord,
        org_id: &str,
        meeting_date: Option<NaiveDateTime>,
    ) -> Result<PersistedReference, Self::Error> {
        let now = Local::now().naive_local();
        let meeting_date = format_timestamp(meeting_date.unwrap_or(now));
        let tags = if record.tags.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&record.tags)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            )
        };

        let id = RecordId::generate();
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO meeting_notes (id, org_id, title, content, meeting_date, tags, status, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.as_str(),
                org_id,
                &record.title,
                &record.body,
                &meeting_date,
                tags,
                NOTE_STATUS,
                format_timestamp(now),
            ],
        )?;

        for (position, item) in record.items.iter().enumerate() {
            tx.execute(
                "INSERT INTO action_items (id, note_id, position, title, description, assignee_name, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    RecordId::generate().as_str(),
                    id.as_str(),
                    position as i64,
                    &item.title,
                    &item.description,
                    &item.assignee_name,
                    ITEM_STATUS,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Stored note {} with {} action items", id, record.item_count());

        Ok(PersistedReference::new(id, record.item_count()))
    }
}
