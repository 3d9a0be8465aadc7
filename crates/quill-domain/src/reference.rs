//! Persisted references - proof that a record is durably stored

use std::fmt;

/// Identifier assigned to a record by the persistence backend.
///
/// Backends own the format (Supabase returns its own UUIDs, the local
/// SQLite store mints UUIDv7s), so the value is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a backend-provided identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh UUIDv7 identifier (chronologically sortable)
    ///
    /// # Examples
    ///
    /// ```
    /// use quill_domain::RecordId;
    ///
    /// let id = RecordId::generate();
    /// assert_eq!(id.as_str().len(), 36);
    /// ```
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful persist call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReference {
    /// Identifier of the stored record
    pub record_id: RecordId,

    /// Number of tagged items stored alongside the record
    pub item_count: usize,
}

impl PersistedReference {
    /// Create a new reference
    pub fn new(record_id: RecordId, item_count: usize) -> Self {
        Self {
            record_id,
            item_count,
        }
    }
}

impl fmt::Display for PersistedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} items)", self.record_id, self.item_count)
    }
}
