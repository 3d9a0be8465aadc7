//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the ingestion pipeline and
//! infrastructure. Implementations live in other crates. All of them may
//! block on the network or disk, so async callers must not invoke them on
//! a runtime worker thread.

use crate::{ExtractedRecord, PersistedReference, SourceFingerprint};
use chrono::NaiveDateTime;

/// Trait for LLM provider operations
///
/// Implemented by the infrastructure layer (quill-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Run a chat completion constrained to a JSON object response.
    ///
    /// `system` carries the instructions, `user` the material to analyze.
    /// Returns the raw text of the model's reply.
    fn complete_json(&self, system: &str, user: &str) -> Result<String, Self::Error>;
}

/// Trait for turning raw file content into a structured record
///
/// Implemented by the application layer (quill-extractor)
pub trait ExtractionAdapter {
    /// Error type for extraction operations
    type Error;

    /// Extract a record from the raw bytes of `filename`
    fn extract(&self, raw_content: &[u8], filename: &str) -> Result<ExtractedRecord, Self::Error>;
}

/// Trait for durably storing extracted records
///
/// Implemented by the infrastructure layer (quill-store)
pub trait PersistenceAdapter {
    /// Error type for persistence operations
    type Error;

    /// Store `record` for organization `org_id`.
    ///
    /// When `meeting_date` is `None` the backend stamps the current time.
    fn persist(
        &self,
        record: &ExtractedRecord,
        org_id: &str,
        meeting_date: Option<NaiveDateTime>,
    ) -> Result<PersistedReference, Self::Error>;
}

/// Trait for the on-disk record of files that were persisted but may not
/// have been moved yet.
///
/// Implemented by the infrastructure layer (quill-store)
pub trait CompletionJournal {
    /// Error type for journal operations
    type Error;

    /// Look up a previous successful persist of this exact file generation
    fn lookup(&self, fingerprint: &SourceFingerprint) -> Result<Option<PersistedReference>, Self::Error>;

    /// Record that this file generation has been persisted
    fn record(&self, fingerprint: &SourceFingerprint, reference: &PersistedReference) -> Result<(), Self::Error>;
}
