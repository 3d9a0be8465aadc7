//! Quill Domain Layer
//!
//! Value types and trait boundaries shared by every other Quill crate.
//! Nothing in here performs I/O; infrastructure lives in `quill-llm`,
//! `quill-store` and `quill-watcher`.
//!
//! ## Key Concepts
//!
//! - **Candidate**: a file in the watched directory under consideration for ingestion
//! - **ExtractedRecord**: the structured note produced from a file's content
//! - **PersistedReference**: the durable identifier returned by the store
//! - **SourceFingerprint**: path + size + mtime, the key of the completion journal
//!
//! ## Boundaries
//!
//! The traits in [`traits`] are the seams between the pipeline and the
//! outside world. They are synchronous on purpose: callers that live on an
//! async runtime run them on the blocking pool.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod record;
pub mod reference;
pub mod traits;

// Re-exports for convenience
pub use candidate::{Candidate, CandidateState, SourceFingerprint};
pub use record::{ExtractedRecord, TaggedItem, MAX_TITLE_LENGTH};
pub use reference::{PersistedReference, RecordId};
