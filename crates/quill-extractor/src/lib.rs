//! Quill Extractor
//!
//! Converts a meeting-notes export into an [`ExtractedRecord`] using an LLM.
//!
//! # Architecture
//!
//! ```text
//! bytes + filename → content preparation → prompt → LLM → parser → ExtractedRecord
//! ```
//!
//! - **Content preparation**: UTF-8 decoding, and for `.json` exports a
//!   best-effort pick of the `transcript` / `content` / `notes` field
//! - **Prompting**: a fixed system prompt plus the filename and content
//! - **Parsing**: tolerant of markdown code fences; drops malformed action
//!   items instead of failing the whole record
//! - **Validation**: the finished record must pass
//!   [`ExtractedRecord::validate`]
//!
//! # Example Usage
//!
//! ```
//! use quill_extractor::{Extractor, ExtractorConfig};
//! use quill_domain::traits::ExtractionAdapter;
//! use quill_llm::MockProvider;
//!
//! let llm = MockProvider::new(r#"{
//!     "title": "Planning",
//!     "summary": "We planned.",
//!     "action_items": [{"title": "Book room", "assignee_name": "Ana"}],
//!     "tags": ["planning"]
//! }"#);
//! let extractor = Extractor::new(llm, ExtractorConfig::default());
//!
//! let record = extractor.extract(b"raw notes", "planning.md").unwrap();
//! assert_eq!(record.title, "Planning");
//! assert_eq!(record.item_count(), 1);
//! ```
//!
//! [`ExtractedRecord`]: quill_domain::ExtractedRecord
//! [`ExtractedRecord::validate`]: quill_domain::ExtractedRecord::validate

#![warn(missing_docs)]

mod config;
mod content;
mod error;
mod extractor;
mod parser;
mod prompt;


pub use config::ExtractorConfig;
pub use content::prepare_content;
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use parser::parse_llm_response;
pub use prompt::{build_user_message, SYSTEM_PROMPT};
