//! Quill Watcher
//!
//! Watches a directory of meeting-notes exports and drives each new file
//! through extraction, persistence and relocation.
//!
//! # Overview
//!
//! Every file (a *candidate*) goes through the same state machine:
//!
//! ```text
//! Detected → Stabilizing → Claimed → Extracting → Persisting → Moving → Done
//! ```
//!
//! - **Stabilizing**: the [`StabilityDetector`] polls the size until it stops
//!   changing, so half-written exports are never read.
//! - **Claimed**: the [`IngestionLedger`] grants at most one claim per
//!   normalized path.
//! - **Extracting / Persisting**: the `ExtractionAdapter` and
//!   `PersistenceAdapter` run on the blocking pool.
//! - **Moving**: the [`FileMover`] renames the file into the processed
//!   directory. This only happens after the record is stored; any earlier
//!   failure leaves the file in place for the next scan.
//!
//! A `CompletionJournal` entry is written between persisting and moving, so a
//! crash in that window does not create a duplicate record on restart.
//!
//! # Usage
//!
//! ## Single Pass
//!
//! ```no_run
//! use quill_extractor::{Extractor, ExtractorConfig};
//! use quill_llm::MockProvider;
//! use quill_store::{SqliteJournal, SqliteStore};
//! use quill_watcher::{Pipeline, Watcher, WatcherConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(
//!     Arc::new(Extractor::new(MockProvider::default(), ExtractorConfig::default())),
//!     Arc::new(SqliteStore::new(":memory:")?),
//!     Arc::new(SqliteJournal::new(":memory:")?),
//!     "org-1",
//!     WatcherConfig::default(),
//!     "/tmp/inbox",
//! );
//! let metrics = Watcher::new(pipeline).scan_once(CancellationToken::new()).await?;
//! println!("{}", metrics.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [watcher]
//! extensions = ["txt", "md", "json"]
//! processed_dir = "processed"
//! poll_interval_ms = 1000
//! stable_polls = 2
//! stability_timeout_secs = 30
//! stability_retries = 1
//! max_workers = 4
//! event_buffer = 256
//! rescan_interval_secs = 300
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod events;
mod ledger;
mod metrics;
mod mover;
mod outcome;
mod pipeline;
mod stability;
mod watcher;

pub use config::WatcherConfig;
pub use error::WatcherError;
pub use events::{appeared_paths, DirectoryEvents};
pub use ledger::{normalize_path, ClaimToken, IngestionLedger};
pub use metrics::WatcherMetrics;
pub use mover::{FileMover, MoveResult};
pub use outcome::{ProcessingOutcome, SkipReason};
pub use pipeline::Pipeline;
pub use stability::{Stability, StabilityDetector};
pub use watcher::{OutcomeSink, Watcher};
