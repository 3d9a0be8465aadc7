//! Per-candidate state machine
//!
//! `Detected → Stabilizing → Claimed → Extracting → Persisting → Moving → Done`
//!
//! A file is moved out of the watched directory only after its record is
//! durably stored. Every failure before that point leaves the file where it
//! is so a later scan can retry it.

use crate::ledger::normalize_path;
use crate::{
    FileMover, IngestionLedger, ProcessingOutcome, SkipReason, Stability, StabilityDetector,
    WatcherConfig, WatcherError,
};
use quill_domain::traits::{CompletionJournal, ExtractionAdapter, PersistenceAdapter};
use quill_domain::{Candidate, CandidateState, ExtractedRecord, PersistedReference, SourceFingerprint};
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Drives candidates through extraction, persistence and the final move
pub struct Pipeline<E, P, J> {
    extractor: Arc<E>,
    store: Arc<P>,
    journal: Arc<J>,
    org_id: String,
    config: WatcherConfig,
    watch_dir: PathBuf,
    watch_root: PathBuf,
    processed_root: PathBuf,
    detector: StabilityDetector,
    ledger: IngestionLedger,
    mover: FileMover,
}

/// Current state of one candidate, with transition logging
struct Progress {
    state: CandidateState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: CandidateState::Detected,
        }
    }

    fn advance(&mut self, next: CandidateState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    fn finish(&mut self, outcome: ProcessingOutcome) -> ProcessingOutcome {
        let terminal = match &outcome {
            ProcessingOutcome::Success { .. } => CandidateState::Done,
            ProcessingOutcome::Skipped(_) => CandidateState::Skipped,
            ProcessingOutcome::Failed(_) => CandidateState::Failed,
        };
        self.advance(terminal);
        outcome
    }
}

async fn blocking<T, F>(f: F) -> Result<T, WatcherError>
where
    F: FnOnce() -> Result<T, WatcherError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

impl<E, P, J> Pipeline<E, P, J>
where
    E: ExtractionAdapter + Send + Sync + 'static,
    E::Error: Display,
    P: PersistenceAdapter + Send + Sync + 'static,
    P::Error: Display,
    J: CompletionJournal + Send + Sync + 'static,
    J::Error: Display,
{
    /// Create a pipeline for files in `watch_dir`
    ///
    /// Processed files go to `watch_dir/<config.processed_dir>`.
    pub fn new(
        extractor: Arc<E>,
        store: Arc<P>,
        journal: Arc<J>,
        org_id: impl Into<String>,
        config: WatcherConfig,
        watch_dir: impl Into<PathBuf>,
    ) -> Self {
        let watch_dir = watch_dir.into();
        let detector = StabilityDetector::new(config.poll_interval(), config.stable_polls);
        let mover = FileMover::new(watch_dir.join(&config.processed_dir));
        let watch_root = resolve_dir(&watch_dir);
        let processed_root = watch_root.join(&config.processed_dir);
        Self {
            extractor,
            store,
            journal,
            org_id: org_id.into(),
            config,
            watch_dir,
            watch_root,
            processed_root,
            detector,
            ledger: IngestionLedger::new(),
            mover,
        }
    }

    /// The watched directory
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Canonical form of the watched directory, resolved once at
    /// construction
    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    /// The processed directory
    pub fn processed_dir(&self) -> &Path {
        self.mover.processed_dir()
    }

    /// Pipeline configuration
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// The claim ledger shared by every candidate of this pipeline
    pub fn ledger(&self) -> &IngestionLedger {
        &self.ledger
    }

    /// Check the configuration and create the watched and processed
    /// directories if missing
    pub async fn prepare(&self) -> Result<(), WatcherError> {
        self.config.validate().map_err(WatcherError::Config)?;
        tokio::fs::create_dir_all(&self.watch_dir).await?;
        tokio::fs::create_dir_all(self.mover.processed_dir()).await?;
        Ok(())
    }

    /// Reason to skip `candidate` before any work is done, if any.
    ///
    /// Looks at the name only; `candidate.path` must be normalized.
    pub fn screen(&self, candidate: &Candidate) -> Option<SkipReason> {
        if candidate.is_hidden() || candidate.path.starts_with(&self.processed_root) {
            return Some(SkipReason::Excluded);
        }
        if !self.config.is_supported(&candidate.extension) {
            return Some(SkipReason::UnsupportedExtension(candidate.extension.clone()));
        }
        None
    }

    /// Run one file through the full state machine
    pub async fn process(&self, path: &Path, cancel: &CancellationToken) -> ProcessingOutcome {
        let candidate = Candidate::new(normalize_path(path));
        let span = info_span!("candidate", file = %candidate.file_name());

        async {
            let mut progress = Progress::new();
            let outcome = self.drive(&candidate, cancel, &mut progress).await;
            let outcome = progress.finish(outcome);
            log_outcome(&candidate, &outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> ProcessingOutcome {
        if let Some(reason) = self.screen(candidate) {
            return ProcessingOutcome::Skipped(reason);
        }
        if tokio::fs::metadata(&candidate.path).await.is_ok_and(|m| m.is_dir()) {
            return ProcessingOutcome::Skipped(SkipReason::Excluded);
        }

        progress.advance(CandidateState::Stabilizing);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let timeout = self.config.stability_timeout();
            match self.detector.await_stable(&candidate.path, timeout, cancel).await {
                Stability::Stable(_) => break,
                Stability::Vanished => return ProcessingOutcome::Skipped(SkipReason::Vanished),
                Stability::Cancelled => return ProcessingOutcome::Skipped(SkipReason::Interrupted),
                Stability::TimedOut if attempts <= self.config.stability_retries => {
                    warn!("Still changing after {:?}, waiting again", timeout);
                }
                Stability::TimedOut => {
                    return ProcessingOutcome::Failed(WatcherError::StabilityTimeout { attempts });
                }
            }
        }

        let fingerprint = match tokio::fs::metadata(&candidate.path).await {
            Ok(metadata) => SourceFingerprint::from_metadata(&candidate.path, &metadata),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return ProcessingOutcome::Skipped(SkipReason::Vanished)
            }
            Err(e) => return ProcessingOutcome::Failed(e.into()),
        };

        let Some(claim) = self.ledger.try_claim(&candidate.path, &fingerprint) else {
            let reason = if self.ledger.is_processed_generation(&fingerprint) {
                SkipReason::AlreadyProcessed
            } else {
                SkipReason::AlreadyInFlight
            };
            return ProcessingOutcome::Skipped(reason);
        };
        progress.advance(CandidateState::Claimed);

        let journaled = match self.lookup_journal(&fingerprint).await {
            Ok(found) => found,
            Err(e) => return ProcessingOutcome::Failed(e),
        };

        let (reference, recovered) = match journaled {
            Some(reference) => {
                info!("Already stored as {}, skipping to move", reference);
                (reference, true)
            }
            None => {
                if cancel.is_cancelled() {
                    return ProcessingOutcome::Skipped(SkipReason::Interrupted);
                }
                progress.advance(CandidateState::Extracting);

                let raw = match tokio::fs::read(&candidate.path).await {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        return ProcessingOutcome::Skipped(SkipReason::Vanished)
                    }
                    Err(e) => return ProcessingOutcome::Failed(e.into()),
                };
                let record = match self.extract(raw, candidate.file_name()).await {
                    Ok(record) => record,
                    Err(e) => return ProcessingOutcome::Failed(e),
                };

                // Past this point the candidate always runs through the move.
                if cancel.is_cancelled() {
                    return ProcessingOutcome::Skipped(SkipReason::Interrupted);
                }
                progress.advance(CandidateState::Persisting);

                let reference = match self.persist(record, candidate).await {
                    Ok(reference) => reference,
                    Err(e) => return ProcessingOutcome::Failed(e),
                };
                if let Err(e) = self.record_journal(&fingerprint, &reference).await {
                    warn!("Stored {} but could not journal it: {}", reference, e);
                }
                (reference, false)
            }
        };

        progress.advance(CandidateState::Moving);
        let mover = self.mover.clone();
        let source = candidate.path.clone();
        match blocking(move || mover.move_to_processed(&source).map_err(WatcherError::from)).await {
            Ok(result) => {
                debug!("Moved to {}", result.destination().display());
                claim.complete(fingerprint);
                ProcessingOutcome::Success {
                    reference,
                    recovered,
                }
            }
            Err(e) => ProcessingOutcome::Failed(WatcherError::Move {
                reference,
                message: e.to_string(),
            }),
        }
    }

    async fn extract(&self, raw: Vec<u8>, filename: String) -> Result<ExtractedRecord, WatcherError> {
        let extractor = Arc::clone(&self.extractor);
        let record = blocking(move || {
            extractor
                .extract(&raw, &filename)
                .map_err(|e| WatcherError::Extraction(e.to_string()))
        })
        .await?;

        record.validate().map_err(WatcherError::Extraction)?;
        Ok(record)
    }

    async fn persist(
        &self,
        record: ExtractedRecord,
        candidate: &Candidate,
    ) -> Result<PersistedReference, WatcherError> {
        let store = Arc::clone(&self.store);
        let org_id = self.org_id.clone();
        let meeting_date = candidate.meeting_date();
        blocking(move || {
            store
                .persist(&record, &org_id, meeting_date)
                .map_err(|e| WatcherError::Persistence(e.to_string()))
        })
        .await
    }

    async fn lookup_journal(
        &self,
        fingerprint: &SourceFingerprint,
    ) -> Result<Option<PersistedReference>, WatcherError> {
        let journal = Arc::clone(&self.journal);
        let fingerprint = fingerprint.clone();
        blocking(move || {
            journal
                .lookup(&fingerprint)
                .map_err(|e| WatcherError::Journal(e.to_string()))
        })
        .await
    }

    async fn record_journal(
        &self,
        fingerprint: &SourceFingerprint,
        reference: &PersistedReference,
    ) -> Result<(), WatcherError> {
        let journal = Arc::clone(&self.journal);
        let fingerprint = fingerprint.clone();
        let reference = reference.clone();
        blocking(move || {
            journal
                .record(&fingerprint, &reference)
                .map_err(|e| WatcherError::Journal(e.to_string()))
        })
        .await
    }
}

/// Canonicalize `dir`, resolving through its nearest existing ancestor
/// when it does not exist yet
fn resolve_dir(dir: &Path) -> PathBuf {
    let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    if let Ok(path) = absolute.canonicalize() {
        return path;
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => resolve_dir(parent).join(name),
        _ => absolute,
    }
}

fn log_outcome(candidate: &Candidate, outcome: &ProcessingOutcome) {
    let file = candidate.file_name();
    match outcome {
        ProcessingOutcome::Success {
            reference,
            recovered: false,
        } => info!(
            "Imported '{}': note {} with {} action items",
            file, reference.record_id, reference.item_count
        ),
        ProcessingOutcome::Success {
            reference,
            recovered: true,
        } => info!("Moved '{}' (already stored as note {})", file, reference.record_id),
        ProcessingOutcome::Skipped(
            reason @ (SkipReason::UnsupportedExtension(_) | SkipReason::Excluded),
        ) => debug!("Ignoring '{}': {}", file, reason),
        ProcessingOutcome::Skipped(reason) => info!("Skipped '{}': {}", file, reason),
        ProcessingOutcome::Failed(WatcherError::Move { reference, message }) => warn!(
            "'{}' is stored as note {} but could not be moved: {}",
            file, reference.record_id, message
        ),
        ProcessingOutcome::Failed(e) => error!("Failed to import '{}': {}", file, e),
    }
}
