//! Directory watcher
//!
//! Scans the backlog, then follows live filesystem events and periodic
//! rescans, handing each candidate to a bounded pool of workers.

use crate::events::{appeared_paths, DirectoryEvents};
use crate::{Pipeline, ProcessingOutcome, SkipReason, WatcherError, WatcherMetrics};
use quill_domain::traits::{CompletionJournal, ExtractionAdapter, PersistenceAdapter};
use quill_domain::{Candidate, SourceFingerprint};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Channel receiving every terminal outcome as `(path, outcome)`
pub type OutcomeSink = mpsc::UnboundedSender<(PathBuf, ProcessingOutcome)>;

/// Orchestrates backlog scans, live events and the worker pool
///
/// # Examples
///
/// ```no_run
/// use quill_extractor::{Extractor, ExtractorConfig};
/// use quill_llm::MockProvider;
/// use quill_store::{SqliteJournal, SqliteStore};
/// use quill_watcher::{Pipeline, Watcher, WatcherConfig};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(
///         Arc::new(Extractor::new(MockProvider::default(), ExtractorConfig::default())),
///         Arc::new(SqliteStore::new("notes.db")?),
///         Arc::new(SqliteJournal::new("journal.db")?),
///         "org-1",
///         WatcherConfig::default(),
///         "/home/me/Documents/Granola",
///     );
///     let watcher = Watcher::new(pipeline);
///
///     // Run until the token is cancelled
///     let metrics = watcher.run(CancellationToken::new()).await?;
///     println!("{}", metrics.summary());
///     Ok(())
/// }
/// ```
pub struct Watcher<E, P, J> {
    pipeline: Arc<Pipeline<E, P, J>>,
    reporter: Reporter,
}

#[derive(Clone)]
struct Reporter {
    sink: Option<OutcomeSink>,
    metrics: Arc<Mutex<WatcherMetrics>>,
}

impl Reporter {
    fn metrics(&self) -> MutexGuard<'_, WatcherMetrics> {
        // Counters stay meaningful even if a holder panicked.
        self.metrics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, path: PathBuf, outcome: ProcessingOutcome) {
        self.metrics().record(&outcome);
        if let Some(sink) = &self.sink {
            let _ = sink.send((path, outcome));
        }
    }
}

/// Bookkeeping for spawned workers
struct Dispatcher<E, P, J> {
    pipeline: Arc<Pipeline<E, P, J>>,
    reporter: Reporter,
    permits: Arc<Semaphore>,
    pending: Arc<Mutex<HashSet<PathBuf>>>,
    workers: JoinSet<()>,
    cancel: CancellationToken,
}

fn lock_pending(pending: &Mutex<HashSet<PathBuf>>) -> MutexGuard<'_, HashSet<PathBuf>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<E, P, J> Dispatcher<E, P, J>
where
    E: ExtractionAdapter + Send + Sync + 'static,
    E::Error: Display,
    P: PersistenceAdapter + Send + Sync + 'static,
    P::Error: Display,
    J: CompletionJournal + Send + Sync + 'static,
    J::Error: Display,
{
    fn new(pipeline: Arc<Pipeline<E, P, J>>, reporter: Reporter, cancel: CancellationToken) -> Self {
        let permits = Arc::new(Semaphore::new(pipeline.config().max_workers));
        Self {
            pipeline,
            reporter,
            permits,
            pending: Arc::new(Mutex::new(HashSet::new())),
            workers: JoinSet::new(),
            cancel,
        }
    }

    /// Hand `path` to a worker unless it is already pending.
    ///
    /// `path` must be normalized. With `drop_if_moved`, a path that belongs
    /// to a file completed earlier and is gone by the time the worker starts
    /// is dropped without an outcome; its event was stale.
    fn dispatch(&mut self, path: PathBuf, drop_if_moved: bool) {
        if !lock_pending(&self.pending).insert(path.clone()) {
            debug!("{} already pending", path.display());
            return;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let reporter = self.reporter.clone();
        let permits = Arc::clone(&self.permits);
        let pending = Arc::clone(&self.pending);
        let cancel = self.cancel.clone();

        self.workers.spawn(async move {
            if drop_if_moved
                && pipeline.ledger().is_known_processed(&path)
                && !tokio::fs::try_exists(&path).await.unwrap_or(false)
            {
                debug!("Stale event for processed {}", path.display());
                lock_pending(&pending).remove(&path);
                return;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };

            let outcome = match permit {
                Some(_permit) => pipeline.process(&path, &cancel).await,
                None => {
                    debug!("Abandoning {} before it started", path.display());
                    ProcessingOutcome::Skipped(SkipReason::Interrupted)
                }
            };

            lock_pending(&pending).remove(&path);
            reporter.report(path, outcome);
        });
    }

    /// Handle a file named by a live event; `name` is its file name in the
    /// watched directory
    fn dispatch_event(&mut self, name: &OsStr) {
        let candidate = Candidate::new(self.pipeline.watch_root().join(name));
        if let Some(reason) = self.pipeline.screen(&candidate) {
            debug!("Ignoring {}: {}", candidate.path.display(), reason);
            self.reporter.report(candidate.path, ProcessingOutcome::Skipped(reason));
            return;
        }

        self.dispatch(candidate.path, true);
    }

    /// Scan the directory and dispatch every eligible file whose current
    /// generation has not been processed
    async fn scan(&mut self) -> Result<usize, WatcherError> {
        // Anything completed before this listing has already left the
        // directory; a file now under that name is new.
        self.pipeline
            .ledger()
            .evict_completed_before(std::time::Instant::now());
        let files = scan_directory(&self.pipeline).await?;
        self.reporter.metrics().record_scan();

        let mut dispatched = 0;
        for file in files {
            // Completed while this scan was listing
            if self.pipeline.ledger().is_processed_generation(&file) {
                continue;
            }
            let before = self.workers.len();
            self.dispatch(file.path, false);
            dispatched += self.workers.len() - before;
        }
        Ok(dispatched)
    }

    fn reap(&mut self, result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            error!("Worker task failed: {}", e);
        }
    }

    /// Wait for every spawned worker to finish
    async fn drain(&mut self) {
        if !self.workers.is_empty() {
            info!("Waiting for {} candidate(s) to finish", self.workers.len());
        }
        while let Some(result) = self.workers.join_next().await {
            self.reap(result);
        }
    }
}

/// Fingerprints of eligible files directly inside the watched directory,
/// sorted by name
async fn scan_directory<E, P, J>(
    pipeline: &Pipeline<E, P, J>,
) -> Result<Vec<SourceFingerprint>, WatcherError>
where
    E: ExtractionAdapter + Send + Sync + 'static,
    E::Error: Display,
    P: PersistenceAdapter + Send + Sync + 'static,
    P::Error: Display,
    J: CompletionJournal + Send + Sync + 'static,
    J::Error: Display,
{
    let mut entries = tokio::fs::read_dir(pipeline.watch_dir()).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = pipeline.watch_root().join(entry.file_name());
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };
        let candidate = Candidate::new(&path);
        if pipeline.screen(&candidate).is_none() {
            files.push(SourceFingerprint::from_metadata(&path, &metadata));
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

async fn next_tick(rescan: &mut Option<Interval>) {
    match rescan {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl<E, P, J> Watcher<E, P, J>
where
    E: ExtractionAdapter + Send + Sync + 'static,
    E::Error: Display,
    P: PersistenceAdapter + Send + Sync + 'static,
    P::Error: Display,
    J: CompletionJournal + Send + Sync + 'static,
    J::Error: Display,
{
    /// Create a watcher around `pipeline`
    pub fn new(pipeline: Pipeline<E, P, J>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            reporter: Reporter {
                sink: None,
                metrics: Arc::new(Mutex::new(WatcherMetrics::new())),
            },
        }
    }

    /// Publish every terminal outcome on `sink`
    pub fn with_outcome_sink(mut self, sink: OutcomeSink) -> Self {
        self.reporter.sink = Some(sink);
        self
    }

    /// The underlying pipeline
    pub fn pipeline(&self) -> &Pipeline<E, P, J> {
        &self.pipeline
    }

    /// Snapshot of the metrics collected so far
    pub fn metrics(&self) -> WatcherMetrics {
        self.reporter.metrics().clone()
    }

    /// Watch until `cancel` fires, then drain in-flight candidates.
    ///
    /// The backlog is scanned before the live subscription starts. Returns
    /// the final metrics.
    pub async fn run(&self, cancel: CancellationToken) -> Result<WatcherMetrics, WatcherError> {
        self.pipeline.prepare().await?;
        let watch_dir = self.pipeline.watch_root().to_path_buf();
        let config = self.pipeline.config().clone();

        let mut dispatcher = Dispatcher::new(
            Arc::clone(&self.pipeline),
            self.reporter.clone(),
            cancel.clone(),
        );

        let backlog = dispatcher.scan().await?;
        info!("Backlog scan queued {} file(s)", backlog);

        let mut events = match DirectoryEvents::subscribe(&watch_dir, config.event_buffer) {
            Ok(events) => events,
            Err(e) => {
                cancel.cancel();
                dispatcher.drain().await;
                return Err(e);
            }
        };

        let mut rescan = config.rescan_interval().map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!("Watching {} for {}", watch_dir.display(), config.formats());

        let result = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested, no longer accepting new files");
                    break Ok(());
                }
                event = events.next_event() => match event {
                    Some(Ok(event)) => {
                        for path in appeared_paths(&event) {
                            if path.parent() != Some(watch_dir.as_path()) {
                                continue;
                            }
                            if let Some(name) = path.file_name() {
                                dispatcher.dispatch_event(name);
                            }
                        }
                    }
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => {
                        error!("Filesystem event stream ended");
                        break Err(WatcherError::Watch(notify::Error::generic(
                            "filesystem event stream ended",
                        )));
                    }
                },
                _ = next_tick(&mut rescan) => {
                    match dispatcher.scan().await {
                        Ok(0) => debug!("Rescan found nothing new"),
                        Ok(n) => info!("Rescan queued {} file(s)", n),
                        Err(e) => warn!("Rescan failed: {}", e),
                    }
                }
                Some(result) = dispatcher.workers.join_next(), if !dispatcher.workers.is_empty() => {
                    dispatcher.reap(result);
                }
            }
        };

        drop(events);
        if result.is_err() {
            cancel.cancel();
        }
        dispatcher.drain().await;

        let metrics = self.metrics();
        info!("Watcher stopped. Final metrics:\n{}", metrics.summary());
        result.map(|_| metrics)
    }

    /// Process the current backlog once and wait for every candidate.
    ///
    /// Cancelling `cancel` abandons candidates that have not started and
    /// lets running ones finish their current step.
    pub async fn scan_once(&self, cancel: CancellationToken) -> Result<WatcherMetrics, WatcherError> {
        self.pipeline.prepare().await?;
        let mut dispatcher = Dispatcher::new(
            Arc::clone(&self.pipeline),
            self.reporter.clone(),
            cancel,
        );

        let queued = dispatcher.scan().await?;
        info!("Scan queued {} file(s)", queued);
        dispatcher.drain().await;

        Ok(self.metrics())
    }

    /// Run a single file through the pipeline and report its outcome
    pub async fn ingest(&self, path: &Path, cancel: &CancellationToken) -> Result<ProcessingOutcome, WatcherError> {
        self.pipeline.prepare().await?;
        let outcome = self.pipeline.process(path, cancel).await;
        self.reporter.metrics().record(&outcome);
        Ok(outcome)
    }
}

