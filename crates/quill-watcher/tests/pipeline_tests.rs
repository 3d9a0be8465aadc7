//! Integration tests for quill-watcher
//!
//! These tests run real files through the pipeline with stub adapters and
//! in-memory SQLite, using short polling intervals.

use chrono::NaiveDateTime;
use quill_domain::traits::{CompletionJournal, ExtractionAdapter, PersistenceAdapter};
use quill_domain::{
    Candidate, ExtractedRecord, PersistedReference, RecordId, SourceFingerprint, TaggedItem,
};
use quill_extractor::{Extractor, ExtractorConfig};
use quill_llm::MockProvider;
use quill_store::{SqliteJournal, SqliteStore};
use quill_watcher::{
    normalize_path, Pipeline, ProcessingOutcome, SkipReason, Watcher, WatcherConfig, WatcherError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Extraction stub: title is the file name, body is the file content
#[derive(Default)]
struct StubExtractor {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Duration,
}

impl StubExtractor {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExtractionAdapter for StubExtractor {
    type Error = String;

    fn extract(&self, raw_content: &[u8], filename: &str) -> Result<ExtractedRecord, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.fail.load(Ordering::SeqCst) {
            return Err("unintelligible input".to_string());
        }
        let mut record = ExtractedRecord::new(filename, String::from_utf8_lossy(raw_content));
        record.items.push(TaggedItem::new("Follow up"));
        Ok(record)
    }
}

/// SQLite store that can be switched into a failing state
struct FlakyStore {
    inner: SqliteStore,
    fail: AtomicBool,
    meeting_dates: Mutex<Vec<Option<NaiveDateTime>>>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::new(":memory:").unwrap(),
            fail: AtomicBool::new(false),
            meeting_dates: Mutex::new(Vec::new()),
        }
    }

    fn notes(&self) -> usize {
        self.inner.note_count().unwrap()
    }
}

impl PersistenceAdapter for FlakyStore {
    type Error = String;

    fn persist(
        &self,
        record: &ExtractedRecord,
        org_id: &str,
        meeting_date: Option<NaiveDateTime>,
    ) -> Result<PersistedReference, String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("connection refused".to_string());
        }
        self.meeting_dates.lock().unwrap().push(meeting_date);
        self.inner
            .persist(record, org_id, meeting_date)
            .map_err(|e| e.to_string())
    }
}

struct Harness {
    dir: tempfile::TempDir,
    extractor: Arc<StubExtractor>,
    store: Arc<FlakyStore>,
    journal: Arc<SqliteJournal>,
}

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        poll_interval_ms: 20,
        stable_polls: 2,
        stability_timeout_secs: 5,
        rescan_interval_secs: 0,
        ..Default::default()
    }
}

impl Harness {
    fn new() -> Self {
        Self::with_extractor(StubExtractor::default())
    }

    fn with_extractor(extractor: StubExtractor) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            extractor: Arc::new(extractor),
            store: Arc::new(FlakyStore::new()),
            journal: Arc::new(SqliteJournal::new(":memory:").unwrap()),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn processed(&self, name: &str) -> PathBuf {
        self.root().join("processed").join(name)
    }

    fn pipeline(&self, config: WatcherConfig) -> Pipeline<StubExtractor, FlakyStore, SqliteJournal> {
        Pipeline::new(
            Arc::clone(&self.extractor),
            Arc::clone(&self.store),
            Arc::clone(&self.journal),
            "org-test",
            config,
            self.root(),
        )
    }

    fn watcher(&self) -> Watcher<StubExtractor, FlakyStore, SqliteJournal> {
        Watcher::new(self.pipeline(fast_config()))
    }
}

fn collect(rx: &mut mpsc::UnboundedReceiver<(PathBuf, ProcessingOutcome)>) -> Vec<(PathBuf, ProcessingOutcome)> {
    let mut outcomes = Vec::new();
    while let Ok(item) = rx.try_recv() {
        outcomes.push(item);
    }
    outcomes
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_backlog_scan_processes_eligible_files() {
    let h = Harness::new();
    h.write("2024-01-15 Standup.md", "standup notes");
    h.write("notes.txt", "plain notes");
    h.write("report.pdf", "%PDF");
    h.write(".DS_Store", "junk");
    fs::create_dir_all(h.root().join("processed")).unwrap();
    fs::write(h.processed("old.md"), "already done").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = h.watcher().with_outcome_sink(tx);
    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();

    assert_eq!(metrics.succeeded, 2);
    assert_eq!(metrics.total_failed(), 0);
    assert_eq!(h.extractor.calls(), 2);
    assert_eq!(h.store.notes(), 2);

    // Moved exactly once, never left in both places
    for name in ["2024-01-15 Standup.md", "notes.txt"] {
        assert!(!h.root().join(name).exists(), "{} still in root", name);
        assert!(h.processed(name).exists(), "{} not in processed", name);
    }
    assert!(h.root().join("report.pdf").exists());
    assert!(h.root().join(".DS_Store").exists());
    assert!(h.processed("old.md").exists());
    assert!(!h.processed("old (1).md").exists());

    let outcomes = collect(&mut rx);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, o)| o.is_success()));
}

#[tokio::test]
async fn test_meeting_date_from_file_name() {
    let h = Harness::new();
    h.write("2024-01-15 Standup.md", "a");
    h.write("notes.md", "b");

    h.watcher().scan_once(CancellationToken::new()).await.unwrap();

    let mut dates = h.store.meeting_dates.lock().unwrap().clone();
    dates.sort();
    let expected =
        NaiveDateTime::parse_from_str("2024-01-15T09:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
    // notes.md carries no date; the store stamps the current time itself
    assert_eq!(dates, vec![None, Some(expected)]);
}

#[tokio::test]
async fn test_persistence_failure_leaves_file_for_retry() {
    let h = Harness::new();
    let path = h.write("retro.md", "retro notes");
    let watcher = h.watcher();

    h.store.fail.store(true, Ordering::SeqCst);
    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();
    assert_eq!(metrics.failed.get("persistence"), Some(&1));
    assert!(path.exists(), "file must stay when persistence fails");
    assert!(!h.processed("retro.md").exists());
    assert_eq!(h.store.notes(), 0);
    assert!(!watcher.pipeline().ledger().is_in_flight(&path));

    h.store.fail.store(false, Ordering::SeqCst);
    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();
    assert_eq!(metrics.succeeded, 1);
    assert!(!path.exists());
    assert!(h.processed("retro.md").exists());
    assert_eq!(h.store.notes(), 1);

    // Nothing left to do on another pass
    watcher.scan_once(CancellationToken::new()).await.unwrap();
    assert_eq!(h.store.notes(), 1);
    assert_eq!(h.extractor.calls(), 2);
}

#[tokio::test]
async fn test_extraction_failure_leaves_file_in_place() {
    let h = Harness::new();
    let path = h.write("garbled.md", "???");
    h.extractor.fail.store(true, Ordering::SeqCst);

    let outcome = h
        .pipeline(fast_config())
        .process(&path, &CancellationToken::new())
        .await;

    assert!(matches!(outcome, ProcessingOutcome::Failed(WatcherError::Extraction(_))));
    assert!(path.exists());
    assert_eq!(h.store.notes(), 0);
}

#[tokio::test]
async fn test_journal_hit_skips_to_move() {
    let h = Harness::new();
    let path = h.write("2024-02-01 Planning.md", "planning");

    // Simulate an earlier run that stored the note and died before moving.
    let metadata = fs::metadata(&path).unwrap();
    let fingerprint = SourceFingerprint::from_metadata(&normalize_path(&path), &metadata);
    let earlier = PersistedReference::new(RecordId::new("note-from-last-run"), 4);
    h.journal.record(&fingerprint, &earlier).unwrap();

    let outcome = h
        .pipeline(fast_config())
        .process(&path, &CancellationToken::new())
        .await;

    match outcome {
        ProcessingOutcome::Success { reference, recovered } => {
            assert!(recovered);
            assert_eq!(reference, earlier);
        }
        other => panic!("expected recovered success, got {}", other),
    }
    assert_eq!(h.extractor.calls(), 0);
    assert_eq!(h.store.notes(), 0);
    assert!(h.processed("2024-02-01 Planning.md").exists());
}

#[tokio::test]
async fn test_successful_import_is_journaled() {
    let h = Harness::new();
    let path = h.write("sync.md", "sync");
    let fingerprint =
        SourceFingerprint::from_metadata(&normalize_path(&path), &fs::metadata(&path).unwrap());

    let outcome = h
        .pipeline(fast_config())
        .process(&path, &CancellationToken::new())
        .await;

    let journaled = h.journal.lookup(&fingerprint).unwrap();
    assert_eq!(journaled.as_ref(), outcome.reference());
}

#[tokio::test]
async fn test_concurrent_notifications_claim_once() {
    let h = Harness::with_extractor(StubExtractor::slow(Duration::from_millis(300)));
    let path = h.write("dup.md", "content");
    let pipeline = h.pipeline(fast_config());
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        pipeline.process(&path, &cancel),
        pipeline.process(&path, &cancel)
    );

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    assert_eq!(successes, 1);
    let loser = outcomes.iter().find(|o| !o.is_success()).unwrap();
    assert!(matches!(
        loser.skip_reason(),
        Some(SkipReason::AlreadyInFlight | SkipReason::AlreadyProcessed | SkipReason::Vanished)
    ));
    assert_eq!(h.extractor.calls(), 1);
    assert_eq!(h.store.notes(), 1);
}

#[tokio::test]
async fn test_unsupported_extension_has_no_side_effects() {
    let h = Harness::new();
    let path = h.write("slides.pdf", "%PDF-1.7");

    let outcome = h
        .pipeline(fast_config())
        .process(&path, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome.skip_reason(),
        Some(&SkipReason::UnsupportedExtension("pdf".to_string()))
    );
    assert_eq!(h.extractor.calls(), 0);
    assert!(path.exists());
    assert!(!h.root().join("processed").exists());
}

#[tokio::test]
async fn test_vanished_file_is_skipped() {
    let h = Harness::new();
    let outcome = h
        .pipeline(fast_config())
        .process(&h.root().join("ghost.md"), &CancellationToken::new())
        .await;
    assert_eq!(outcome.skip_reason(), Some(&SkipReason::Vanished));
}

#[tokio::test]
async fn test_stability_timeout_retries_then_fails() {
    let h = Harness::new();
    let path = h.write("empty.md", "");
    let config = WatcherConfig {
        stability_timeout_secs: 1,
        stability_retries: 1,
        ..fast_config()
    };

    let outcome = h.pipeline(config).process(&path, &CancellationToken::new()).await;

    assert!(matches!(
        outcome,
        ProcessingOutcome::Failed(WatcherError::StabilityTimeout { attempts: 2 })
    ));
    assert!(path.exists());
}

#[tokio::test]
async fn test_cancelled_scan_abandons_queued_files() {
    let h = Harness::new();
    h.write("a.md", "a");
    h.write("b.md", "b");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let metrics = h
        .watcher()
        .with_outcome_sink(tx)
        .scan_once(cancel)
        .await
        .unwrap();

    assert_eq!(metrics.skipped.get("interrupted"), Some(&2));
    assert_eq!(h.extractor.calls(), 0);
    assert!(h.root().join("a.md").exists());
    assert!(h.root().join("b.md").exists());
    assert_eq!(collect(&mut rx).len(), 2);
}

#[tokio::test]
async fn test_rescan_picks_up_new_file_under_processed_name() {
    let h = Harness::new();
    let watcher = h.watcher();
    h.write("same.md", "first meeting");

    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();
    assert_eq!(metrics.succeeded, 1);
    assert!(watcher.pipeline().ledger().is_known_processed(&h.root().join("same.md")));

    // A new export reuses the name; no live event is involved.
    let path = h.write("same.md", "second meeting, longer notes");
    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();

    assert_eq!(metrics.succeeded, 2);
    assert!(!path.exists(), "second same.md left in the watched directory");
    assert_eq!(h.store.notes(), 2);
    assert_eq!(fs::read_to_string(h.processed("same.md")).unwrap(), "first meeting");
    assert_eq!(
        fs::read_to_string(h.processed("same (1).md")).unwrap(),
        "second meeting, longer notes"
    );
}

#[tokio::test]
async fn test_completed_generation_is_not_claimed_twice() {
    let h = Harness::new();
    let pipeline = h.pipeline(fast_config());
    let path = h.write("once.md", "notes");
    let cancel = CancellationToken::new();

    assert!(pipeline.process(&path, &cancel).await.is_success());
    // Restore the exact file, as a sync tool might
    fs::copy(h.processed("once.md"), &path).unwrap();
    let metadata = fs::metadata(h.processed("once.md")).unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(metadata.modified().unwrap())
        .unwrap();

    let outcome = pipeline.process(&path, &cancel).await;
    assert_eq!(outcome.skip_reason(), Some(&SkipReason::AlreadyProcessed));
    assert_eq!(h.extractor.calls(), 1);
}

#[tokio::test]
async fn test_shutdown_lets_running_extraction_finish() {
    let h = Harness::with_extractor(StubExtractor::slow(Duration::from_millis(800)));
    let path = h.write("long.md", "a long meeting");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Arc::new(h.watcher().with_outcome_sink(tx));
    let cancel = CancellationToken::new();

    let handle = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.scan_once(cancel).await })
    };

    // Stability takes a few polls; by now extraction is under way.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.extractor.calls(), 1);
    cancel.cancel();

    let metrics = handle.await.unwrap().unwrap();

    // The extraction ran to completion, then nothing was persisted or moved.
    assert_eq!(metrics.skipped.get("interrupted"), Some(&1));
    assert_eq!(metrics.succeeded, 0);
    assert_eq!(h.extractor.calls(), 1);
    assert_eq!(h.store.notes(), 0);
    assert!(path.exists());
    assert!(!watcher.pipeline().ledger().is_in_flight(&path));

    let outcomes = collect(&mut rx);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1.skip_reason(), Some(&SkipReason::Interrupted));
}

#[tokio::test]
async fn test_move_failure_keeps_reference_and_recovers_on_rescan() {
    let h = Harness::new();
    let path = h.write("board.md", "board meeting");
    // A plain file where the processed directory should be
    fs::write(h.root().join("processed"), "in the way").unwrap();
    let watcher = h.watcher();

    let outcome = watcher
        .pipeline()
        .process(&path, &CancellationToken::new())
        .await;

    let stored = match &outcome {
        ProcessingOutcome::Failed(WatcherError::Move { reference, .. }) => reference.clone(),
        other => panic!("expected a move failure, got {}", other),
    };
    assert_eq!(outcome.reference(), Some(&stored));
    assert_eq!(h.store.notes(), 1);
    assert!(path.exists());
    let ledger = watcher.pipeline().ledger();
    assert!(!ledger.is_in_flight(&path));
    assert!(!ledger.is_known_processed(&path));

    fs::remove_file(h.root().join("processed")).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = watcher.with_outcome_sink(tx);
    let metrics = watcher.scan_once(CancellationToken::new()).await.unwrap();

    assert_eq!(metrics.recovered, 1);
    match collect(&mut rx).pop() {
        Some((_, ProcessingOutcome::Success { reference, recovered })) => {
            assert!(recovered);
            assert_eq!(reference, stored);
        }
        other => panic!("expected recovered success, got {:?}", other.map(|(_, o)| o.to_string())),
    }
    assert_eq!(h.extractor.calls(), 1);
    assert_eq!(h.store.notes(), 1);
    assert!(!path.exists());
    assert!(h.processed("board.md").exists());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_scanning() {
    let h = Harness::new();
    h.write("a.md", "a");
    let config = WatcherConfig {
        max_workers: 0,
        ..fast_config()
    };

    let result = Watcher::new(h.pipeline(config))
        .scan_once(CancellationToken::new())
        .await;

    assert!(matches!(result, Err(WatcherError::Config(_))));
    assert_eq!(h.extractor.calls(), 0);
    assert!(h.root().join("a.md").exists());
}

#[tokio::test]
async fn test_roots_resolved_before_directories_exist() {
    let h = Harness::new();
    let inbox = h.root().join("inbox");
    let pipeline = Pipeline::new(
        Arc::clone(&h.extractor),
        Arc::clone(&h.store),
        Arc::clone(&h.journal),
        "org-test",
        fast_config(),
        &inbox,
    );

    let root = h.root().canonicalize().unwrap().join("inbox");
    assert_eq!(pipeline.watch_root(), root.as_path());
    let in_processed = Candidate::new(root.join("processed").join("done.md"));
    assert_eq!(pipeline.screen(&in_processed), Some(SkipReason::Excluded));

    pipeline.prepare().await.unwrap();
    assert_eq!(pipeline.watch_root(), inbox.canonicalize().unwrap().as_path());

    // A directory with a supported-looking name is screened by the worker
    fs::create_dir(inbox.join("folder.md")).unwrap();
    let outcome = pipeline
        .process(&inbox.join("folder.md"), &CancellationToken::new())
        .await;
    assert_eq!(outcome.skip_reason(), Some(&SkipReason::Excluded));
}

#[tokio::test]
async fn test_processed_name_collision() {
    let h = Harness::new();
    fs::create_dir_all(h.root().join("processed")).unwrap();
    fs::write(h.processed("weekly.md"), "last week").unwrap();
    h.write("weekly.md", "this week");

    h.watcher().scan_once(CancellationToken::new()).await.unwrap();

    assert_eq!(fs::read_to_string(h.processed("weekly.md")).unwrap(), "last week");
    assert_eq!(fs::read_to_string(h.processed("weekly (1).md")).unwrap(), "this week");
}

#[tokio::test]
async fn test_real_extractor_reads_json_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("call.json");
    fs::write(&path, r#"{"transcript": "hello"}"#).unwrap();

    let mut provider = MockProvider::default();
    provider.add_response(
        "Filename: call.json\n\nContent:\nhello",
        serde_json::json!({
            "title": "Greeting",
            "summary": "Someone said hello",
            "action_items": [{"title": "Say hello back"}],
            "tags": ["greetings"]
        })
        .to_string(),
    );
    let store = Arc::new(SqliteStore::new(":memory:").unwrap());
    let pipeline = Pipeline::new(
        Arc::new(Extractor::new(provider.clone(), ExtractorConfig::default())),
        Arc::clone(&store),
        Arc::new(SqliteJournal::new(":memory:").unwrap()),
        "org-test",
        fast_config(),
        dir.path(),
    );

    let outcome = pipeline.process(&path, &CancellationToken::new()).await;
    let reference = outcome.reference().cloned().expect("import should succeed");

    let note = store.fetch_note(&reference.record_id).unwrap().unwrap();
    assert_eq!(note.title, "Greeting");
    assert_eq!(note.item_titles, vec!["Say hello back"]);
    assert_eq!(provider.call_count(), 1);
    assert!(dir.path().join("processed/call.json").exists());
}

#[tokio::test]
async fn test_live_watch_processes_new_files() {
    let h = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Arc::new(h.watcher().with_outcome_sink(tx));
    let cancel = CancellationToken::new();

    let handle = {
        let watcher = Arc::clone(&watcher);
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(cancel).await })
    };

    // Give the subscription time to start before creating files.
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.write("slides.pdf", "%PDF");
    h.write("live.md", "live notes");

    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some((path, outcome)) = rx.recv().await {
            let done = file_name(&path) == "live.md" && outcome.is_success();
            seen.push((file_name(&path), outcome));
            if done {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "live.md was not processed in time: {:?}", seen);

    cancel.cancel();
    let metrics = handle.await.unwrap().unwrap();

    assert_eq!(metrics.succeeded, 1);
    assert!(seen.iter().any(|(name, outcome)| name == "slides.pdf"
        && outcome.skip_reason() == Some(&SkipReason::UnsupportedExtension("pdf".to_string()))));
    assert!(h.root().join("slides.pdf").exists());
    assert!(h.processed("live.md").exists());
    assert_eq!(h.extractor.calls(), 1);
}
