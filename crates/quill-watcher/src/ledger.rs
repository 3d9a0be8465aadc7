//! In-memory claim ledger
//!
//! The ledger is the single serialization point of the pipeline: a worker
//! may only extract, persist and move a file while it holds the claim for
//! that file's normalized path.

use quill_domain::SourceFingerprint;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Completion {
    fingerprint: SourceFingerprint,
    at: Instant,
}

impl Completion {
    fn is_generation(&self, fingerprint: &SourceFingerprint) -> bool {
        self.fingerprint.size == fingerprint.size
            && self.fingerprint.modified_nanos == fingerprint.modified_nanos
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    in_flight: HashSet<PathBuf>,
    completed: HashMap<PathBuf, Completion>,
}

/// Record of paths being processed or already processed in this run
///
/// A completed path is remembered together with the fingerprint of the file
/// that was processed. A later file under the same name is a new generation
/// and can be claimed again.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct IngestionLedger {
    state: Arc<Mutex<LedgerState>>,
}

/// Exclusive claim on one normalized path
///
/// Dropping the token releases the claim. [`ClaimToken::complete`] also
/// marks the file generation as processed.
#[derive(Debug)]
pub struct ClaimToken {
    ledger: IngestionLedger,
    path: PathBuf,
}

impl IngestionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Every critical section leaves the sets consistent, so a poisoned
        // lock still guards valid state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `path` unless it is in flight or this generation of the file
    /// (`fingerprint`) was already completed
    pub fn try_claim(&self, path: &Path, fingerprint: &SourceFingerprint) -> Option<ClaimToken> {
        let path = normalize_path(path);
        let mut state = self.lock();
        if state.in_flight.contains(&path) {
            return None;
        }
        match state.completed.get(&path) {
            Some(done) if done.is_generation(fingerprint) => return None,
            Some(_) => {
                debug!("New file under processed name {}", path.display());
                state.completed.remove(&path);
            }
            None => {}
        }
        state.in_flight.insert(path.clone());
        debug!("Claimed {}", path.display());
        Some(ClaimToken {
            ledger: self.clone(),
            path,
        })
    }

    /// Whether a worker currently holds the claim for `path`
    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.lock().in_flight.contains(&normalize_path(path))
    }

    /// Whether some file under `path` was completed earlier in this run
    pub fn is_known_processed(&self, path: &Path) -> bool {
        self.lock().completed.contains_key(&normalize_path(path))
    }

    /// Whether exactly this generation of a file was completed.
    ///
    /// `fingerprint.path` must already be normalized.
    pub fn is_processed_generation(&self, fingerprint: &SourceFingerprint) -> bool {
        self.lock()
            .completed
            .get(&fingerprint.path)
            .is_some_and(|done| done.is_generation(fingerprint))
    }

    /// Forget a completed path so a new file with the same name can be
    /// claimed again
    pub fn forget(&self, path: &Path) -> bool {
        self.lock().completed.remove(&normalize_path(path)).is_some()
    }

    /// Drop completions recorded before `cutoff`; returns how many
    pub fn evict_completed_before(&self, cutoff: Instant) -> usize {
        let mut state = self.lock();
        let before = state.completed.len();
        state.completed.retain(|_, done| done.at >= cutoff);
        let evicted = before - state.completed.len();
        if evicted > 0 {
            debug!("Evicted {} completed path(s)", evicted);
        }
        evicted
    }

    /// Number of claims currently held
    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Number of completed paths remembered
    pub fn completed_count(&self) -> usize {
        self.lock().completed.len()
    }

    fn release(&self, path: &Path) {
        if self.lock().in_flight.remove(path) {
            debug!("Released {}", path.display());
        }
    }
}

impl ClaimToken {
    /// Normalized path this token claims
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark this generation processed and release the claim
    pub fn complete(self, fingerprint: SourceFingerprint) {
        let completion = Completion {
            fingerprint,
            at: Instant::now(),
        };
        self.ledger.lock().completed.insert(self.path.clone(), completion);
    }

    /// Release the claim without marking completion
    pub fn release(self) {}
}

impl Drop for ClaimToken {
    fn drop(&mut self) {
        self.ledger.release(&self.path);
    }
}

/// Resolve `path` to an absolute, case-preserved form.
///
/// The parent directory is canonicalized so that a backlog scan and a live
/// event naming the same file through different spellings (relative paths,
/// symlinked directories, `..` segments) agree. The file name itself is kept
/// as given, since the file may already be gone.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}
