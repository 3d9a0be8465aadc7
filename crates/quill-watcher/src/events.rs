//! Filesystem event subscription
//!
//! Bridges the `notify` watcher thread into a bounded tokio channel and
//! reduces raw events to the paths that newly appeared in the directory.

use crate::WatcherError;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Live subscription to one directory (non-recursive)
pub struct DirectoryEvents {
    // Dropping the watcher ends the subscription.
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<notify::Result<Event>>,
}

impl DirectoryEvents {
    /// Start watching `dir`. At most `buffer` events are queued; beyond
    /// that the notify thread waits for the consumer.
    pub fn subscribe(dir: &Path, buffer: usize) -> Result<Self, WatcherError> {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                if tx.blocking_send(res).is_err() {
                    debug!("Event receiver closed, dropping event");
                }
            },
            Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching directory: {}", dir.display());

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next raw event; `None` once the watcher has shut down
    pub async fn next_event(&mut self) -> Option<notify::Result<Event>> {
        self.receiver.recv().await
    }
}

/// Paths an event reports as newly present in the directory.
///
/// Creations and rename targets count. Platforms that cannot tell the two
/// sides of a rename apart report `RenameMode::Any`; those paths count only
/// if they currently exist.
pub fn appeared_paths(event: &Event) -> Vec<PathBuf> {
    match &event.kind {
        EventKind::Create(_) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.clone(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|p| p.exists()).cloned().collect()
        }
        _ => Vec::new(),
    }
}
