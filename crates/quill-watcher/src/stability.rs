//! Detecting when a file has finished being written

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of waiting for a file to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size stopped changing; carries the settled size in bytes
    Stable(u64),
    /// The path disappeared between polls
    Vanished,
    /// The budget ran out while the size was still changing (or zero)
    TimedOut,
    /// Shutdown was requested while waiting
    Cancelled,
}

/// Polls a file's size until it stops changing.
///
/// A file is stable once `stable_polls` consecutive polls see the same
/// non-zero size as the poll before them. Zero-byte files never settle: an
/// editor that has created but not yet written a file looks exactly like
/// that.
#[derive(Debug, Clone)]
pub struct StabilityDetector {
    interval: Duration,
    stable_polls: u32,
}

impl StabilityDetector {
    /// Create a detector. `stable_polls` is raised to 2 if lower.
    pub fn new(interval: Duration, stable_polls: u32) -> Self {
        Self {
            interval,
            stable_polls: stable_polls.max(2),
        }
    }

    /// Wait until `path` is stable, vanishes, times out or `cancel` fires
    pub async fn await_stable(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Stability {
        let deadline = Instant::now() + timeout;
        let mut last_size: Option<u64> = None;
        let mut unchanged = 0u32;

        loop {
            match tokio::fs::metadata(path).await {
                Ok(metadata) if metadata.is_file() => {
                    let size = metadata.len();
                    if size > 0 && last_size == Some(size) {
                        unchanged += 1;
                        if unchanged >= self.stable_polls {
                            debug!("{} stable at {} bytes", path.display(), size);
                            return Stability::Stable(size);
                        }
                    } else {
                        unchanged = 0;
                    }
                    last_size = Some(size);
                }
                Ok(_) => return Stability::Vanished,
                Err(e) if e.kind() == ErrorKind::NotFound => return Stability::Vanished,
                Err(e) => {
                    debug!("Polling {} failed: {}", path.display(), e);
                    unchanged = 0;
                    last_size = None;
                }
            }

            if Instant::now() >= deadline {
                return Stability::TimedOut;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Stability::Cancelled,
                _ = sleep(self.interval) => {}
            }
        }
    }
}
