//! Configuration for the ingestion pipeline
//!
//! Defines the recognized formats, stability polling and worker limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Watcher
///
/// # Examples
///
/// ```
/// use quill_watcher::WatcherConfig;
///
/// let config = WatcherConfig::default();
/// assert_eq!(config.stable_polls, 2);
/// assert!(config.is_supported("MD"));
/// assert!(!config.is_supported("pdf"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Recognized file extensions, without the dot
    /// Default: txt, md, json
    pub extensions: Vec<String>,

    /// Name of the processed subdirectory inside the watched directory
    /// Default: "processed"
    pub processed_dir: String,

    /// Interval between size polls while waiting for a file to settle
    /// Default: 1000 ms
    pub poll_interval_ms: u64,

    /// Consecutive unchanged non-zero size readings required before a file
    /// counts as stable. Must be at least 2.
    /// Default: 2
    pub stable_polls: u32,

    /// Wall-clock budget for one stability wait
    /// Default: 30 seconds
    pub stability_timeout_secs: u64,

    /// How many times a timed-out candidate is requeued before failing
    /// Default: 1
    pub stability_retries: u32,

    /// Maximum candidates processed concurrently
    /// Default: 4
    pub max_workers: usize,

    /// Capacity of the filesystem event channel
    /// Default: 256
    pub event_buffer: usize,

    /// Interval between directory rescans; 0 disables periodic rescans
    /// Default: 300 seconds
    pub rescan_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".to_string(), "md".to_string(), "json".to_string()],
            processed_dir: "processed".to_string(),
            poll_interval_ms: 1000,
            stable_polls: 2,
            stability_timeout_secs: 30,
            stability_retries: 1,
            max_workers: 4,
            event_buffer: 256,
            rescan_interval_secs: 300,
        }
    }
}

impl WatcherConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.extensions.is_empty() {
            return Err("extensions must not be empty".to_string());
        }
        if self.processed_dir.trim().is_empty()
            || self.processed_dir.contains('/')
            || self.processed_dir.contains('\\')
            || self.processed_dir.starts_with('.')
        {
            return Err(format!(
                "processed_dir must be a plain directory name, got '{}'",
                self.processed_dir
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than 0".to_string());
        }
        if self.stable_polls < 2 {
            return Err("stable_polls must be at least 2".to_string());
        }
        if self.stability_timeout_secs == 0 {
            return Err("stability_timeout_secs must be greater than 0".to_string());
        }
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether `extension` (without the dot, any case) is recognized
    pub fn is_supported(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }

    /// Recognized extensions formatted for display (".txt, .md, .json")
    pub fn formats(&self) -> String {
        self.extensions
            .iter()
            .map(|e| format!(".{}", e.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get stability timeout as Duration
    pub fn stability_timeout(&self) -> Duration {
        Duration::from_secs(self.stability_timeout_secs)
    }

    /// Get rescan interval, `None` when periodic rescans are disabled
    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.rescan_interval_secs > 0).then(|| Duration::from_secs(self.rescan_interval_secs))
    }
}
