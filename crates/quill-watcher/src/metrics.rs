//! Metrics collection for Watcher runs

use crate::ProcessingOutcome;
use std::collections::BTreeMap;

/// Counters collected while the Watcher runs
///
/// Tracks imports, skips per reason, failures per error kind and scans.
#[derive(Debug, Clone, Default)]
pub struct WatcherMetrics {
    /// Files persisted and moved in this run
    pub succeeded: usize,

    /// Files moved using a journaled reference instead of a new persist
    pub recovered: usize,

    /// Tagged items stored across all successful imports
    pub items_stored: usize,

    /// Skipped candidates per reason
    pub skipped: BTreeMap<&'static str, usize>,

    /// Failed candidates per error kind
    pub failed: BTreeMap<&'static str, usize>,

    /// Directory scans performed (backlog and periodic)
    pub scan_count: usize,
}

impl WatcherMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal outcome
    pub fn record(&mut self, outcome: &ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Success { reference, recovered } => {
                if *recovered {
                    self.recovered += 1;
                } else {
                    self.succeeded += 1;
                    self.items_stored += reference.item_count;
                }
            }
            ProcessingOutcome::Skipped(reason) => {
                *self.skipped.entry(reason.as_str()).or_insert(0) += 1;
            }
            ProcessingOutcome::Failed(e) => {
                *self.failed.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }

    /// Record a directory scan
    pub fn record_scan(&mut self) {
        self.scan_count += 1;
    }

    /// Total skipped candidates
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Total failed candidates
    pub fn total_failed(&self) -> usize {
        self.failed.values().sum()
    }

    /// Total terminal outcomes recorded
    pub fn total_outcomes(&self) -> usize {
        self.succeeded + self.recovered + self.total_skipped() + self.total_failed()
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Import Summary".to_string(),
            "==============".to_string(),
            format!("Scans: {}", self.scan_count),
            format!("Imported: {} ({} action items)", self.succeeded, self.items_stored),
        ];

        if self.recovered > 0 {
            lines.push(format!("Recovered from journal: {}", self.recovered));
        }

        if !self.skipped.is_empty() {
            lines.push(String::new());
            lines.push("Skipped:".to_string());
            for (reason, count) in &self.skipped {
                lines.push(format!("  {}: {}", reason, count));
            }
        }

        if !self.failed.is_empty() {
            lines.push(String::new());
            lines.push("Failed:".to_string());
            for (kind, count) in &self.failed {
                lines.push(format!("  {}: {}", kind, count));
            }
            lines.push(format!("  Total: {}", self.total_failed()));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SkipReason, WatcherError};
    use quill_domain::{PersistedReference, RecordId};

    fn success(items: usize, recovered: bool) -> ProcessingOutcome {
        ProcessingOutcome::Success {
            reference: PersistedReference::new(RecordId::new("x"), items),
            recovered,
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = WatcherMetrics::new();
        assert_eq!(metrics.total_outcomes(), 0);
        assert_eq!(metrics.scan_count, 0);
    }

    #[test]
    fn test_record_outcomes() {
        let mut metrics = WatcherMetrics::new();
        metrics.record(&success(3, false));
        metrics.record(&success(1, true));
        metrics.record(&ProcessingOutcome::Skipped(SkipReason::Vanished));
        metrics.record(&ProcessingOutcome::Skipped(SkipReason::Vanished));
        metrics.record(&ProcessingOutcome::Failed(WatcherError::Persistence("down".into())));

        assert_eq!(metrics.succeeded, 1);
        assert_eq!(metrics.recovered, 1);
        assert_eq!(metrics.items_stored, 3);
        assert_eq!(metrics.skipped.get("vanished"), Some(&2));
        assert_eq!(metrics.failed.get("persistence"), Some(&1));
        assert_eq!(metrics.total_outcomes(), 5);
    }

    #[test]
    fn test_summary() {
        let mut metrics = WatcherMetrics::new();
        metrics.record(&success(2, false));
        metrics.record(&ProcessingOutcome::Failed(WatcherError::Extraction("bad".into())));
        metrics.record_scan();

        let summary = metrics.summary();
        assert!(summary.contains("Scans: 1"));
        assert!(summary.contains("Imported: 1 (2 action items)"));
        assert!(summary.contains("extraction: 1"));
        assert!(!summary.contains("Skipped:"));
    }
}
