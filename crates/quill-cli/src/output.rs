//! Output formatting for the CLI.

use colored::*;
use quill_watcher::{ProcessingOutcome, WatcherMetrics};
use std::path::Path;

/// Output formatter.
pub struct Formatter {
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(color_enabled: bool) -> Self {
        Self { color_enabled }
    }

    /// Startup banner naming the watched directory and formats.
    pub fn banner(&self, watch_dir: &Path, formats: &str, org_id: &str) -> String {
        let rule = "=".repeat(50);
        [
            self.colorize(&rule, "cyan"),
            self.colorize("  Quill: meeting notes auto-import", "cyan"),
            self.colorize(&rule, "cyan"),
            String::new(),
            format!("Watching:     {}", watch_dir.display()),
            format!("Formats:      {}", formats),
            format!("Organization: {}", org_id),
            String::new(),
            "Press Ctrl+C to stop".to_string(),
        ]
        .join("\n")
    }

    /// One-line description of a single file's outcome.
    pub fn outcome(&self, file: &Path, outcome: &ProcessingOutcome) -> String {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        match outcome {
            ProcessingOutcome::Success { reference, recovered } => {
                let verb = if *recovered { "Moved (already imported)" } else { "Imported" };
                format!(
                    "{} {}\n   Note ID: {}\n   Action Items: {}",
                    self.colorize(verb, "green"),
                    name,
                    reference.record_id,
                    reference.item_count
                )
            }
            ProcessingOutcome::Skipped(reason) => {
                format!("{} {}: {}", self.colorize("Skipped", "yellow"), name, reason)
            }
            ProcessingOutcome::Failed(e) => {
                format!("{} {}: {}", self.colorize("Failed", "red"), name, e)
            }
        }
    }

    /// Run summary.
    pub fn summary(&self, metrics: &WatcherMetrics) -> String {
        let summary = metrics.summary();
        if metrics.total_failed() > 0 {
            self.colorize(&summary, "yellow")
        } else {
            summary
        }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}
