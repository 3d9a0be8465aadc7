//! `quill ingest <FILE>`: import a single file.

use super::{build_pipeline, runtime};
use crate::cli::IngestArgs;
use crate::config::{Credentials, Settings};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use quill_watcher::{normalize_path, ProcessingOutcome, Watcher};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Directory whose processed area receives `file`.
///
/// Files in the watch directory use its processed area; anything else uses
/// the processed area next to the file.
pub(crate) fn home_dir_for(file: &Path, watch_dir: &Path) -> PathBuf {
    let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let watch_dir = watch_dir.canonicalize().unwrap_or_else(|_| watch_dir.to_path_buf());
    if parent == watch_dir {
        watch_dir
    } else {
        parent
    }
}

/// Execute the ingest command.
pub fn execute_ingest(
    args: IngestArgs,
    settings: &Settings,
    credentials: &Credentials,
    formatter: &Formatter,
) -> Result<()> {
    if !args.file.is_file() {
        return Err(CliError::Import(format!("{} is not a file", args.file.display())));
    }
    let file = normalize_path(&args.file);
    let dir = home_dir_for(&file, &settings.watch_dir);

    let watcher = Watcher::new(build_pipeline(settings, credentials, &dir)?);
    let cancel = CancellationToken::new();
    let outcome = runtime()?.block_on(watcher.ingest(&file, &cancel))?;

    println!("{}", formatter.outcome(&file, &outcome));
    match outcome {
        ProcessingOutcome::Success { .. } => Ok(()),
        other => Err(CliError::Import(other.to_string())),
    }
}
