//! `quill scan`: import the current backlog once.

use super::{build_pipeline, cancel_on_signal, runtime};
use crate::config::{Credentials, Settings};
use crate::error::Result;
use crate::output::Formatter;
use quill_watcher::Watcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Execute the scan command.
pub fn execute_scan(settings: &Settings, credentials: &Credentials, formatter: &Formatter) -> Result<()> {
    let pipeline = build_pipeline(settings, credentials, &settings.watch_dir)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Watcher::new(pipeline).with_outcome_sink(tx);

    let cancel = CancellationToken::new();
    let metrics = runtime()?.block_on(async {
        tokio::spawn(cancel_on_signal(cancel.clone()));
        watcher.scan_once(cancel).await
    })?;

    while let Ok((path, outcome)) = rx.try_recv() {
        println!("{}", formatter.outcome(&path, &outcome));
    }
    println!("\n{}", formatter.summary(&metrics));
    Ok(())
}
