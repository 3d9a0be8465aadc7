//! `quill watch`: backlog scan, then live watching until interrupted.

use super::{build_pipeline, cancel_on_signal, runtime};
use crate::config::{Credentials, Settings};
use crate::error::Result;
use crate::output::Formatter;
use quill_watcher::Watcher;
use tokio_util::sync::CancellationToken;

/// Execute the watch command.
pub fn execute_watch(settings: &Settings, credentials: &Credentials, formatter: &Formatter) -> Result<()> {
    let pipeline = build_pipeline(settings, credentials, &settings.watch_dir)?;
    let watcher = Watcher::new(pipeline);

    println!(
        "{}\n",
        formatter.banner(&settings.watch_dir, &settings.watcher.formats(), &settings.org_id)
    );

    let cancel = CancellationToken::new();
    let metrics = runtime()?.block_on(async {
        tokio::spawn(cancel_on_signal(cancel.clone()));
        watcher.run(cancel).await
    })?;

    println!("\n{}", formatter.summary(&metrics));
    Ok(())
}
