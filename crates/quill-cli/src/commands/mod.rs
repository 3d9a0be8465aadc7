//! Command implementations.
//!
//! Adapters are built on the main thread before the async runtime starts;
//! the HTTP clients they hold are blocking and must not be created or
//! dropped on a runtime worker.

mod ingest;
mod scan;
mod watch;

pub use ingest::execute_ingest;
pub use scan::execute_scan;
pub use watch::execute_watch;

use crate::config::{Credentials, Settings, StoreBackend};
use crate::error::{CliError, Result};
use chrono::NaiveDateTime;
use quill_domain::traits::PersistenceAdapter;
use quill_domain::{ExtractedRecord, PersistedReference};
use quill_extractor::Extractor;
use quill_llm::OpenAiProvider;
use quill_store::{SqliteJournal, SqliteStore, StoreError, SupabaseStore};
use quill_watcher::Pipeline;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The pipeline as wired by the binary
pub type AppPipeline = Pipeline<Extractor<OpenAiProvider>, NoteStore, SqliteJournal>;

/// Storage backend selected at startup
pub enum NoteStore {
    /// Supabase project
    Supabase(SupabaseStore),
    /// Local SQLite database
    Sqlite(SqliteStore),
}

impl PersistenceAdapter for NoteStore {
    type Error = StoreError;

    fn persist(
        &self,
        record: &ExtractedRecord,
        org_id: &str,
        meeting_date: Option<NaiveDateTime>,
    ) -> std::result::Result<PersistedReference, StoreError> {
        match self {
            Self::Supabase(store) => store.persist(record, org_id, meeting_date),
            Self::Sqlite(store) => store.persist(record, org_id, meeting_date),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Wire adapters for files in `watch_dir`.
pub fn build_pipeline(settings: &Settings, credentials: &Credentials, watch_dir: &Path) -> Result<AppPipeline> {
    let provider = OpenAiProvider::new(
        &credentials.openai_api_key,
        &settings.openai.model,
        Duration::from_secs(settings.openai.timeout_secs),
    )?
    .with_endpoint(&settings.openai.endpoint)
    .with_max_retries(settings.openai.max_retries);
    let extractor = Extractor::new(provider, settings.extractor.clone());

    let store = match settings.backend {
        StoreBackend::Supabase => {
            let supabase = credentials
                .supabase
                .as_ref()
                .ok_or_else(|| CliError::Credentials("Supabase credentials are not set".into()))?;
            NoteStore::Supabase(SupabaseStore::new(
                &supabase.url,
                &supabase.service_key,
                Duration::from_secs(settings.store_timeout_secs),
            )?)
        }
        StoreBackend::Sqlite => {
            ensure_parent(&settings.sqlite_path)?;
            info!("Storing notes in {}", settings.sqlite_path.display());
            NoteStore::Sqlite(SqliteStore::new(&settings.sqlite_path)?)
        }
    };

    let journal = match &settings.journal_path {
        Some(path) => {
            ensure_parent(path)?;
            SqliteJournal::new(path)?
        }
        None => {
            warn!("Completion journal is in memory; a crash before a move may duplicate a note");
            SqliteJournal::new(":memory:")?
        }
    };

    Ok(Pipeline::new(
        Arc::new(extractor),
        Arc::new(store),
        Arc::new(journal),
        settings.org_id.clone(),
        settings.watcher.clone(),
        watch_dir,
    ))
}

/// Build the multi-threaded runtime used by every command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Cancel `token` on Ctrl+C (and SIGTERM on Unix).
pub async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received, finishing in-flight files");
    token.cancel();
}
