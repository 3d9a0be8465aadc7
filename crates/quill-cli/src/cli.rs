//! CLI command definitions and argument parsing.

use crate::config::StoreBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quill - import meeting-notes exports from a watched folder.
#[derive(Debug, Parser)]
#[command(name = "quill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Organization the notes are imported into
    #[arg(long, env = "MEETING_NOTES_ORG_ID", global = true)]
    pub org_id: Option<String>,

    /// Directory to watch
    #[arg(long = "dir", env = "MEETING_NOTES_WATCH_DIR", global = true)]
    pub watch_dir: Option<PathBuf>,

    /// Configuration file path (default: ~/.quill/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend
    #[arg(long, value_enum, global = true)]
    pub backend: Option<StoreBackend>,

    /// Keep the completion journal in memory for this run only
    #[arg(long, global = true)]
    pub no_journal: bool,

    /// Log filter, e.g. "debug" or "quill_watcher=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import the backlog, then watch for new files until interrupted (default)
    Watch,

    /// Import the current backlog once and exit
    Scan,

    /// Import a single file
    Ingest(IngestArgs),
}

/// Arguments for the ingest command.
#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// File to import
    pub file: PathBuf,
}
