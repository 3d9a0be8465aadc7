//! Quill - import meeting-notes exports from a watched folder.

use clap::Parser;
use quill_cli::commands;
use quill_cli::{Cli, Command, Config, Credentials, Formatter};
use tracing_subscriber::EnvFilter;

fn main() {
    // `.env.local` wins over `.env`; neither overrides the real environment.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> quill_cli::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    let settings = config.resolve(cli.no_journal)?;
    let credentials = Credentials::from_env(settings.backend)?;

    let formatter = Formatter::new(!cli.no_color);

    match cli.command {
        None | Some(Command::Watch) => commands::execute_watch(&settings, &credentials, &formatter),
        Some(Command::Scan) => commands::execute_scan(&settings, &credentials, &formatter),
        Some(Command::Ingest(args)) => commands::execute_ingest(args, &settings, &credentials, &formatter),
    }
}
