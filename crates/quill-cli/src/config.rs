//! Configuration management for the CLI.
//!
//! Settings are layered: built-in defaults, then the TOML file, then the
//! environment and command-line flags (clap reads both).

use crate::cli::Cli;
use crate::error::{CliError, Result};
use quill_extractor::ExtractorConfig;
use quill_llm::openai::{DEFAULT_ENDPOINT, DEFAULT_MAX_RETRIES, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use quill_watcher::WatcherConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Organization identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Directory to watch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_dir: Option<PathBuf>,

    /// Completion journal location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,

    /// Pipeline settings
    pub watcher: WatcherConfig,

    /// Extraction settings
    pub extractor: ExtractorConfig,

    /// OpenAI settings
    pub openai: OpenAiConfig,

    /// Storage settings
    pub store: StoreConfig,
}

/// OpenAI provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Model name
    pub model: String,

    /// API base URL
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per completion
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Where imported notes are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Supabase (PostgREST API)
    #[default]
    Supabase,
    /// Local SQLite database
    Sqlite,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Database path for the SQLite backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,

    /// Request timeout for the Supabase backend, in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Supabase,
            sqlite_path: None,
            timeout_secs: 30,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Organization identifier
    pub org_id: String,
    /// Directory to watch
    pub watch_dir: PathBuf,
    /// Journal database, `None` for an in-memory journal
    pub journal_path: Option<PathBuf>,
    /// Pipeline settings
    pub watcher: WatcherConfig,
    /// Extraction settings
    pub extractor: ExtractorConfig,
    /// OpenAI settings
    pub openai: OpenAiConfig,
    /// Storage backend
    pub backend: StoreBackend,
    /// SQLite database path
    pub sqlite_path: PathBuf,
    /// Supabase request timeout in seconds
    pub store_timeout_secs: u64,
}

/// Quill's home directory (`~/.quill`).
pub fn quill_home() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
    Ok(home.join(".quill"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(quill_home()?.join("config.toml"))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `~/.quill/config.toml` is
    /// read if present and defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                let path = expand_home(path);
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "Config file {} does not exist",
                        path.display()
                    )));
                }
                path
            }
            None => match Self::path() {
                Ok(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    /// Apply values given on the command line or in the environment.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(org_id) = &cli.org_id {
            self.org_id = Some(org_id.clone());
        }
        if let Some(dir) = &cli.watch_dir {
            self.watch_dir = Some(dir.clone());
        }
        if let Some(backend) = cli.backend {
            self.store.backend = backend;
        }
    }

    /// Validate and fill in defaults.
    pub fn resolve(self, in_memory_journal: bool) -> Result<Settings> {
        let org_id = self
            .org_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                CliError::Config(
                    "Organization ID is required: pass --org-id or set MEETING_NOTES_ORG_ID".into(),
                )
            })?;

        let watch_dir = match self.watch_dir {
            Some(dir) => expand_home(&dir),
            None => dirs::home_dir()
                .map(|home| home.join("Documents").join("Granola"))
                .ok_or_else(|| CliError::Config("No watch directory given and no home directory found".into()))?,
        };

        self.watcher
            .validate()
            .map_err(|e| CliError::Config(format!("[watcher] {}", e)))?;
        self.extractor
            .validate()
            .map_err(|e| CliError::Config(format!("[extractor] {}", e)))?;
        if self.openai.model.trim().is_empty() {
            return Err(CliError::Config("[openai] model must not be empty".into()));
        }
        if self.openai.timeout_secs == 0 || self.store.timeout_secs == 0 {
            return Err(CliError::Config("timeouts must be greater than 0".into()));
        }

        let journal_path = if in_memory_journal {
            None
        } else {
            Some(match self.journal_path {
                Some(path) => expand_home(&path),
                None => quill_home()?.join("journal.db"),
            })
        };

        let sqlite_path = match self.store.sqlite_path {
            Some(path) => expand_home(&path),
            None => quill_home()?.join("notes.db"),
        };

        Ok(Settings {
            org_id,
            watch_dir,
            journal_path,
            watcher: self.watcher,
            extractor: self.extractor,
            openai: self.openai,
            backend: self.store.backend,
            sqlite_path,
            store_timeout_secs: self.store.timeout_secs,
        })
    }
}

/// Supabase project credentials.
#[derive(Debug, Clone)]
pub struct SupabaseCredentials {
    /// Project URL
    pub url: String,
    /// Service-role key
    pub service_key: String,
}

/// Secrets read from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// OpenAI API key
    pub openai_api_key: String,
    /// Supabase credentials, present when the Supabase backend is selected
    pub supabase: Option<SupabaseCredentials>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env(backend: StoreBackend) -> Result<Self> {
        Self::from_lookup(backend, |key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`, reporting every missing variable.
    pub fn from_lookup<F>(backend: StoreBackend, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut missing = Vec::new();

        let openai_api_key = get("OPENAI_API_KEY");
        if openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }

        let supabase = if backend == StoreBackend::Supabase {
            let url = get("SUPABASE_URL").or_else(|| get("NEXT_PUBLIC_SUPABASE_URL"));
            let service_key = get("SUPABASE_SERVICE_ROLE_KEY");
            if url.is_none() {
                missing.push("SUPABASE_URL (or NEXT_PUBLIC_SUPABASE_URL)");
            }
            if service_key.is_none() {
                missing.push("SUPABASE_SERVICE_ROLE_KEY");
            }
            url.zip(service_key)
                .map(|(url, service_key)| SupabaseCredentials { url, service_key })
        } else {
            None
        };

        match openai_api_key {
            Some(openai_api_key) if missing.is_empty() => Ok(Self {
                openai_api_key,
                supabase,
            }),
            _ => Err(CliError::Credentials(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.org_id.is_none());
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.store.backend, StoreBackend::Supabase);
        assert_eq!(config.watcher.processed_dir, "processed");
    }

    #[test]
    fn test_missing_org_id_is_config_error() {
        let err = Config::default().resolve(true).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.exit_code(), 1);

        let config = Config {
            org_id: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(config.resolve(true), Err(CliError::Config(_))));
    }

    #[test]
    fn test_toml_sections() {
        let config = Config::from_toml(
            r#"
            org_id = "org-9"
            watch_dir = "/srv/inbox"

            [watcher]
            max_workers = 2
            extensions = ["md"]

            [openai]
            model = "gpt-4o"

            [store]
            backend = "sqlite"
            sqlite_path = "/srv/notes.db"
            "#,
        )
        .unwrap();

        let settings = config.resolve(true).unwrap();
        assert_eq!(settings.org_id, "org-9");
        assert_eq!(settings.watch_dir, PathBuf::from("/srv/inbox"));
        assert_eq!(settings.watcher.max_workers, 2);
        assert_eq!(settings.watcher.stable_polls, 2);
        assert_eq!(settings.openai.model, "gpt-4o");
        assert_eq!(settings.openai.max_retries, 3);
        assert_eq!(settings.backend, StoreBackend::Sqlite);
        assert_eq!(settings.sqlite_path, PathBuf::from("/srv/notes.db"));
        assert!(settings.journal_path.is_none());
    }

    #[test]
    fn test_invalid_watcher_section() {
        let config = Config::from_toml("org_id = \"o\"\n[watcher]\nstable_polls = 1").unwrap();
        assert!(matches!(config.resolve(true), Err(CliError::Config(_))));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = Config::from_toml("org_id = \"from-file\"\nwatch_dir = \"/a\"").unwrap();
        let cli = Cli::try_parse_from(["quill", "--org-id", "from-flag", "--dir", "/b", "--backend", "sqlite"])
            .unwrap();
        config.apply_cli(&cli);

        assert_eq!(config.org_id.as_deref(), Some("from-flag"));
        assert_eq!(config.watch_dir, Some(PathBuf::from("/b")));
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));

        let path = dir.path().join("quill.toml");
        fs::write(&path, "org_id = \"x\"").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().org_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_credentials_supabase() {
        let vars = env(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("NEXT_PUBLIC_SUPABASE_URL", "https://p.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "svc"),
        ]);
        let creds = Credentials::from_lookup(StoreBackend::Supabase, |k| vars.get(k).cloned()).unwrap();
        let supabase = creds.supabase.unwrap();
        assert_eq!(supabase.url, "https://p.supabase.co");
        assert_eq!(creds.openai_api_key, "sk-1");
    }

    #[test]
    fn test_credentials_missing() {
        let vars = env(&[("SUPABASE_URL", "https://p.supabase.co")]);
        let err = Credentials::from_lookup(StoreBackend::Supabase, |k| vars.get(k).cloned()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("OPENAI_API_KEY"));
        assert!(message.contains("SUPABASE_SERVICE_ROLE_KEY"));
        assert!(!message.contains("SUPABASE_URL (or"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_sqlite_backend_needs_only_openai() {
        let vars = env(&[("OPENAI_API_KEY", "sk-1")]);
        let creds = Credentials::from_lookup(StoreBackend::Sqlite, |k| vars.get(k).cloned()).unwrap();
        assert!(creds.supabase.is_none());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/notes")), home.join("notes"));
        }
    }
}
