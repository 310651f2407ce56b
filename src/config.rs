//! TOML configuration parsing.
//!
//! ```toml
//! [db]
//! path = "./data/archive.sqlite"
//!
//! [import]
//! allowed_extensions = ["pdf", "docx"]
//!
//! [watcher]
//! enabled = true
//! path = "./inbox"
//! target_folder = "AutoImport"
//! max_retries = 10
//! retry_delay_ms = 500
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::file_types::FileTypePolicy;
use crate::folders::validate_name;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,
    #[serde(default = "default_target_folder")]
    pub target_folder: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Offer files already sitting in the inbox when the watcher starts.
    #[serde(default)]
    pub scan_existing_on_start: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_watch_path(),
            target_folder: default_target_folder(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            scan_existing_on_start: false,
        }
    }
}

fn default_watch_path() -> PathBuf {
    PathBuf::from("./inbox")
}
fn default_target_folder() -> String {
    "AutoImport".to_string()
}
fn default_max_retries() -> u32 {
    10
}
fn default_retry_delay_ms() -> u64 {
    500
}

impl WatcherConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// A configuration with defaults everywhere except the database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            import: ImportConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }

    pub fn file_policy(&self) -> FileTypePolicy {
        FileTypePolicy::new(&self.import.allowed_extensions)
    }

    /// Root-level folder names that may not be renamed, moved, or deleted.
    pub fn special_folders(&self) -> Vec<String> {
        vec![self.watcher.target_folder.clone()]
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.import.allowed_extensions.is_empty() {
        anyhow::bail!("import.allowed_extensions must not be empty");
    }

    if let Err(e) = validate_name(&config.watcher.target_folder) {
        anyhow::bail!("watcher.target_folder is not a valid folder name: {}", e);
    }

    if config.watcher.max_retries == 0 {
        anyhow::bail!("watcher.max_retries must be >= 1");
    }

    if config.watcher.enabled && config.watcher.path.as_os_str().is_empty() {
        anyhow::bail!("watcher.path must be set when the watcher is enabled");
    }

    Ok(())
}
