//! Configuration for the journal.
//!
//! `JournalConfig` is read from `config.toml` in the journal home directory.
//! Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the journal home directory.
pub const JOURNAL_HOME_ENV: &str = "JOURNAL_HOME";

fn default_debounce_window_ms() -> u64 {
    1000
}

fn default_max_staleness_ms() -> u64 {
    5000
}

/// Where the library (one file per entry) lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LibraryLocation {
    /// `<desktop>/Journal/UserData`
    #[default]
    Desktop,
    /// `<home>/Journal/UserData`
    Home,
    /// An explicit directory, used as-is.
    Path(PathBuf),
}

/// How much of the library is read at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingMode {
    /// Decode every entry file.
    #[default]
    Immediate,
    /// Only make sure the directory exists; start with no entries.
    WriteOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub location: LibraryLocation,
    /// Quiet period after the last save before the library is written.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
    /// Longest a pending change may wait while saves keep arriving.
    #[serde(default = "default_max_staleness_ms")]
    pub max_staleness_ms: u64,
    /// Artificial minimum duration of a library load.
    #[serde(default)]
    pub minimum_load_latency_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            location: LibraryLocation::default(),
            debounce_window_ms: default_debounce_window_ms(),
            max_staleness_ms: default_max_staleness_ms(),
            minimum_load_latency_ms: 0,
        }
    }
}

impl JournalConfig {
    /// Load `config.toml` from the journal home.
    ///
    /// Precedence for the home directory:
    /// 1. `home_override` (from the --home CLI flag)
    /// 2. `JOURNAL_HOME` environment variable
    /// 3. `~/.journal`
    pub fn load(home_override: Option<PathBuf>) -> io::Result<Self> {
        let home = resolve_home(home_override)?;
        Self::from_file(&home.join("config.toml"))
    }

    /// Parse a config file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse config: {}", e),
            )
        })
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// Never shorter than the debounce window.
    pub fn max_staleness(&self) -> Duration {
        Duration::from_millis(self.max_staleness_ms.max(self.debounce_window_ms))
    }

    pub fn minimum_load_latency(&self) -> Duration {
        Duration::from_millis(self.minimum_load_latency_ms)
    }
}

/// Resolve the journal home directory (where `config.toml` lives).
pub fn resolve_home(home_override: Option<PathBuf>) -> io::Result<PathBuf> {
    if let Some(path) = home_override {
        return Ok(path);
    }
    if let Ok(home) = std::env::var(JOURNAL_HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }
    let home = dirs_next::home_dir()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Home directory not found"))?;
    Ok(home.join(".journal"))
}

/// Runtime configuration: file settings plus the loading mode chosen by
/// the command being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub loading_mode: LoadingMode,
    pub journal: JournalConfig,
}

impl AppConfig {
    /// Reads the whole library on start.
    pub fn development(journal: JournalConfig) -> Self {
        Self {
            loading_mode: LoadingMode::Immediate,
            journal,
        }
    }

    /// Skips reading the library; for commands that only add entries.
    pub fn add_only(journal: JournalConfig) -> Self {
        Self {
            loading_mode: LoadingMode::WriteOnly,
            journal,
        }
    }
}
