//! `config.ini` settings.
//!
//! ```ini
//! [download]
//! path = ./download
//! concurrency = 5
//! include_video = false
//! retry_delay_secs = 5
//! max_attempts = 0
//! auto_place = none
//!
//! [logging]
//! debug = false
//! directory = ./logs
//! ```
//!
//! A missing file means defaults. Keys are addressed as `section.key` by
//! [`ConfigKey`], which is also the single place values are parsed.

mod keys;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::install::GameClient;
use crate::pool::{PoolConfig, RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_RETRY_DELAY_SECS};

pub use keys::ConfigKey;

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Post-download hand-off target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutoPlace {
    #[default]
    None,
    Client(GameClient),
}

impl AutoPlace {
    pub fn client(&self) -> Option<GameClient> {
        match self {
            AutoPlace::None => None,
            AutoPlace::Client(client) => Some(*client),
        }
    }
}

impl fmt::Display for AutoPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoPlace::None => f.write_str("none"),
            AutoPlace::Client(client) => fmt::Display::fmt(client, f),
        }
    }
}

impl FromStr for AutoPlace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(AutoPlace::None);
        }
        s.parse::<GameClient>()
            .map(AutoPlace::Client)
            .map_err(|_| format!("expected none, stable or lazer, got '{}'", s))
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub path: PathBuf,
    pub concurrency: usize,
    pub include_video: bool,
    pub retry_delay_secs: u64,
    /// `0` retries until cancelled.
    pub max_attempts: u32,
    pub auto_place: AutoPlace,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("download"),
            concurrency: DEFAULT_CONCURRENCY,
            include_video: false,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_attempts: 0,
            auto_place: AutoPlace::None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub debug: bool,
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            debug: false,
            directory: PathBuf::from("logs"),
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads from [`config_file_path`]; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parses settings from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from(CONFIG_FILE_NAME),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Renders every setting as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Writes to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Retry policy described by the `[download]` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_attempts(
            self.download.max_attempts,
            Duration::from_secs(self.download.retry_delay_secs),
        )
    }

    /// Pool configuration described by the `[download]` section.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(&self.download.path)
            .with_concurrency(self.download.concurrency)
            .with_retry(self.retry_policy())
    }
}

/// Location of `config.ini`.
///
/// The current directory wins, then the directory of the executable. When
/// neither has one, the current-directory path is returned so a later save
/// creates it there.
pub fn config_file_path() -> PathBuf {
    let cwd = PathBuf::from(CONFIG_FILE_NAME);
    if cwd.exists() {
        return cwd;
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .filter(|path| path.exists())
        .unwrap_or(cwd)
}
