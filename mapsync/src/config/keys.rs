//! Addressable configuration keys.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{AutoPlace, ConfigError, ConfigFile};

/// A single `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    DownloadPath,
    DownloadConcurrency,
    DownloadIncludeVideo,
    DownloadRetryDelaySecs,
    DownloadMaxAttempts,
    DownloadAutoPlace,
    LoggingDebug,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::DownloadPath,
            ConfigKey::DownloadConcurrency,
            ConfigKey::DownloadIncludeVideo,
            ConfigKey::DownloadRetryDelaySecs,
            ConfigKey::DownloadMaxAttempts,
            ConfigKey::DownloadAutoPlace,
            ConfigKey::LoggingDebug,
            ConfigKey::LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::LoggingDebug | ConfigKey::LoggingDirectory => "logging",
            _ => "download",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::DownloadPath => "path",
            ConfigKey::DownloadConcurrency => "concurrency",
            ConfigKey::DownloadIncludeVideo => "include_video",
            ConfigKey::DownloadRetryDelaySecs => "retry_delay_secs",
            ConfigKey::DownloadMaxAttempts => "max_attempts",
            ConfigKey::DownloadAutoPlace => "auto_place",
            ConfigKey::LoggingDebug => "debug",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// `section.key`
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value rendered as config text.
    pub fn get(&self, config: &ConfigFile) -> String {
        let download = &config.download;
        match self {
            ConfigKey::DownloadPath => download.path.display().to_string(),
            ConfigKey::DownloadConcurrency => download.concurrency.to_string(),
            ConfigKey::DownloadIncludeVideo => download.include_video.to_string(),
            ConfigKey::DownloadRetryDelaySecs => download.retry_delay_secs.to_string(),
            ConfigKey::DownloadMaxAttempts => download.max_attempts.to_string(),
            ConfigKey::DownloadAutoPlace => download.auto_place.to_string(),
            ConfigKey::LoggingDebug => config.logging.debug.to_string(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Parses `value` and stores it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::DownloadPath => config.download.path = self.parse_path(value)?,
            ConfigKey::DownloadConcurrency => {
                let concurrency: usize = self.parse_number(value)?;
                if concurrency == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.download.concurrency = concurrency;
            }
            ConfigKey::DownloadIncludeVideo => config.download.include_video = self.parse_bool(value)?,
            ConfigKey::DownloadRetryDelaySecs => {
                config.download.retry_delay_secs = self.parse_number(value)?
            }
            ConfigKey::DownloadMaxAttempts => config.download.max_attempts = self.parse_number(value)?,
            ConfigKey::DownloadAutoPlace => {
                config.download.auto_place = value
                    .parse::<AutoPlace>()
                    .map_err(|reason| self.invalid(value, reason))?
            }
            ConfigKey::LoggingDebug => config.logging.debug = self.parse_bool(value)?,
            ConfigKey::LoggingDirectory => config.logging.directory = self.parse_path(value)?,
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_number<T: FromStr>(&self, value: &str) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn parse_path(&self, value: &str) -> Result<PathBuf, ConfigError> {
        if value.is_empty() {
            return Err(self.invalid(value, "path must not be empty"));
        }
        Ok(PathBuf::from(value))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown configuration key '{}'", s))
    }
}
