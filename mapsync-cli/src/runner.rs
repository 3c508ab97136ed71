//! Shared command setup: configuration, logging and the async runtime.

use std::future::Future;

use mapsync::config::{config_file_path, ConfigFile};
use mapsync::logging::{init_logging, WorkerGuard, LOG_FILE_NAME};

use crate::error::CliError;

/// Loaded configuration plus the logging guard for one CLI invocation.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: WorkerGuard,
}

impl CliRunner {
    /// Loads `config.ini` and starts file logging.
    pub fn new() -> Result<Self, CliError> {
        Self::with_debug(false)
    }

    /// Like [`new`](Self::new), forcing debug logging when `debug` is set.
    pub fn with_debug(debug: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let guard = init_logging(&config.logging.directory, debug || config.logging.debug)?;
        Ok(Self {
            config,
            _log_guard: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Records which command started and where its settings came from.
    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            command,
            config = %config_file_path().display(),
            log = %self.config.logging.directory.join(LOG_FILE_NAME).display(),
            "mapsync starting"
        );
    }

    /// Runs `future` to completion on a fresh multi-threaded runtime.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, CliError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;
        Ok(runtime.block_on(future))
    }
}
