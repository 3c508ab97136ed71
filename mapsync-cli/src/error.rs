//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;

use mapsync::config::ConfigError;
use mapsync::logging::LoggingError;
use mapsync::mirror::MirrorError;
use mapsync::osudb::DbError;
use mapsync::pool::PoolError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to initialise logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to create HTTP client: {0}")]
    Http(#[source] MirrorError),

    #[error("Failed to read {path}: {source}")]
    ReadIds {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid beatmap set ID '{0}'")]
    InvalidId(String),

    #[error("Nothing to download: no beatmap set IDs given")]
    NoIds,

    #[error("Failed to read beatmap database: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Failed to set signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("{failed} beatmap set(s) failed to download")]
    Incomplete { failed: usize },
}
