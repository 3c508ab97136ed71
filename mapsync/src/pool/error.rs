//! Error types for the download pool.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a set (or the whole batch) in the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Writing or renaming a file in the target directory failed.
    #[error("failed to write {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The batch was cancelled before the set finished.
    #[error("download of set {0} cancelled")]
    Cancelled(u32),
}

impl PoolError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
