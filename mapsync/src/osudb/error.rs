//! Error types for the database decoder.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from decoding an `osu!.db` file.
#[derive(Debug, Error)]
pub enum DbError {
    /// The byte stream does not follow the expected layout.
    #[error("malformed database at offset {offset}: {reason}")]
    MalformedStream { offset: usize, reason: String },

    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DbError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedStream {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset of a stream error.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::MalformedStream { offset, .. } => Some(*offset),
            Self::Io { .. } => None,
        }
    }
}
