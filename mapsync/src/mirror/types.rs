//! Core mirror types

use thiserror::Error;

/// Options that change which archive variant a mirror serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Request the large variant that bundles the background video.
    pub include_video: bool,
}

impl MirrorOptions {
    /// Options requesting the archive with its video.
    pub fn with_video() -> Self {
        Self {
            include_video: true,
        }
    }

    /// Options requesting the archive without its video.
    pub fn without_video() -> Self {
        Self {
            include_video: false,
        }
    }
}

/// Errors produced by a single mirror attempt.
///
/// These never escape a race: the race engine scores them against the
/// mirror's health record and reports them through progress events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MirrorError {
    /// The mirror answered HTTP 429.
    #[error("rate limited")]
    RateLimited,

    /// Bad status, content type, or size.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection or body read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The attempt was abandoned because another mirror won or the caller gave up.
    #[error("cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Whether this error counts against the mirror's health.
    pub fn is_scored(&self) -> bool {
        !matches!(self, MirrorError::Cancelled)
    }
}

/// A download source able to serve beatmap set archives.
///
/// Implementations must be pure: the same `(set_id, options)` always
/// produces the same URL.
pub trait Mirror: Send + Sync {
    /// Unique mirror name, used as the health-tracking key.
    fn name(&self) -> &str;

    /// Builds the download URL for a set.
    fn build_url(&self, set_id: u32, options: &MirrorOptions) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_exclude_video() {
        assert!(!MirrorOptions::default().include_video);
        assert!(MirrorOptions::with_video().include_video);
        assert_eq!(MirrorOptions::without_video(), MirrorOptions::default());
    }

    #[test]
    fn test_cancelled_is_not_scored() {
        assert!(!MirrorError::Cancelled.is_scored());
        assert!(MirrorError::RateLimited.is_scored());
        assert!(MirrorError::Transport("reset".to_string()).is_scored());
    }

    #[test]
    fn test_error_display() {
        let err = MirrorError::InvalidResponse("status 503".to_string());
        assert_eq!(err.to_string(), "invalid response: status 503");
    }
}
