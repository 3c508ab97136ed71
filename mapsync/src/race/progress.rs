//! Per-mirror progress events emitted during a race.

use std::sync::Arc;

/// State of one mirror attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStatus {
    Downloading,
    RateLimited,
    Error,
    Completed,
    /// Every mirror was suspended; this one was forced.
    Blacklisted,
}

impl MirrorStatus {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            MirrorStatus::Downloading => "downloading",
            MirrorStatus::RateLimited => "rate limited",
            MirrorStatus::Error => "error",
            MirrorStatus::Completed => "completed",
            MirrorStatus::Blacklisted => "blacklisted",
        }
    }
}

/// Snapshot of one mirror attempt's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorProgress {
    pub mirror: String,
    pub received: u64,
    /// Declared size, or the average-size estimate when undeclared.
    pub total: u64,
    pub status: MirrorStatus,
    pub error: Option<String>,
}

impl MirrorProgress {
    pub(crate) fn new(mirror: &str, status: MirrorStatus, received: u64, total: u64) -> Self {
        Self {
            mirror: mirror.to_string(),
            received,
            total,
            status,
            error: None,
        }
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Fraction in `[0, 1]`; zero when the total is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.received as f64 / self.total as f64).min(1.0)
    }
}

/// Callback receiving progress events, invoked from attempt tasks.
pub type MirrorProgressCallback = Arc<dyn Fn(MirrorProgress) + Send + Sync>;

/// A callback that drops every event.
pub fn ignore_progress() -> MirrorProgressCallback {
    Arc::new(|_| {})
}
