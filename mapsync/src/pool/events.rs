//! Events emitted while a batch runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::race::MirrorProgress;

/// Progress notification from a [`DownloadPool`](super::DownloadPool) run.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    /// The batch was accepted; `total` is the de-duplicated set count.
    Queued { total: usize },

    /// The archive already exists; nothing was downloaded.
    Skipped { set_id: u32, path: PathBuf },

    /// A race is starting for the set.
    Started { set_id: u32, attempt: u32 },

    /// A mirror reported progress within the current race.
    Mirror {
        set_id: u32,
        progress: MirrorProgress,
    },

    /// Every mirror failed; the set will be raced again after `delay`.
    Retrying {
        set_id: u32,
        attempt: u32,
        delay: Duration,
        reason: String,
    },

    /// The archive was written to `path`.
    Completed {
        set_id: u32,
        mirror: String,
        bytes: u64,
        path: PathBuf,
    },

    /// The set reached a terminal failure.
    Failed { set_id: u32, reason: String },

    /// Periodic network throughput sample.
    Throughput {
        bytes_per_second: f64,
        total_bytes: u64,
    },
}

impl PoolEvent {
    /// The set this event concerns, if any.
    pub fn set_id(&self) -> Option<u32> {
        match self {
            PoolEvent::Skipped { set_id, .. }
            | PoolEvent::Started { set_id, .. }
            | PoolEvent::Mirror { set_id, .. }
            | PoolEvent::Retrying { set_id, .. }
            | PoolEvent::Completed { set_id, .. }
            | PoolEvent::Failed { set_id, .. } => Some(*set_id),
            PoolEvent::Queued { .. } | PoolEvent::Throughput { .. } => None,
        }
    }
}

/// Callback receiving pool events, invoked from worker tasks.
pub type PoolEventCallback = Arc<dyn Fn(PoolEvent) + Send + Sync>;

/// A callback that drops every event.
pub fn ignore_events() -> PoolEventCallback {
    Arc::new(|_| {})
}
