//! Worker pool for batch downloads.
//!
//! This module drains a queue of beatmap set IDs across a fixed number of
//! workers, including:
//! - Retry of exhausted races (`config::RetryPolicy`)
//! - In-flight download tracking (`active`)
//! - Throughput sampling (`throughput`)
//! - Optional hand-off of finished archives to the game (`place`)

mod active;
mod config;
mod error;
mod events;
mod manager;
mod place;
mod summary;
mod throughput;

pub use active::{ActiveDownload, ActiveDownloads, DownloadState};
pub use config::{
    archive_path, PoolConfig, RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_RETRY_DELAY_SECS,
    DEFAULT_THROUGHPUT_INTERVAL_MS,
};
pub use error::PoolError;
pub use events::{ignore_events, PoolEvent, PoolEventCallback};
pub use manager::DownloadPool;
pub use place::{is_cross_device, ArchivePlacer, MoveToDirectory, OpenWithApplication, PlacementError};
pub use summary::{estimate_total_bytes, DownloadSummary, SetOutcome};
pub use throughput::{rate, ByteCounter, ThroughputSampler};
