//! Mirror racing.
//!
//! A race downloads one beatmap set from every healthy mirror concurrently
//! and keeps the first valid archive. Mirror health is shared across races
//! so misbehaving mirrors are deprioritised or suspended for all of them.

mod engine;
pub mod health;
mod progress;

pub use engine::{
    FetchedArchive, MirrorRace, RaceConfig, RaceError, AVG_ARCHIVE_BYTES_NO_VIDEO,
    AVG_ARCHIVE_BYTES_WITH_VIDEO, MIN_ARCHIVE_BYTES,
};
pub use health::{
    Clock, HealthConfig, HealthTracker, ManualClock, MirrorHealth, Selection, SystemClock,
};
pub use progress::{ignore_progress, MirrorProgress, MirrorProgressCallback, MirrorStatus};
