//! Terminal output for mapsync.
//!
//! - `progress` - live multi-bar view of a running batch
//! - `summary` - end-of-run summary and mirror health table

mod progress;
mod summary;

pub use progress::BatchProgress;
pub use summary::{format_health, format_summary};
