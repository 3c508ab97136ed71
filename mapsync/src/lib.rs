//! mapsync - resilient beatmap downloads for osu!
//!
//! This library races every known beatmap mirror for each requested set,
//! drains large batches of set IDs through a retrying worker pool, and reads
//! the stable client's `osu!.db` to find out which sets are already installed.
//!
//! # Layout
//!
//! - [`mirror`]: mirror registry and the HTTP client seam
//! - [`race`]: concurrent per-set mirror races and shared mirror health
//! - [`pool`]: batch worker pool, retries, throughput and archive placement
//! - [`osudb`]: versioned `osu!.db` decoder
//! - [`install`]: game client locations
//! - [`config`]: `config.ini` settings
//! - [`logging`]: file logging setup

pub mod config;
pub mod install;
pub mod logging;
pub mod mirror;
pub mod osudb;
pub mod pool;
pub mod race;
