//! Concurrent multi-mirror race for a single beatmap set.
//!
//! Every selected mirror is requested at once. The first attempt that
//! passes validation wins; every other attempt is cancelled and its partial
//! data dropped.
//!
//! # Validation
//!
//! ```text
//! status 429                       -> rate limit
//! status outside 2xx               -> failure
//! Content-Type contains html/json  -> failure
//! declared (or estimated) size < 10 KiB -> failure
//! fully read body < 10 KiB         -> failure
//! ```
//!
//! A missing `Content-Length` is replaced by the average archive size, so
//! progress stays meaningful for mirrors that stream without declaring a
//! length.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::health::HealthTracker;
use super::progress::{MirrorProgress, MirrorProgressCallback, MirrorStatus};
use crate::mirror::{AsyncHttpClient, Mirror, MirrorError, MirrorOptions, MirrorRegistry};

/// Smallest body accepted as a real archive.
pub const MIN_ARCHIVE_BYTES: u64 = 10 * 1024;

/// Average archive size with video, used when no length is declared.
pub const AVG_ARCHIVE_BYTES_WITH_VIDEO: u64 = 5_097_488_384 / 500;

/// Average archive size without video.
pub const AVG_ARCHIVE_BYTES_NO_VIDEO: u64 = 4_338_417_664 / 500;

/// Upper bound on the up-front buffer reservation.
const MAX_PREALLOC_BYTES: u64 = 64 * 1024 * 1024;

/// Errors from a full race.
#[derive(Debug, Error)]
pub enum RaceError {
    /// Every candidate failed validation or transport.
    #[error("all mirrors exhausted for set {set_id} ({} attempted)", .failures.len())]
    AllMirrorsExhausted {
        set_id: u32,
        /// Per-mirror failure, in completion order.
        failures: Vec<(String, MirrorError)>,
    },

    /// The caller cancelled the race.
    #[error("download of set {0} cancelled")]
    Cancelled(u32),
}

/// Validation thresholds and size estimates.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    pub min_archive_bytes: u64,
    pub estimate_with_video: u64,
    pub estimate_without_video: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            min_archive_bytes: MIN_ARCHIVE_BYTES,
            estimate_with_video: AVG_ARCHIVE_BYTES_WITH_VIDEO,
            estimate_without_video: AVG_ARCHIVE_BYTES_NO_VIDEO,
        }
    }
}

impl RaceConfig {
    /// Size assumed for an archive with no declared length.
    pub fn estimated_size(&self, options: &MirrorOptions) -> u64 {
        if options.include_video {
            self.estimate_with_video
        } else {
            self.estimate_without_video
        }
    }
}

/// The winning archive of a race.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub set_id: u32,
    /// Name of the mirror that served it.
    pub mirror: String,
    pub bytes: Bytes,
    /// Size the mirror declared, or the estimate it was measured against.
    pub total_bytes: u64,
}

impl FetchedArchive {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Races the mirrors of a registry against each other.
///
/// The health tracker is shared: every race for every set scores into it.
pub struct MirrorRace<C: AsyncHttpClient> {
    registry: MirrorRegistry,
    health: Arc<HealthTracker>,
    client: Arc<C>,
    config: RaceConfig,
}

impl<C: AsyncHttpClient> MirrorRace<C> {
    pub fn new(registry: MirrorRegistry, health: Arc<HealthTracker>, client: Arc<C>) -> Self {
        Self {
            registry,
            health,
            client,
            config: RaceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RaceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Mirrors to attempt, best first.
    ///
    /// When every mirror is blacklisted the forced candidate is reported
    /// with a `Blacklisted` event before it is returned.
    pub fn select_candidates(&self, on_progress: &MirrorProgressCallback) -> Vec<Arc<dyn Mirror>> {
        let selection = self.health.rank(&self.registry.names());

        if selection.forced {
            for name in &selection.candidates {
                warn!(mirror = %name, "All mirrors blacklisted, forcing soonest to recover");
                on_progress(
                    MirrorProgress::new(name, MirrorStatus::Blacklisted, 0, 0)
                        .with_error("all mirrors blacklisted"),
                );
            }
        }

        selection
            .candidates
            .iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect()
    }

    /// Downloads `set_id` from whichever mirror delivers a valid archive first.
    pub async fn fetch(
        &self,
        set_id: u32,
        options: MirrorOptions,
        on_progress: MirrorProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<FetchedArchive, RaceError> {
        if cancel.is_cancelled() {
            return Err(RaceError::Cancelled(set_id));
        }

        let candidates = self.select_candidates(&on_progress);
        debug!(
            set_id,
            mirrors = ?candidates.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "Starting race"
        );

        let race_token = cancel.child_token();
        let mut attempts = JoinSet::new();
        for mirror in candidates {
            let attempt = Attempt {
                set_id,
                url: mirror.build_url(set_id, &options),
                mirror,
                options,
                client: Arc::clone(&self.client),
                health: Arc::clone(&self.health),
                config: self.config.clone(),
                on_progress: Arc::clone(&on_progress),
                token: race_token.child_token(),
            };
            attempts.spawn(attempt.run());
        }

        let mut failures = Vec::new();
        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok(Ok(archive)) => {
                    race_token.cancel();
                    attempts.detach_all();
                    info!(
                        set_id,
                        mirror = %archive.mirror,
                        bytes = archive.len(),
                        "Race won"
                    );
                    return Ok(archive);
                }
                Ok(Err(failure)) => failures.push(failure),
                Err(e) => {
                    warn!(set_id, error = %e, "Mirror attempt task failed");
                    failures.push((
                        "<task>".to_string(),
                        MirrorError::Transport(format!("attempt task failed: {}", e)),
                    ));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(RaceError::Cancelled(set_id));
        }

        warn!(set_id, attempted = failures.len(), "All mirrors exhausted");
        Err(RaceError::AllMirrorsExhausted { set_id, failures })
    }
}

/// Bytes seen by an attempt so far.
#[derive(Debug, Default, Clone, Copy)]
struct Transfer {
    received: u64,
    total: u64,
}

/// One mirror's share of a race, owned by its own task.
struct Attempt<C: AsyncHttpClient> {
    set_id: u32,
    mirror: Arc<dyn Mirror>,
    url: String,
    options: MirrorOptions,
    client: Arc<C>,
    health: Arc<HealthTracker>,
    config: RaceConfig,
    on_progress: MirrorProgressCallback,
    token: CancellationToken,
}

impl<C: AsyncHttpClient> Attempt<C> {
    async fn run(self) -> Result<FetchedArchive, (String, MirrorError)> {
        let name = self.mirror.name().to_string();
        let mut transfer = Transfer::default();

        match self.download(&name, &mut transfer).await {
            Ok(bytes) => {
                self.health.record_success(&name);
                (self.on_progress)(MirrorProgress::new(
                    &name,
                    MirrorStatus::Completed,
                    transfer.received,
                    transfer.total,
                ));
                Ok(FetchedArchive {
                    set_id: self.set_id,
                    mirror: name,
                    bytes,
                    total_bytes: transfer.total,
                })
            }
            Err(error) => {
                self.score_failure(&name, &error, transfer);
                Err((name, error))
            }
        }
    }

    async fn download(&self, name: &str, transfer: &mut Transfer) -> Result<Bytes, MirrorError> {
        let response = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(MirrorError::Cancelled),
            response = self.client.get(&self.url) => response?,
        };

        if response.status == 429 {
            return Err(MirrorError::RateLimited);
        }
        if !(200..300).contains(&response.status) {
            return Err(MirrorError::InvalidResponse(format!(
                "status {}",
                response.status
            )));
        }
        if let Some(content_type) = response.content_type.as_deref() {
            if is_error_page(content_type) {
                return Err(MirrorError::InvalidResponse(format!(
                    "unexpected content type {}",
                    content_type
                )));
            }
        }

        transfer.total = response
            .content_length
            .unwrap_or_else(|| self.config.estimated_size(&self.options));
        if transfer.total < self.config.min_archive_bytes {
            return Err(MirrorError::InvalidResponse(format!(
                "file too small ({} bytes)",
                transfer.total
            )));
        }

        (self.on_progress)(MirrorProgress::new(
            name,
            MirrorStatus::Downloading,
            0,
            transfer.total,
        ));

        let mut buffer = BytesMut::with_capacity(transfer.total.min(MAX_PREALLOC_BYTES) as usize);
        let mut body = response.body;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(MirrorError::Cancelled),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            buffer.extend_from_slice(&chunk);
            transfer.received += chunk.len() as u64;
            (self.on_progress)(MirrorProgress::new(
                name,
                MirrorStatus::Downloading,
                transfer.received,
                transfer.total,
            ));
        }

        if transfer.received < self.config.min_archive_bytes {
            return Err(MirrorError::InvalidResponse(format!(
                "downloaded file too small ({} bytes)",
                transfer.received
            )));
        }
        if self.token.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }

        Ok(buffer.freeze())
    }

    fn score_failure(&self, name: &str, error: &MirrorError, transfer: Transfer) {
        let status = match error {
            MirrorError::Cancelled => {
                debug!(set_id = self.set_id, mirror = name, "Attempt cancelled");
                return;
            }
            MirrorError::RateLimited => {
                self.health.record_rate_limit(name);
                MirrorStatus::RateLimited
            }
            MirrorError::InvalidResponse(_) | MirrorError::Transport(_) => {
                self.health.record_failure(name);
                MirrorStatus::Error
            }
        };

        debug!(set_id = self.set_id, mirror = name, error = %error, "Attempt failed");
        (self.on_progress)(
            MirrorProgress::new(name, status, transfer.received, transfer.total)
                .with_error(error.to_string()),
        );
    }
}

fn is_error_page(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("html") || content_type.contains("json")
}
