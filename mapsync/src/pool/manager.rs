//! Batch download manager.
//!
//! # Architecture
//!
//! ```text
//! DownloadPool::run
//!         │
//!         ├── queue (de-duplicated FIFO of set IDs)
//!         │
//!         ├── worker × concurrency
//!         │       └── per set: skip if present → race → retry? → .part → rename → place
//!         │
//!         └── ThroughputSampler (bytes/sec every 250ms)
//! ```
//!
//! Each set is owned by exactly one worker from pop to terminal outcome, so
//! no two tasks ever write the same path.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::active::{ActiveDownload, ActiveDownloads, DownloadState};
use super::config::PoolConfig;
use super::error::PoolError;
use super::events::{PoolEvent, PoolEventCallback};
use super::place::ArchivePlacer;
use super::summary::{DownloadSummary, SetOutcome};
use super::throughput::{ByteCounter, ThroughputSampler};
use crate::mirror::{AsyncHttpClient, MirrorOptions};
use crate::race::{FetchedArchive, MirrorProgress, MirrorProgressCallback, MirrorRace, RaceError};

/// Downloads batches of beatmap sets across a fixed number of workers.
pub struct DownloadPool<C: AsyncHttpClient> {
    race: Arc<MirrorRace<C>>,
    config: PoolConfig,
    placer: Option<Arc<dyn ArchivePlacer>>,
    active: Arc<ActiveDownloads>,
}

impl<C: AsyncHttpClient> DownloadPool<C> {
    pub fn new(race: MirrorRace<C>, config: PoolConfig) -> Self {
        Self {
            race: Arc::new(race),
            config,
            placer: None,
            active: Arc::new(ActiveDownloads::new()),
        }
    }

    /// Applies `placer` to every newly written archive.
    pub fn with_placer(mut self, placer: Arc<dyn ArchivePlacer>) -> Self {
        self.placer = Some(placer);
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn race(&self) -> &MirrorRace<C> {
        &self.race
    }

    /// Sets currently owned by a worker.
    pub fn active(&self) -> Vec<ActiveDownload> {
        self.active.snapshot()
    }

    /// Downloads every set in `set_ids` into the target directory.
    ///
    /// Duplicate IDs are scheduled once. Resolves when every worker has
    /// exited: the queue is empty, or `shutdown` fired and in-flight sets
    /// were abandoned.
    pub async fn run(
        &self,
        set_ids: &[u32],
        options: MirrorOptions,
        on_event: PoolEventCallback,
        shutdown: CancellationToken,
    ) -> Result<DownloadSummary, PoolError> {
        let started = Instant::now();
        tokio::fs::create_dir_all(&self.config.target_dir)
            .await
            .map_err(|e| PoolError::persistence(&self.config.target_dir, e))?;

        let ids = dedup(set_ids);
        let worker_count = self.config.concurrency.max(1).min(ids.len());
        info!(
            sets = ids.len(),
            workers = worker_count,
            target = %self.config.target_dir.display(),
            "Starting batch"
        );
        on_event(PoolEvent::Queued { total: ids.len() });

        let bytes = Arc::new(ByteCounter::new());
        let sampler = ThroughputSampler::start(
            Arc::clone(&bytes),
            self.config.throughput_interval,
            Arc::clone(&on_event),
        );

        let batch = Arc::new(Batch {
            race: Arc::clone(&self.race),
            config: self.config.clone(),
            placer: self.placer.clone(),
            active: Arc::clone(&self.active),
            options,
            on_event,
            shutdown: shutdown.clone(),
            queue: Mutex::new(ids.iter().copied().collect()),
            bytes,
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let batch = Arc::clone(&batch);
            workers.spawn(async move { batch.work(worker_id).await });
        }

        let mut outcomes: HashMap<u32, SetOutcome> = HashMap::with_capacity(ids.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => outcomes.extend(done),
                Err(e) => error!(error = %e, "Download worker failed"),
            }
        }
        sampler.stop().await;

        let mut summary = DownloadSummary::new(ids.len());
        for set_id in ids {
            let outcome = outcomes.remove(&set_id).unwrap_or_else(|| {
                if shutdown.is_cancelled() {
                    SetOutcome::Cancelled
                } else {
                    SetOutcome::Failed {
                        reason: "worker stopped unexpectedly".to_string(),
                    }
                }
            });
            summary.record(set_id, &outcome);
        }
        summary.finish(started.elapsed());

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled_ids.len(),
            bytes = summary.total_bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch finished"
        );
        Ok(summary)
    }
}

/// Removes repeated IDs, keeping first occurrences in order.
fn dedup(set_ids: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(set_ids.len());
    set_ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// State shared by the workers of one `run`.
struct Batch<C: AsyncHttpClient> {
    race: Arc<MirrorRace<C>>,
    config: PoolConfig,
    placer: Option<Arc<dyn ArchivePlacer>>,
    active: Arc<ActiveDownloads>,
    options: MirrorOptions,
    on_event: PoolEventCallback,
    shutdown: CancellationToken,
    queue: Mutex<VecDeque<u32>>,
    bytes: Arc<ByteCounter>,
}

impl<C: AsyncHttpClient> Batch<C> {
    async fn work(&self, worker_id: usize) -> Vec<(u32, SetOutcome)> {
        let mut done = Vec::new();
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let next = self.queue.lock().pop_front();
            let Some(set_id) = next else {
                break;
            };

            debug!(worker_id, set_id, "Worker picked set");
            let outcome = self.download(set_id).await;
            self.active.remove(set_id);
            done.push((set_id, outcome));
        }
        debug!(worker_id, processed = done.len(), "Worker exiting");
        done
    }

    async fn download(&self, set_id: u32) -> SetOutcome {
        let path = self.config.archive_path(set_id);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(set_id, path = %path.display(), "Archive already present");
            (self.on_event)(PoolEvent::Skipped { set_id, path });
            return SetOutcome::Skipped;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.active.begin_attempt(set_id, attempt);
            (self.on_event)(PoolEvent::Started { set_id, attempt });

            let result = self
                .race
                .fetch(
                    set_id,
                    self.options,
                    self.progress_callback(set_id),
                    &self.shutdown,
                )
                .await;

            let err = match result {
                Ok(archive) => return self.finish(archive).await,
                Err(RaceError::Cancelled(_)) => return SetOutcome::Cancelled,
                Err(err) => err,
            };

            let reason = err.to_string();
            let Some(delay) = self.config.retry.delay_after(attempt) else {
                error!(set_id, attempts = attempt, reason = %reason, "Download failed");
                (self.on_event)(PoolEvent::Failed {
                    set_id,
                    reason: reason.clone(),
                });
                return SetOutcome::Failed { reason };
            };

            warn!(
                set_id,
                attempt,
                delay_secs = delay.as_secs_f64(),
                reason = %reason,
                "All mirrors failed, retrying"
            );
            self.active.set_state(set_id, DownloadState::Retrying);
            (self.on_event)(PoolEvent::Retrying {
                set_id,
                attempt,
                delay,
                reason,
            });

            tokio::select! {
                _ = self.shutdown.cancelled() => return SetOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Forwards mirror events and feeds their byte deltas to the counter.
    fn progress_callback(&self, set_id: u32) -> MirrorProgressCallback {
        let active = Arc::clone(&self.active);
        let bytes = Arc::clone(&self.bytes);
        let on_event = Arc::clone(&self.on_event);
        let seen: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());

        Arc::new(move |progress: MirrorProgress| {
            {
                let mut seen = seen.lock();
                let last = seen.entry(progress.mirror.clone()).or_insert(0);
                if progress.received > *last {
                    bytes.add(progress.received - *last);
                    *last = progress.received;
                }
            }
            active.apply(set_id, &progress);
            on_event(PoolEvent::Mirror { set_id, progress });
        })
    }

    async fn finish(&self, archive: FetchedArchive) -> SetOutcome {
        let set_id = archive.set_id;
        let path = match self.persist(set_id, &archive.bytes).await {
            Ok(path) => path,
            Err(e) => {
                error!(set_id, error = %e, "Failed to save archive");
                let reason = e.to_string();
                (self.on_event)(PoolEvent::Failed {
                    set_id,
                    reason: reason.clone(),
                });
                return SetOutcome::Failed { reason };
            }
        };

        info!(
            set_id,
            mirror = %archive.mirror,
            bytes = archive.len(),
            path = %path.display(),
            "Download complete"
        );
        (self.on_event)(PoolEvent::Completed {
            set_id,
            mirror: archive.mirror.clone(),
            bytes: archive.len(),
            path: path.clone(),
        });

        if let Some(placer) = &self.placer {
            if let Err(e) = placer.place(&path).await {
                warn!(set_id, placer = placer.name(), error = %e, "Auto place failed");
            }
        }

        let bytes = archive.len();
        SetOutcome::Downloaded {
            mirror: archive.mirror,
            bytes,
        }
    }

    /// Writes to `<id>.osz.part`, then renames to `<id>.osz`.
    async fn persist(&self, set_id: u32, bytes: &[u8]) -> Result<PathBuf, PoolError> {
        let partial = self.config.partial_path(set_id);
        let dest = self.config.archive_path(set_id);

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(PoolError::persistence(partial, e));
        }
        if let Err(e) = tokio::fs::rename(&partial, &dest).await {
            tokio::fs::remove_file(&partial).await.ok();
            return Err(PoolError::persistence(dest, e));
        }
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::{
        BoxFuture, Mirror, MirrorRegistry, ScriptedHttpClient, ScriptedResponse, UrlMirror,
        VideoFlag,
    };
    use crate::pool::{ignore_events, PlacementError, RetryPolicy};
    use crate::race::{HealthConfig, HealthTracker, ManualClock};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pool(
        client: Arc<ScriptedHttpClient>,
        target: &Path,
        retry: RetryPolicy,
    ) -> DownloadPool<ScriptedHttpClient> {
        let registry = MirrorRegistry::new(
            ["a", "b"]
                .iter()
                .map(|name| {
                    Arc::new(UrlMirror::new(
                        *name,
                        format!("http://{}.test/d", name),
                        VideoFlag::Unsupported,
                    )) as Arc<dyn Mirror>
                })
                .collect(),
        )
        .unwrap();
        let health = Arc::new(HealthTracker::new(
            HealthConfig::default(),
            Arc::new(ManualClock::new()),
        ));
        let race = MirrorRace::new(registry, health, client);
        DownloadPool::new(race, PoolConfig::new(target).with_retry(retry))
    }

    fn recorder() -> (PoolEventCallback, Arc<Mutex<Vec<PoolEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        (Arc::new(move |e| sink.lock().push(e)), events)
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        assert_eq!(dedup(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(dedup(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_downloads_batch() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("http://a.test/", ScriptedResponse::archive(20_000))
                .route("http://b.test/", ScriptedResponse::status(503)),
        );
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::None);

        let summary = pool
            .run(&[1, 2, 2, 3], MirrorOptions::default(), ignore_events(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.total_bytes, 60_000);
        for id in [1, 2, 3] {
            let path = temp.path().join(format!("{}.osz", id));
            assert_eq!(std::fs::metadata(&path).unwrap().len(), 20_000);
            assert!(!temp.path().join(format!("{}.osz.part", id)).exists());
        }
        assert!(pool.active().is_empty());
    }

    fn batch(pool: &DownloadPool<ScriptedHttpClient>) -> Batch<ScriptedHttpClient> {
        Batch {
            race: Arc::clone(&pool.race),
            config: pool.config.clone(),
            placer: pool.placer.clone(),
            active: Arc::clone(&pool.active),
            options: MirrorOptions::default(),
            on_event: ignore_events(),
            shutdown: CancellationToken::new(),
            queue: Mutex::new(VecDeque::new()),
            bytes: Arc::new(ByteCounter::new()),
        }
    }

    #[tokio::test]
    async fn test_download_outcome_names_winner_and_size() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("http://a.test/", ScriptedResponse::status(503))
                .route("http://b.test/", ScriptedResponse::archive(25_000)),
        );
        let pool = pool(client, temp.path(), RetryPolicy::None);

        let outcome = batch(&pool).download(42).await;

        assert_eq!(
            outcome,
            SetOutcome::Downloaded {
                mirror: "b".to_string(),
                bytes: 25_000,
            }
        );
        assert_eq!(
            std::fs::metadata(temp.path().join("42.osz")).unwrap().len(),
            25_000
        );
    }

    #[tokio::test]
    async fn test_existing_archive_is_skipped_without_requests() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("12345.osz"), b"already here").unwrap();
        let client = Arc::new(ScriptedHttpClient::new());
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::None);
        let (on_event, events) = recorder();

        let summary = pool
            .run(&[12345], MirrorOptions::default(), on_event, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_bytes, 0);
        assert!(client.requests().is_empty());
        assert!(events
            .lock()
            .iter()
            .any(|e| matches!(e, PoolEvent::Skipped { set_id: 12345, .. })));
    }

    #[tokio::test]
    async fn test_exhausted_without_retry_fails() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("http://a.test/", ScriptedResponse::status(429))
                .route("http://b.test/", ScriptedResponse::html(2_000)),
        );
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::None);

        let summary = pool
            .run(&[7], MirrorOptions::default(), ignore_events(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_ids, vec![7]);
        assert_eq!(client.requests().len(), 2);
        assert!(!temp.path().join("7.osz").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_delay() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new()
                .route("http://a.test/", ScriptedResponse::status(429))
                .route("http://b.test/", ScriptedResponse::html(2_000)),
        );
        let pool = pool(
            Arc::clone(&client),
            temp.path(),
            RetryPolicy::unbounded(Duration::from_secs(5)),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let scripted = Arc::clone(&client);
        let on_event: PoolEventCallback = Arc::new(move |event| {
            if let PoolEvent::Retrying { .. } = &event {
                scripted.set_route("http://a.test/", ScriptedResponse::archive(20_000));
            }
            sink.lock().push(event);
        });

        let started = Instant::now();
        let summary = pool
            .run(&[1], MirrorOptions::default(), on_event, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(started.elapsed() >= Duration::from_secs(5));

        let events = events.lock();
        let retry = events
            .iter()
            .find_map(|e| match e {
                PoolEvent::Retrying { attempt, delay, .. } => Some((*attempt, *delay)),
                _ => None,
            })
            .unwrap();
        assert_eq!(retry, (1, Duration::from_secs(5)));
        assert!(events
            .iter()
            .any(|e| matches!(e, PoolEvent::Started { set_id: 1, attempt: 2 })));
        assert!(temp.path().join("1.osz").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_retry_wait_cancels() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedHttpClient::new());
        let pool = pool(
            Arc::clone(&client),
            temp.path(),
            RetryPolicy::unbounded(Duration::from_secs(60)),
        );
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        let on_event: PoolEventCallback = Arc::new(move |event| {
            if let PoolEvent::Retrying { .. } = event {
                trigger.cancel();
            }
        });

        let summary = pool
            .run(&[1, 2], MirrorOptions::default(), on_event, shutdown)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.cancelled_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_requests() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(ScriptedHttpClient::new());
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = pool
            .run(&[1, 2, 3], MirrorOptions::default(), ignore_events(), shutdown)
            .await
            .unwrap();

        assert_eq!(summary.cancelled_ids, vec![1, 2, 3]);
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_is_not_retried() {
        let temp = TempDir::new().unwrap();
        // a directory where the partial file should go makes the write fail
        std::fs::create_dir(temp.path().join("5.osz.part")).unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new().route("http://a.test/", ScriptedResponse::archive(20_000)),
        );
        let pool = pool(
            Arc::clone(&client),
            temp.path(),
            RetryPolicy::unbounded(Duration::from_secs(1)),
        );

        let summary = pool
            .run(&[5], MirrorOptions::default(), ignore_events(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.failed_ids, vec![5]);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_unusable_target_dir_aborts_run() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();
        let pool = pool(Arc::new(ScriptedHttpClient::new()), &file, RetryPolicy::None);

        let err = pool
            .run(&[1], MirrorOptions::default(), ignore_events(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Persistence { .. }));
    }

    struct RecordingPlacer {
        placed: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    impl ArchivePlacer for RecordingPlacer {
        fn name(&self) -> &str {
            "recording"
        }

        fn place<'a>(&'a self, archive: &'a Path) -> BoxFuture<'a, Result<(), PlacementError>> {
            Box::pin(async move {
                self.placed.lock().push(archive.to_path_buf());
                if self.fail {
                    Err(PlacementError::ExecutableNotFound(PathBuf::from("osu!")))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_placer_runs_and_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new().route("http://a.test/", ScriptedResponse::archive(20_000)),
        );
        let placer = Arc::new(RecordingPlacer {
            placed: Mutex::new(Vec::new()),
            fail: true,
        });
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::None)
            .with_placer(placer.clone());

        let summary = pool
            .run(&[9], MirrorOptions::default(), ignore_events(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(*placer.placed.lock(), vec![temp.path().join("9.osz")]);
    }

    #[tokio::test]
    async fn test_mirror_events_are_forwarded() {
        let temp = TempDir::new().unwrap();
        let client = Arc::new(
            ScriptedHttpClient::new().route("http://a.test/", ScriptedResponse::archive(20_000)),
        );
        let pool = pool(Arc::clone(&client), temp.path(), RetryPolicy::None);
        let (on_event, events) = recorder();

        pool.run(&[4], MirrorOptions::default(), on_event, CancellationToken::new())
            .await
            .unwrap();

        let events = events.lock();
        assert!(matches!(events[0], PoolEvent::Queued { total: 1 }));
        assert!(events.iter().any(|e| matches!(
            e,
            PoolEvent::Mirror { set_id: 4, progress } if progress.mirror == "a"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, PoolEvent::Completed { set_id: 4, bytes: 20_000, .. })));
    }
}
