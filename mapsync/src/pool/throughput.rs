//! Periodic throughput sampling.
//!
//! Workers add every received byte to a shared atomic counter; a background
//! task samples it on a fixed interval and reports the rate over the real
//! time elapsed since the previous sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::events::{PoolEvent, PoolEventCallback};

/// Shared byte counter for a batch.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Bytes per second for `delta` bytes over `elapsed`.
pub fn rate(delta: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    delta as f64 / secs
}

/// Background sampler emitting [`PoolEvent::Throughput`].
pub struct ThroughputSampler {
    handle: Option<JoinHandle<()>>,
    token: CancellationToken,
}

impl ThroughputSampler {
    /// Starts sampling `counter` every `interval`.
    pub fn start(
        counter: Arc<ByteCounter>,
        interval: Duration,
        on_event: PoolEventCallback,
    ) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut last_bytes = counter.total();
            let mut last_at = Instant::now();
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let now = Instant::now();
                let total = counter.total();
                on_event(PoolEvent::Throughput {
                    bytes_per_second: rate(total.saturating_sub(last_bytes), now - last_at),
                    total_bytes: total,
                });
                last_bytes = total;
                last_at = now;
            }
        });

        Self {
            handle: Some(handle),
            token,
        }
    }

    /// Stops the sampler and waits for it to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
    }
}

impl Drop for ThroughputSampler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
