//! Configuration for the download pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default delay before retrying an exhausted race.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Default throughput sampling interval.
pub const DEFAULT_THROUGHPUT_INTERVAL_MS: u64 = 250;

/// How a set is retried after every mirror failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Fail on the first exhausted race.
    None,

    /// Retry up to `max_attempts` races in total, waiting `delay` between them.
    Fixed {
        /// Maximum number of races (including the first).
        max_attempts: u32,
        delay: Duration,
    },

    /// Retry until the set succeeds or the batch is cancelled.
    Unbounded { delay: Duration },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Unbounded {
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Creates a fixed retry policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Creates an unbounded retry policy.
    pub fn unbounded(delay: Duration) -> Self {
        Self::Unbounded { delay }
    }

    /// Builds a policy from a configured attempt count, where `0` means unbounded.
    pub fn from_attempts(max_attempts: u32, delay: Duration) -> Self {
        match max_attempts {
            0 => Self::Unbounded { delay },
            1 => Self::None,
            n => Self::Fixed {
                max_attempts: n,
                delay,
            },
        }
    }

    /// Delay before the next race, given the number of races already run.
    ///
    /// Returns `None` if no more attempts are allowed.
    pub fn delay_after(&self, attempts: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempts < *max_attempts).then_some(*delay),
            Self::Unbounded { delay } => Some(*delay),
        }
    }

    /// Maximum number of races, or `None` when unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            Self::None => Some(1),
            Self::Fixed { max_attempts, .. } => Some(*max_attempts),
            Self::Unbounded { .. } => None,
        }
    }
}

/// Configuration for [`DownloadPool`](super::DownloadPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Directory receiving `<set_id>.osz` files.
    pub target_dir: PathBuf,

    /// Number of concurrent workers.
    pub concurrency: usize,

    /// Retry behaviour for exhausted races.
    pub retry: RetryPolicy,

    /// How often throughput is sampled and reported.
    pub throughput_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("download"),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            throughput_interval: Duration::from_millis(DEFAULT_THROUGHPUT_INTERVAL_MS),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration writing into `target_dir`.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    /// Set the number of workers (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the throughput sampling interval.
    pub fn with_throughput_interval(mut self, interval: Duration) -> Self {
        self.throughput_interval = interval;
        self
    }

    /// Final path of a set's archive.
    pub fn archive_path(&self, set_id: u32) -> PathBuf {
        archive_path(&self.target_dir, set_id)
    }

    /// Temporary path written before the final rename.
    pub fn partial_path(&self, set_id: u32) -> PathBuf {
        self.target_dir.join(format!("{}.osz.part", set_id))
    }
}

/// `<dir>/<set_id>.osz`
pub fn archive_path(dir: &Path, set_id: u32) -> PathBuf {
    dir.join(format!("{}.osz", set_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(
            config.retry,
            RetryPolicy::Unbounded {
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(config.throughput_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_builder_pattern() {
        let config = PoolConfig::new("/tmp/songs")
            .with_concurrency(0)
            .with_retry(RetryPolicy::None)
            .with_throughput_interval(Duration::from_secs(1));

        assert_eq!(config.concurrency, 1);
        assert_eq!(config.retry, RetryPolicy::None);
        assert_eq!(config.archive_path(42), PathBuf::from("/tmp/songs/42.osz"));
        assert_eq!(config.partial_path(42), PathBuf::from("/tmp/songs/42.osz.part"));
    }

    #[test]
    fn test_fixed_policy_delays() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), None);
        assert_eq!(policy.max_attempts(), Some(3));
    }

    #[test]
    fn test_unbounded_and_none() {
        let unbounded = RetryPolicy::default();
        assert_eq!(unbounded.delay_after(1_000), Some(Duration::from_secs(5)));
        assert_eq!(unbounded.max_attempts(), None);

        assert_eq!(RetryPolicy::None.delay_after(1), None);
        assert_eq!(RetryPolicy::None.max_attempts(), Some(1));
    }

    #[test]
    fn test_from_attempts() {
        let delay = Duration::from_secs(1);
        assert_eq!(RetryPolicy::from_attempts(0, delay), RetryPolicy::unbounded(delay));
        assert_eq!(RetryPolicy::from_attempts(1, delay), RetryPolicy::None);
        assert_eq!(RetryPolicy::from_attempts(4, delay), RetryPolicy::fixed(4, delay));
    }
}
