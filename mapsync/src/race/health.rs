//! Per-mirror health tracking.
//!
//! Every mirror accumulates penalty counters as it rate-limits or fails, and
//! is suspended from selection for a time-boxed window once a counter crosses
//! its threshold. Successes decay the penalties again.
//!
//! # Rules
//!
//! ```text
//! 429            rate_limit_count += 1; at >= 2: blacklist min(120s, 20s * count)
//! other failure  fail_count += 1;       at >= 3: blacklist 30s
//! success        success_count += 1; both penalties -= 1 (floor 0);
//!                every 2nd success while blacklisted lifts the blacklist
//! ```
//!
//! The blacklist expires lazily: the first check at or after
//! `blacklist_until` clears it.
//!
//! # Thread Safety
//!
//! Records are shared across concurrent races for different sets, so all
//! mutation goes through a single `Mutex`. The clock is injected to keep the
//! time-boxed rules testable.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Thresholds and windows for the blacklist rules.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Rate limits before the mirror is blacklisted (default: 2).
    pub rate_limit_threshold: u32,
    /// Blacklist length per accumulated rate limit (default: 20s).
    pub rate_limit_step: Duration,
    /// Upper bound on a rate-limit blacklist (default: 120s).
    pub rate_limit_cap: Duration,
    /// Failures before the mirror is blacklisted (default: 3).
    pub failure_threshold: u32,
    /// Blacklist length after repeated failures (default: 30s).
    pub failure_blacklist: Duration,
    /// A blacklisted mirror is pardoned on every Nth success (default: 2).
    pub pardon_every: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            rate_limit_threshold: 2,
            rate_limit_step: Duration::from_secs(20),
            rate_limit_cap: Duration::from_secs(120),
            failure_threshold: 3,
            failure_blacklist: Duration::from_secs(30),
            pardon_every: 2,
        }
    }
}

/// Health record for a single mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorHealth {
    pub rate_limit_count: u32,
    pub fail_count: u32,
    pub success_count: u32,
    pub blacklist_until: Option<Instant>,
}

impl MirrorHealth {
    /// Selection score; lower is better.
    pub fn score(&self) -> f64 {
        2.0 * self.rate_limit_count as f64 + self.fail_count as f64
            - 0.25 * self.success_count as f64
    }
}

/// Outcome of ranking a set of mirrors for one race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Mirror names in attempt priority order.
    pub candidates: Vec<String>,
    /// Set when every mirror was blacklisted and one was forced.
    pub forced: bool,
}

/// Tracks mirror health across every race in the process.
pub struct HealthTracker {
    config: HealthConfig,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, MirrorHealth>>,
}

impl std::fmt::Debug for HealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("config", &self.config)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthConfig::default(), Arc::new(SystemClock))
    }
}

impl HealthTracker {
    /// Creates a tracker with the given rules and clock.
    pub fn new(config: HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Whether the mirror is currently suspended.
    ///
    /// An expired blacklist is cleared as a side effect.
    pub fn is_blacklisted(&self, name: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.records.lock();
        match records.get_mut(name) {
            Some(record) => Self::check_blacklist(record, now),
            None => false,
        }
    }

    /// Ranks `names` (given in registry order) for a race.
    ///
    /// Non-blacklisted mirrors are sorted by ascending score, ties keeping
    /// registry order. When every mirror is blacklisted, the one whose
    /// blacklist expires soonest is returned alone with `forced` set.
    pub fn rank<S: AsRef<str>>(&self, names: &[S]) -> Selection {
        let now = self.clock.now();
        let mut records = self.records.lock();

        let mut available: Vec<(&str, f64)> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let record = records.entry(name.to_string()).or_default();
            if !Self::check_blacklist(record, now) {
                available.push((name, record.score()));
            }
        }

        if available.is_empty() {
            let forced = names
                .iter()
                .map(AsRef::as_ref)
                .min_by_key(|name| records.get(*name).and_then(|r| r.blacklist_until));
            return Selection {
                candidates: forced.map(str::to_string).into_iter().collect(),
                forced: true,
            };
        }

        available.sort_by(|a, b| a.1.total_cmp(&b.1));
        Selection {
            candidates: available.into_iter().map(|(n, _)| n.to_string()).collect(),
            forced: false,
        }
    }

    /// Records an HTTP 429.
    ///
    /// Returns the blacklist window applied, if any.
    pub fn record_rate_limit(&self, name: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let record = records.entry(name.to_string()).or_default();
        record.rate_limit_count += 1;

        if record.rate_limit_count < self.config.rate_limit_threshold {
            return None;
        }

        let window = self
            .config
            .rate_limit_step
            .saturating_mul(record.rate_limit_count)
            .min(self.config.rate_limit_cap);
        record.blacklist_until = Some(now + window);
        tracing::info!(
            mirror = name,
            rate_limits = record.rate_limit_count,
            blacklist_secs = window.as_secs(),
            "Mirror blacklisted after repeated rate limits"
        );
        Some(window)
    }

    /// Records a failure other than a rate limit.
    ///
    /// Returns the blacklist window applied, if any.
    pub fn record_failure(&self, name: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut records = self.records.lock();
        let record = records.entry(name.to_string()).or_default();
        record.fail_count += 1;

        if record.fail_count < self.config.failure_threshold {
            return None;
        }

        let window = self.config.failure_blacklist;
        record.blacklist_until = Some(now + window);
        tracing::info!(
            mirror = name,
            failures = record.fail_count,
            blacklist_secs = window.as_secs(),
            "Mirror blacklisted after repeated failures"
        );
        Some(window)
    }

    /// Records a validated download.
    ///
    /// Returns `true` when the success pardoned an active blacklist.
    pub fn record_success(&self, name: &str) -> bool {
        let mut records = self.records.lock();
        let record = records.entry(name.to_string()).or_default();
        record.success_count += 1;
        record.rate_limit_count = record.rate_limit_count.saturating_sub(1);
        record.fail_count = record.fail_count.saturating_sub(1);

        let pardon_every = self.config.pardon_every.max(1);
        if record.blacklist_until.is_some() && record.success_count % pardon_every == 0 {
            record.blacklist_until = None;
            tracing::info!(mirror = name, "Mirror pardoned after successful downloads");
            return true;
        }
        false
    }

    /// Copy of a single record (default if never referenced).
    pub fn get(&self, name: &str) -> MirrorHealth {
        self.records.lock().get(name).cloned().unwrap_or_default()
    }

    /// Score of a single mirror.
    pub fn score(&self, name: &str) -> f64 {
        self.get(name).score()
    }

    /// Copy of every record, keyed by mirror name.
    pub fn snapshot(&self) -> BTreeMap<String, MirrorHealth> {
        self.records
            .lock()
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    fn check_blacklist(record: &mut MirrorHealth, now: Instant) -> bool {
        match record.blacklist_until {
            Some(until) if now >= until => {
                record.blacklist_until = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}
