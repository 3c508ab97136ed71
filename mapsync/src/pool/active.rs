//! In-flight download table.

use dashmap::DashMap;

use crate::race::{MirrorProgress, MirrorStatus};

/// Phase of an in-flight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Downloading,
    /// Waiting out the retry delay.
    Retrying,
    /// The leading mirror answered 429.
    RateLimited,
}

/// One set currently owned by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDownload {
    pub set_id: u32,
    /// Mirror with the most progress so far in the current race.
    pub mirror: Option<String>,
    pub received_bytes: u64,
    pub total_bytes: u64,
    pub state: DownloadState,
    /// Race number, starting at 1.
    pub attempt: u32,
}

impl ActiveDownload {
    fn new(set_id: u32) -> Self {
        Self {
            set_id,
            mirror: None,
            received_bytes: 0,
            total_bytes: 0,
            state: DownloadState::Downloading,
            attempt: 0,
        }
    }
}

/// Concurrent map of in-flight sets, keyed by set ID.
///
/// Workers own disjoint sets, so entries are only ever written by one task;
/// the map exists so observers can snapshot every entry without blocking.
#[derive(Debug, Default)]
pub struct ActiveDownloads {
    entries: DashMap<u32, ActiveDownload>,
}

impl ActiveDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_attempt(&self, set_id: u32, attempt: u32) {
        let mut entry = self
            .entries
            .entry(set_id)
            .or_insert_with(|| ActiveDownload::new(set_id));
        entry.attempt = attempt;
        entry.state = DownloadState::Downloading;
        entry.mirror = None;
        entry.received_bytes = 0;
        entry.total_bytes = 0;
    }

    pub(crate) fn set_state(&self, set_id: u32, state: DownloadState) {
        if let Some(mut entry) = self.entries.get_mut(&set_id) {
            entry.state = state;
        }
    }

    /// Folds a mirror event into the entry.
    ///
    /// Byte counts follow whichever mirror is furthest ahead.
    pub(crate) fn apply(&self, set_id: u32, progress: &MirrorProgress) {
        let Some(mut entry) = self.entries.get_mut(&set_id) else {
            return;
        };

        match progress.status {
            MirrorStatus::Downloading | MirrorStatus::Completed => {
                let leading = entry.mirror.as_deref() == Some(progress.mirror.as_str())
                    || progress.received >= entry.received_bytes;
                if leading {
                    entry.mirror = Some(progress.mirror.clone());
                    entry.received_bytes = progress.received;
                    entry.total_bytes = progress.total;
                    entry.state = DownloadState::Downloading;
                }
            }
            MirrorStatus::RateLimited if entry.received_bytes == 0 => {
                entry.state = DownloadState::RateLimited;
            }
            _ => {}
        }
    }

    pub(crate) fn remove(&self, set_id: u32) {
        self.entries.remove(&set_id);
    }

    /// Copy of one entry.
    pub fn get(&self, set_id: u32) -> Option<ActiveDownload> {
        self.entries.get(&set_id).map(|e| e.clone())
    }

    /// Copy of every entry, ordered by set ID.
    pub fn snapshot(&self) -> Vec<ActiveDownload> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|d| d.set_id);
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(mirror: &str, status: MirrorStatus, received: u64) -> MirrorProgress {
        MirrorProgress {
            mirror: mirror.to_string(),
            received,
            total: 1_000,
            status,
            error: None,
        }
    }

    #[test]
    fn test_follows_leading_mirror() {
        let active = ActiveDownloads::new();
        active.begin_attempt(1, 1);

        active.apply(1, &progress("a", MirrorStatus::Downloading, 300));
        active.apply(1, &progress("b", MirrorStatus::Downloading, 100));
        let entry = active.get(1).unwrap();
        assert_eq!(entry.mirror.as_deref(), Some("a"));
        assert_eq!(entry.received_bytes, 300);

        active.apply(1, &progress("b", MirrorStatus::Downloading, 400));
        assert_eq!(active.get(1).unwrap().mirror.as_deref(), Some("b"));
    }

    #[test]
    fn test_rate_limit_before_any_bytes() {
        let active = ActiveDownloads::new();
        active.begin_attempt(1, 1);

        active.apply(1, &progress("a", MirrorStatus::RateLimited, 0));
        assert_eq!(active.get(1).unwrap().state, DownloadState::RateLimited);

        active.apply(1, &progress("b", MirrorStatus::Downloading, 10));
        assert_eq!(active.get(1).unwrap().state, DownloadState::Downloading);
    }

    #[test]
    fn test_new_attempt_resets_progress() {
        let active = ActiveDownloads::new();
        active.begin_attempt(1, 1);
        active.apply(1, &progress("a", MirrorStatus::Downloading, 500));
        active.set_state(1, DownloadState::Retrying);

        active.begin_attempt(1, 2);
        let entry = active.get(1).unwrap();
        assert_eq!(entry.attempt, 2);
        assert_eq!(entry.received_bytes, 0);
        assert_eq!(entry.state, DownloadState::Downloading);
    }

    #[test]
    fn test_snapshot_sorted_and_remove() {
        let active = ActiveDownloads::new();
        active.begin_attempt(9, 1);
        active.begin_attempt(3, 1);

        let ids: Vec<_> = active.snapshot().iter().map(|d| d.set_id).collect();
        assert_eq!(ids, vec![3, 9]);

        active.remove(3);
        assert_eq!(active.len(), 1);
        assert!(active.get(3).is_none());
    }

    #[test]
    fn test_events_for_unknown_set_are_ignored() {
        let active = ActiveDownloads::new();
        active.apply(5, &progress("a", MirrorStatus::Downloading, 10));
        assert!(active.is_empty());
    }
}
