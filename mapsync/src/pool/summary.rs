//! Batch outcome reporting.

use std::time::Duration;

use crate::race::{AVG_ARCHIVE_BYTES_NO_VIDEO, AVG_ARCHIVE_BYTES_WITH_VIDEO};

/// Terminal outcome of one set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    Downloaded { mirror: String, bytes: u64 },
    /// The archive already existed.
    Skipped,
    Failed { reason: String },
    Cancelled,
}

impl SetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SetOutcome::Downloaded { .. } | SetOutcome::Skipped)
    }
}

/// Totals for a finished (or cancelled) batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadSummary {
    /// Distinct sets in the batch.
    pub attempted: usize,
    /// Downloaded or already present.
    pub succeeded: usize,
    /// Of `succeeded`, how many already existed.
    pub skipped: usize,
    pub failed: usize,
    /// Failed set IDs, in input order.
    pub failed_ids: Vec<u32>,
    /// Sets that never reached a terminal outcome, in input order.
    pub cancelled_ids: Vec<u32>,
    /// Bytes written to disk.
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub average_bytes_per_second: f64,
}

impl DownloadSummary {
    pub(crate) fn new(attempted: usize) -> Self {
        Self {
            attempted,
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, set_id: u32, outcome: &SetOutcome) {
        match outcome {
            SetOutcome::Downloaded { bytes, .. } => {
                self.succeeded += 1;
                self.total_bytes += bytes;
            }
            SetOutcome::Skipped => {
                self.succeeded += 1;
                self.skipped += 1;
            }
            SetOutcome::Failed { .. } => {
                self.failed += 1;
                self.failed_ids.push(set_id);
            }
            SetOutcome::Cancelled => self.cancelled_ids.push(set_id),
        }
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        let secs = elapsed.as_secs_f64();
        self.average_bytes_per_second = if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        };
    }

    /// Whether every set succeeded.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.attempted
    }
}

/// Expected download size of `count` sets, from average archive sizes.
pub fn estimate_total_bytes(count: usize, include_video: bool) -> u64 {
    let average = if include_video {
        AVG_ARCHIVE_BYTES_WITH_VIDEO
    } else {
        AVG_ARCHIVE_BYTES_NO_VIDEO
    };
    average.saturating_mul(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut summary = DownloadSummary::new(4);
        summary.record(
            1,
            &SetOutcome::Downloaded {
                mirror: "a".to_string(),
                bytes: 1_000,
            },
        );
        summary.record(2, &SetOutcome::Skipped);
        summary.record(
            3,
            &SetOutcome::Failed {
                reason: "x".to_string(),
            },
        );
        summary.record(4, &SetOutcome::Cancelled);
        summary.finish(Duration::from_secs(2));

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed_ids, vec![3]);
        assert_eq!(summary.cancelled_ids, vec![4]);
        assert_eq!(summary.total_bytes, 1_000);
        assert_eq!(summary.average_bytes_per_second, 500.0);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_zero_elapsed_has_zero_rate() {
        let mut summary = DownloadSummary::new(0);
        summary.finish(Duration::ZERO);
        assert_eq!(summary.average_bytes_per_second, 0.0);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_estimate_total_bytes() {
        assert_eq!(estimate_total_bytes(500, true), 5_097_488_000);
        assert_eq!(estimate_total_bytes(0, false), 0);
        assert_eq!(estimate_total_bytes(2, false), 2 * AVG_ARCHIVE_BYTES_NO_VIDEO);
    }
}
