//! Live batch progress rendered with indicatif.
//!
//! One overall bar counts finished sets and shows throughput; each set a
//! worker owns gets its own bar following the most advanced mirror.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use mapsync::pool::PoolEvent;
use mapsync::race::{MirrorProgress, MirrorStatus};
use parking_lot::Mutex;

const OVERALL_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sets | {msg}";

const SET_TEMPLATE: &str =
    "  {prefix:>9.bold} [{bar:30.green/white}] {bytes:>10}/{total_bytes:<10} {wide_msg}";

/// Progress display for one `download` run.
pub struct BatchProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    sets: Mutex<HashMap<u32, ProgressBar>>,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A display that draws nothing, for non-interactive runs.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(style(OVERALL_TEMPLATE).progress_chars("=>-"));
        overall.enable_steady_tick(Duration::from_millis(100));
        overall.set_message("starting");

        Self {
            multi,
            overall,
            sets: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one pool event to the display.
    pub fn handle(&self, event: &PoolEvent) {
        match event {
            PoolEvent::Queued { total } => self.overall.set_length(*total as u64),
            PoolEvent::Skipped { .. } => self.overall.inc(1),
            PoolEvent::Started { set_id, attempt } => {
                let bar = self.set_bar(*set_id);
                bar.set_position(0);
                if *attempt > 1 {
                    bar.set_message(format!("attempt {}", attempt));
                } else {
                    bar.set_message("connecting");
                }
            }
            PoolEvent::Mirror { set_id, progress } => self.mirror_progress(*set_id, progress),
            PoolEvent::Retrying {
                set_id,
                delay,
                reason,
                ..
            } => {
                let bar = self.set_bar(*set_id);
                bar.set_position(0);
                bar.set_message(format!("retry in {}s: {}", delay.as_secs(), reason));
            }
            PoolEvent::Completed { set_id, .. } => {
                self.finish_set(*set_id);
                self.overall.inc(1);
            }
            PoolEvent::Failed { set_id, reason } => {
                self.finish_set(*set_id);
                self.overall.inc(1);
                let _ = self.multi.println(format!("  #{} failed: {}", set_id, reason));
            }
            PoolEvent::Throughput {
                bytes_per_second,
                total_bytes,
            } => {
                self.overall.set_message(format!(
                    "{}/s, {} total",
                    HumanBytes(*bytes_per_second as u64),
                    HumanBytes(*total_bytes)
                ));
            }
        }
    }

    /// Clears every bar.
    pub fn finish(&self) {
        for (_, bar) in self.sets.lock().drain() {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }

    /// Late events from a race's losers arrive after the set finished; those
    /// have no bar and are dropped.
    fn mirror_progress(&self, set_id: u32, progress: &MirrorProgress) {
        let Some(bar) = self.sets.lock().get(&set_id).cloned() else {
            return;
        };
        match progress.status {
            MirrorStatus::Downloading | MirrorStatus::Completed => {
                if progress.received >= bar.position() {
                    bar.set_length(progress.total);
                    bar.set_position(progress.received);
                    bar.set_message(progress.mirror.clone());
                }
            }
            MirrorStatus::RateLimited | MirrorStatus::Error | MirrorStatus::Blacklisted => {
                if bar.position() == 0 {
                    bar.set_message(format!("{} {}", progress.mirror, progress.status.label()));
                }
            }
        }
    }

    fn set_bar(&self, set_id: u32) -> ProgressBar {
        self.sets
            .lock()
            .entry(set_id)
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(0));
                bar.set_style(style(SET_TEMPLATE).progress_chars("#>-"));
                bar.set_prefix(format!("#{}", set_id));
                bar
            })
            .clone()
    }

    fn finish_set(&self, set_id: u32) {
        if let Some(bar) = self.sets.lock().remove(&set_id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}
