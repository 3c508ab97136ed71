//! End-of-run reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use console::style;
use indicatif::{HumanBytes, HumanDuration};
use mapsync::pool::DownloadSummary;
use mapsync::race::MirrorHealth;

/// Renders the batch summary.
pub fn format_summary(summary: &DownloadSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Download Summary").bold().underlined());
    let _ = writeln!(
        out,
        "  {:<12} {}",
        "Downloaded:",
        style(summary.succeeded - summary.skipped).green()
    );
    let _ = writeln!(out, "  {:<12} {}", "Present:", summary.skipped);
    let _ = writeln!(
        out,
        "  {:<12} {}",
        "Failed:",
        if summary.failed > 0 {
            style(summary.failed).red().bold()
        } else {
            style(summary.failed)
        }
    );
    if !summary.cancelled_ids.is_empty() {
        let _ = writeln!(
            out,
            "  {:<12} {}",
            "Cancelled:",
            style(summary.cancelled_ids.len()).yellow()
        );
    }
    let _ = writeln!(
        out,
        "  {:<12} {} in {} ({}/s)",
        "Transferred:",
        HumanBytes(summary.total_bytes),
        HumanDuration(summary.elapsed),
        HumanBytes(summary.average_bytes_per_second as u64)
    );

    if !summary.failed_ids.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Failed IDs:").red());
        let _ = writeln!(out, "  {}", join_ids(&summary.failed_ids));
    }
    if !summary.cancelled_ids.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Not attempted (cancelled):").yellow());
        let _ = writeln!(out, "  {}", join_ids(&summary.cancelled_ids));
    }
    out
}

/// Renders the mirror health table.
pub fn format_health(health: &BTreeMap<String, MirrorHealth>, blacklisted: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Mirror Health").bold().underlined());
    let _ = writeln!(
        out,
        "  {:<14} {:>6} {:>6} {:>8} {:>7}  status",
        "mirror", "429s", "fails", "success", "score"
    );
    for (name, record) in health {
        let status = if blacklisted.contains(name) {
            style("blacklisted").red()
        } else {
            style("ok").green()
        };
        let _ = writeln!(
            out,
            "  {:<14} {:>6} {:>6} {:>8} {:>7.2}  {}",
            name,
            record.rate_limit_count,
            record.fail_count,
            record.success_count,
            record.score(),
            status
        );
    }
    out
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_summary_lists_failed_ids() {
        console::set_colors_enabled(false);
        let summary = DownloadSummary {
            attempted: 4,
            succeeded: 2,
            skipped: 1,
            failed: 2,
            failed_ids: vec![11, 42],
            cancelled_ids: Vec::new(),
            total_bytes: 2048,
            elapsed: Duration::from_secs(2),
            average_bytes_per_second: 1024.0,
        };

        let text = format_summary(&summary);
        assert!(text.contains("Failed IDs:"));
        assert!(text.contains("11 42"));
        assert!(!text.contains("Cancelled:"));
    }

    #[test]
    fn test_health_marks_blacklisted() {
        console::set_colors_enabled(false);
        let mut health = BTreeMap::new();
        health.insert(
            "mimo".to_string(),
            MirrorHealth {
                fail_count: 3,
                ..Default::default()
            },
        );

        let text = format_health(&health, &["mimo".to_string()]);
        assert!(text.contains("mimo"));
        assert!(text.contains("blacklisted"));
    }
}
