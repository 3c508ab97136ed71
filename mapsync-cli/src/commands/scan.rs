//! Scan command - read the stable client's beatmap database.

use std::collections::BTreeSet;
use std::path::PathBuf;

use console::style;
use mapsync::osudb::{LightRecord, OsuDbReader};

use super::common::resolve_database_path;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the scan command.
pub struct ScanArgs {
    pub database: Option<PathBuf>,
    pub list: bool,
    pub ids_only: bool,
}

/// Run the scan command.
pub fn run(args: ScanArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("scan");

    let path = resolve_database_path(args.database.as_deref())?;
    let reader = OsuDbReader::open(&path)?;
    let header = reader.header().clone();

    let mut records = Vec::with_capacity((header.record_count as usize).min(1 << 16));
    for record in reader {
        records.push(record?);
    }
    let set_ids: BTreeSet<u32> = records.iter().filter_map(LightRecord::online_set_id).collect();

    if args.ids_only {
        for id in &set_ids {
            println!("{}", id);
        }
        return Ok(());
    }

    println!("{}", style(path.display()).bold());
    println!("  {:<12} {}", "Version:", header.version);
    println!("  {:<12} {}", "Player:", display_or_dash(&header.player_name));
    println!("  {:<12} {}", "Beatmaps:", records.len());
    println!("  {:<12} {}", "Sets:", set_ids.len());

    if args.list {
        println!();
        for record in &records {
            println!("{}", format_record(record));
        }
    }
    Ok(())
}

fn format_record(record: &LightRecord) -> String {
    let set = record
        .online_set_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>8} {:>9}  {} - {} [{}]",
        set,
        record.beatmap_id,
        display_or_dash(&record.artist),
        display_or_dash(&record.title),
        record.difficulty
    )
}

fn display_or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}
