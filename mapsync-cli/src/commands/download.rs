//! Download command - race every mirror for a batch of beatmap sets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::HumanBytes;
use mapsync::mirror::{MirrorOptions, MirrorRegistry, ReqwestClient};
use mapsync::osudb::{owned_set_ids, OsuDbReader};
use mapsync::pool::{estimate_total_bytes, DownloadPool, PoolEventCallback, RetryPolicy};
use mapsync::race::{HealthTracker, MirrorRace};
use tokio_util::sync::CancellationToken;

use super::common::{
    collect_ids, locate_install, resolve_auto_place, resolve_database_path, ClientArg,
};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::ui::{format_health, format_summary, BatchProgress};

/// Arguments for the download command.
pub struct DownloadArgs {
    pub ids: Vec<u32>,
    pub ids_file: Option<PathBuf>,
    pub video: bool,
    pub concurrency: Option<usize>,
    pub target: Option<PathBuf>,
    /// `Some(None)` uses the stable install's database.
    pub skip_owned: Option<Option<PathBuf>>,
    pub auto_place: Option<ClientArg>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<u64>,
    pub show_health: bool,
    pub no_progress: bool,
    pub debug: bool,
}

/// Run the download command.
pub fn run(args: DownloadArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("download");
    let config = runner.config();

    let mut ids = collect_ids(&args.ids, args.ids_file.as_deref())?;
    if ids.is_empty() {
        return Err(CliError::NoIds);
    }
    if let Some(db) = &args.skip_owned {
        ids = skip_owned(ids, db.as_deref())?;
        if ids.is_empty() {
            println!("Every requested set is already installed.");
            return Ok(());
        }
    }

    // CLI takes precedence, then config
    let include_video = args.video || config.download.include_video;
    let options = if include_video {
        MirrorOptions::with_video()
    } else {
        MirrorOptions::without_video()
    };

    let mut pool_config = config.pool_config();
    if let Some(target) = args.target {
        pool_config.target_dir = target;
    }
    if let Some(concurrency) = args.concurrency {
        pool_config = pool_config.with_concurrency(concurrency.max(1));
    }
    if args.max_attempts.is_some() || args.retry_delay.is_some() {
        let attempts = args.max_attempts.unwrap_or(config.download.max_attempts);
        let delay = args.retry_delay.unwrap_or(config.download.retry_delay_secs);
        pool_config =
            pool_config.with_retry(RetryPolicy::from_attempts(attempts, Duration::from_secs(delay)));
    }

    let client = ReqwestClient::new().map_err(CliError::Http)?;
    let race = MirrorRace::new(
        MirrorRegistry::builtin(),
        Arc::new(HealthTracker::default()),
        Arc::new(client),
    );
    let mut pool = DownloadPool::new(race, pool_config);
    if let Some(client) = resolve_auto_place(args.auto_place, config) {
        let install = locate_install(client)?;
        println!("Auto-placing archives into {} ({})", client, install.root().display());
        pool = pool.with_placer(install.placer());
    }

    println!(
        "Downloading {} set(s) into {} (about {})",
        ids.len(),
        pool.config().target_dir.display(),
        HumanBytes(estimate_total_bytes(ids.len(), include_video))
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    ctrlc::set_handler(move || {
        if !trigger.is_cancelled() {
            eprintln!();
            eprintln!("Received shutdown signal, cancelling downloads...");
            trigger.cancel();
        }
    })?;

    let progress = Arc::new(if args.no_progress {
        BatchProgress::hidden()
    } else {
        BatchProgress::new()
    });
    let sink = Arc::clone(&progress);
    let on_event: PoolEventCallback = Arc::new(move |event| sink.handle(&event));

    let summary = runner.block_on(pool.run(&ids, options, on_event, shutdown.clone()))??;
    progress.finish();

    print!("{}", format_summary(&summary));
    if args.show_health {
        let health = pool.race().health();
        let names = pool.race().registry().names();
        let records: BTreeMap<_, _> = names
            .iter()
            .map(|name| (name.clone(), health.get(name)))
            .collect();
        let blacklisted: Vec<String> = names
            .into_iter()
            .filter(|name| health.is_blacklisted(name))
            .collect();
        print!("{}", format_health(&records, &blacklisted));
    }

    if shutdown.is_cancelled() {
        println!();
        println!("Interrupted; re-run the same command to resume.");
    }
    if summary.failed > 0 {
        return Err(CliError::Incomplete {
            failed: summary.failed,
        });
    }
    Ok(())
}

/// Drops IDs already present in the beatmap database.
fn skip_owned(ids: Vec<u32>, db: Option<&Path>) -> Result<Vec<u32>, CliError> {
    let path = resolve_database_path(db)?;
    let reader = OsuDbReader::open(&path)?;
    let owned = owned_set_ids(reader)?;

    let requested = ids.len();
    let remaining: Vec<u32> = ids.into_iter().filter(|id| !owned.contains(id)).collect();
    tracing::info!(
        database = %path.display(),
        owned = owned.len(),
        skipped = requested - remaining.len(),
        "Filtered installed sets"
    );
    println!(
        "Skipping {} set(s) already in {}",
        requested - remaining.len(),
        path.display()
    );
    Ok(remaining)
}
