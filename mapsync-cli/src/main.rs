//! mapsync CLI - Command-line interface
//!
//! Thin surface over the mapsync library: batch downloads, database scans
//! and `config.ini` management.

mod commands;
mod error;
mod runner;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::ClientArg;
use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::scan::ScanArgs;

/// Resilient multi-mirror beatmap downloader for osu!
#[derive(Parser)]
#[command(name = "mapsync")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Download two sets without video
    mapsync download 1 2

    # Download a list, skipping sets already in the stable install
    mapsync download --ids-file sets.txt --skip-owned

    # Hand finished archives to lazer
    mapsync download --ids-file sets.txt --auto-place lazer
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download beatmap sets by ID, racing every mirror
    Download {
        /// Beatmap set IDs
        ids: Vec<u32>,

        /// File of set IDs (whitespace or comma separated, # comments)
        #[arg(long, value_name = "FILE")]
        ids_file: Option<PathBuf>,

        /// Download archives including the background video
        #[arg(long)]
        video: bool,

        /// Number of sets downloaded at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Directory receiving <id>.osz files
        #[arg(short, long, value_name = "DIR")]
        target: Option<PathBuf>,

        /// Skip sets present in osu!.db (defaults to the stable install)
        #[arg(long, value_name = "DB", num_args = 0..=1)]
        skip_owned: Option<Option<PathBuf>>,

        /// Hand finished archives to a game client
        #[arg(long, value_enum)]
        auto_place: Option<ClientArg>,

        /// Races per set before giving up (0 = until cancelled)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds to wait between races for the same set
        #[arg(long, value_name = "SECS")]
        retry_delay: Option<u64>,

        /// Print mirror health after the batch
        #[arg(long)]
        show_health: bool,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,

        /// Write debug-level logs
        #[arg(long)]
        debug: bool,
    },

    /// Read osu!.db and report installed beatmaps
    Scan {
        /// Path to osu!.db (defaults to the stable install)
        database: Option<PathBuf>,

        /// Print every beatmap
        #[arg(long, conflicts_with = "ids_only")]
        list: bool,

        /// Print only the distinct set IDs, one per line
        #[arg(long)]
        ids_only: bool,
    },

    /// View or edit config.ini
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Download {
            ids,
            ids_file,
            video,
            concurrency,
            target,
            skip_owned,
            auto_place,
            max_attempts,
            retry_delay,
            show_health,
            no_progress,
            debug,
        } => commands::download::run(DownloadArgs {
            ids,
            ids_file,
            video,
            concurrency,
            target,
            skip_owned,
            auto_place,
            max_attempts,
            retry_delay,
            show_health,
            no_progress,
            debug,
        }),
        Commands::Scan {
            database,
            list,
            ids_only,
        } => commands::scan::run(ScanArgs {
            database,
            list,
            ids_only,
        }),
        Commands::Config(command) => commands::config::run(command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
