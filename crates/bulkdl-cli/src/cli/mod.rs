//! CLI for the bulkdl bulk URL downloader.

mod commands;
mod report;

use anyhow::Result;
use bulkdl_core::config::{self, RunSettings};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_download, show_config};

/// Every URL downloaded or skipped.
pub const EXIT_OK: i32 = 0;
/// At least one URL failed, or the run was interrupted.
pub const EXIT_FAILURES: i32 = 1;
/// The run could not start (bad configuration, unreadable URL list).
pub const EXIT_ERROR: i32 = 2;

/// Top-level CLI for bulkdl.
#[derive(Debug, Parser)]
#[command(name = "bulkdl")]
#[command(about = "bulkdl: download a list of URLs into a mirrored directory tree", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every URL listed in a file.
    Run(RunArgs),

    /// Show the config file location and the effective configuration.
    Config,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Text file with one URL per line (blank lines and `#` comments ignored).
    #[arg(long, value_name = "FILE")]
    pub urls_file: PathBuf,

    /// Directory the files are written under.
    #[arg(long, value_name = "DIR")]
    pub download_dir: PathBuf,

    /// Strip this prefix from URL paths (path or full URL). Repeatable; longest match wins.
    #[arg(long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,

    /// Strip the longest common directory prefix of all URLs. Ignored when --prefix is given.
    #[arg(long)]
    pub auto_prefix: bool,

    /// Only download URLs matching this regular expression.
    #[arg(long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Invert --filter: download URLs that do not match.
    #[arg(long)]
    pub reverse: bool,

    /// Shuffle the download order.
    #[arg(long)]
    pub randomize: bool,

    /// Attempts per URL, including the first (overrides config).
    #[arg(long, value_name = "N")]
    pub max_tries: Option<u32>,

    /// URLs downloading at once (overrides config).
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Print where each URL would go without downloading anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Download even when the destination file already exists.
    #[arg(long)]
    pub overwrite: bool,

    /// Seconds to pause after each successful download (overrides config).
    #[arg(long, value_name = "SECS")]
    pub pause: Option<f64>,
}

impl RunArgs {
    /// Per-run settings for the core; the URL list path stays with the caller.
    pub fn to_settings(&self) -> RunSettings {
        RunSettings {
            download_dir: self.download_dir.clone(),
            prefixes: self.prefixes.clone(),
            auto_detect_prefix: self.auto_prefix,
            filter: self.filter.clone(),
            reverse: self.reverse,
            randomize: self.randomize,
            max_tries: self.max_tries,
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            overwrite: self.overwrite,
            pause_after_download_secs: self.pause,
        }
    }
}

impl Cli {
    /// Parse arguments, run the command and return the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run(args) => run_download(&args, &cfg).await,
            CliCommand::Config => {
                show_config(&cfg)?;
                Ok(EXIT_OK)
            }
        }
    }
}
