//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use exporter_core::config::DEFAULT_CONFIG_FILE;
use exporter_core::download::constants::{
    DEFAULT_BASE_DELAY_SECS, DEFAULT_JITTER_SECS, DEFAULT_MAX_RETRIES, DEFAULT_USER_AGENT,
};
use exporter_core::ledger::DEFAULT_LEDGER_FILE;
use exporter_core::{DEFAULT_BASE_URL, DEFAULT_CONCURRENCY};

/// Default manifest location.
pub const DEFAULT_CSV_FILE: &str = "data/uploads.csv";

/// Default output root.
pub const DEFAULT_OUTPUT_DIR: &str = "exported_files";

/// Default diagnostic log, truncated at the start of every run.
pub const DEFAULT_DETAILED_LOG: &str = "detailed.log";

/// Re-download hosted uploads listed in a CSV export.
///
/// Exporter reads a manifest of `Filename,Extension[,Subdomain]` rows, rebuilds
/// each file's URL and downloads it into the output directory. Finished files
/// are remembered in a ledger so interrupted runs can simply be restarted.
#[derive(Parser, Debug)]
#[command(name = "exporter")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the CSV manifest
    #[arg(long, default_value = DEFAULT_CSV_FILE)]
    pub csv: PathBuf,

    /// Directory downloaded files are written to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Base delay in seconds between downloads and for retry backoff
    #[arg(long, default_value_t = DEFAULT_BASE_DELAY_SECS, value_parser = parse_seconds)]
    pub delay: f64,

    /// Maximum random jitter in seconds added to every delay
    #[arg(long, default_value_t = DEFAULT_JITTER_SECS, value_parser = parse_seconds)]
    pub jitter: f64,

    /// Maximum retry attempts per file after the first failure (0-50)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=50))]
    pub max_retries: u32,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Show what would be downloaded without downloading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum concurrent downloads (1-16)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: u8,

    /// JSON settings file (local_check_dir, subdomain)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Completion ledger file
    #[arg(long, default_value = DEFAULT_LEDGER_FILE)]
    pub ledger: PathBuf,

    /// Diagnostic log file (overwritten every run)
    #[arg(long, default_value = DEFAULT_DETAILED_LOG)]
    pub detailed_log: PathBuf,

    /// Upload host prefix used to build file URLs
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parses a non-negative, finite number of seconds.
fn parse_seconds(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("`{raw}` must be a non-negative number of seconds"));
    }
    Ok(value)
}
