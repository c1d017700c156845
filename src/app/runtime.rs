use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use exporter_core::report::{NoopReporter, Reporter};
use exporter_core::{
    BatchDriver, BatchOptions, CompletionLedger, DirectoryProbe, HttpClient, RetryPolicy,
    RetryingFetcher, Settings, UrlBuilder, load_manifest,
};
use tracing::{info, warn};

use crate::app::reporter::TerminalReporter;
use crate::app::terminal;
use crate::cli::Args;
use crate::output::{self, RunContext};

pub(crate) async fn run_exporter() -> Result<()> {
    let args = Args::parse();

    let use_progress = terminal::should_use_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(
        terminal::console_level(args.verbose, args.quiet, use_progress),
        terminal::no_color_env_requested(),
        &args.detailed_log,
    );

    log_arguments(&args);
    info!(output_dir = %output::display_path(&args.output).display(), "Output directory");

    let settings = Settings::load(&args.config);

    let entries = load_manifest(&args.csv)
        .with_context(|| format!("failed to load manifest {}", args.csv.display()))?;
    info!(csv = %args.csv.display(), rows = entries.len(), "Loaded CSV");

    let client = HttpClient::new(&args.user_agent).context("failed to build HTTP client")?;
    let policy = RetryPolicy::from_secs(args.max_retries, args.delay, args.jitter);
    let fetcher = RetryingFetcher::new(client, policy.clone());
    let ledger = CompletionLedger::load(&args.ledger, &args.output).await;
    info!(entries = ledger.len(), ledger = %args.ledger.display(), "ledger ready");

    let reporter: Arc<dyn Reporter> = if use_progress {
        Arc::new(TerminalReporter::new())
    } else {
        Arc::new(NoopReporter)
    };

    let options = BatchOptions {
        output_dir: args.output.clone(),
        dry_run: args.dry_run,
        default_subdomain: settings.default_subdomain().map(str::to_string),
        pacing: policy,
        concurrency: usize::from(args.concurrency),
    };
    let mut driver = BatchDriver::new(Arc::new(fetcher), Arc::new(ledger), reporter, options)?
        .with_url_builder(UrlBuilder::new(args.base_url.as_str()));
    if let Some(dir) = settings.local_check_dir() {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "local check directory does not exist");
        }
        info!(dir = %dir.display(), "checking local directory for existing files");
        driver = driver.with_probe(Arc::new(DirectoryProbe::new(dir)));
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let summary = driver.run(&entries, Arc::clone(&interrupted)).await?;
    if summary.interrupted {
        warn!(
            downloaded = summary.downloaded,
            total = summary.total_files,
            "interrupted by user, run again to resume"
        );
    }

    output::print_run_report(
        &summary,
        &RunContext {
            csv: &args.csv,
            output_dir: &args.output,
            dry_run: args.dry_run,
        },
        &args.detailed_log,
    );
    Ok(())
}

/// Writes every effective argument to the diagnostic log.
fn log_arguments(args: &Args) {
    info!(
        csv = %args.csv.display(),
        output = %args.output.display(),
        delay = args.delay,
        jitter = args.jitter,
        max_retries = args.max_retries,
        user_agent = %args.user_agent,
        dry_run = args.dry_run,
        concurrency = args.concurrency,
        config = %args.config.display(),
        ledger = %args.ledger.display(),
        detailed_log = %args.detailed_log.display(),
        base_url = %args.base_url,
        verbose = args.verbose,
        quiet = args.quiet,
        "command-line arguments"
    );
}
