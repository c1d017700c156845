//! Batch driver: walks the manifest and decides, per entry, whether to skip
//! or fetch.
//!
//! Skip checks run in a fixed order and the first match wins:
//!
//! 1. the completion ledger lists the file,
//! 2. a file already exists at the save path,
//! 3. the local-existence probe finds the file name,
//! 4. dry-run mode is on.
//!
//! Every entry (skipped or not) first takes a worker permit. With the default
//! single worker this makes the whole run strictly sequential: entry `n + 1`
//! is not even inspected until entry `n` has been fetched and the pacing
//! sleep after it has elapsed.
//!
//! Rows that resolve to the same save path are serialised on a per-path
//! lock held until the transfer and its ledger write finish, so a duplicate
//! row sees the first row's result in its skip checks.

mod summary;

pub use summary::{RunSummary, SkipReason};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::download::{Fetch, FetchOutcome, RetryPolicy, sleep_unless_interrupted};
use crate::ledger::CompletionLedger;
use crate::manifest::ManifestEntry;
use crate::probe::LocalProbe;
use crate::report::{Reporter, human_readable_speed};
use crate::target::{DownloadTarget, UrlBuilder};

use summary::SummaryCounters;

/// Default number of concurrent transfers.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Minimum allowed concurrency.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency.
pub const MAX_CONCURRENCY: usize = 16;

const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// The output root could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Output root.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Per-run settings for [`BatchDriver`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Root directory for downloaded files.
    pub output_dir: PathBuf,
    /// Report what would be fetched without fetching or recording anything.
    pub dry_run: bool,
    /// Subdomain used for rows that do not carry their own.
    pub default_subdomain: Option<String>,
    /// Source of the pause between fetched entries.
    pub pacing: RetryPolicy,
    /// Number of transfers allowed to run at once.
    pub concurrency: usize,
}

impl BatchOptions {
    /// Options for `output_dir` with default pacing and a single worker.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            dry_run: false,
            default_subdomain: None,
            pacing: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// State shared by the driver loop and its transfer tasks.
struct Shared {
    fetcher: Arc<dyn Fetch>,
    ledger: Arc<CompletionLedger>,
    reporter: Arc<dyn Reporter>,
    counters: SummaryCounters,
    pacing: RetryPolicy,
}

impl Shared {
    /// Sends an activity line to the reporter and the diagnostic log.
    fn activity(&self, text: &str) {
        info!("{text}");
        self.reporter.on_log_line(text);
    }
}

/// Runs a manifest to completion.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::sync::atomic::AtomicBool;
/// use exporter_core::batch::{BatchDriver, BatchOptions};
/// use exporter_core::download::{HttpClient, RetryPolicy, RetryingFetcher};
/// use exporter_core::report::NoopReporter;
/// use exporter_core::{CompletionLedger, ManifestEntry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let output = std::path::Path::new("exported_files");
/// let fetcher = RetryingFetcher::new(HttpClient::with_default_user_agent()?, RetryPolicy::default());
/// let ledger = CompletionLedger::load("downloaded.log".as_ref(), output).await;
/// let driver = BatchDriver::new(
///     Arc::new(fetcher),
///     Arc::new(ledger),
///     Arc::new(NoopReporter),
///     BatchOptions::new(output),
/// )?;
/// let entries = vec![ManifestEntry {
///     filename: "a1".into(),
///     extension: "png".into(),
///     subdomain: Some("site".into()),
/// }];
/// let summary = driver.run(&entries, Arc::new(AtomicBool::new(false))).await?;
/// println!("downloaded {}", summary.downloaded);
/// # Ok(())
/// # }
/// ```
pub struct BatchDriver {
    fetcher: Arc<dyn Fetch>,
    ledger: Arc<CompletionLedger>,
    reporter: Arc<dyn Reporter>,
    probe: Option<Arc<dyn LocalProbe>>,
    urls: UrlBuilder,
    options: BatchOptions,
}

impl std::fmt::Debug for BatchDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDriver")
            .field("ledger", &self.ledger.log_path())
            .field("probe", &self.probe)
            .field("urls", &self.urls)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BatchDriver {
    /// Creates a driver.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidConcurrency`] if `options.concurrency` is
    /// outside `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        ledger: Arc<CompletionLedger>,
        reporter: Arc<dyn Reporter>,
        options: BatchOptions,
    ) -> Result<Self, BatchError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(BatchError::InvalidConcurrency {
                value: options.concurrency,
            });
        }
        Ok(Self {
            fetcher,
            ledger,
            reporter,
            probe: None,
            urls: UrlBuilder::default(),
            options,
        })
    }

    /// Enables the local-existence check.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn LocalProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Replaces the URL builder (mirrors, test servers).
    #[must_use]
    pub fn with_url_builder(mut self, urls: UrlBuilder) -> Self {
        self.urls = urls;
        self
    }

    /// Processes `entries` in order and returns the run totals.
    ///
    /// When `interrupted` becomes true the driver stops claiming entries,
    /// waits for in-flight transfers to reach their next safe point and
    /// returns a summary with `interrupted` set. Individual download failures
    /// never make this method fail.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::OutputDir`] if the output root cannot be created
    /// and [`BatchError::SemaphoreClosed`] if the worker pool breaks.
    #[instrument(skip(self, entries, interrupted), fields(
        output_dir = %self.options.output_dir.display(),
        total = entries.len(),
        dry_run = self.options.dry_run,
    ))]
    pub async fn run(
        &self,
        entries: &[ManifestEntry],
        interrupted: Arc<AtomicBool>,
    ) -> Result<RunSummary, BatchError> {
        let output_dir = &self.options.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| BatchError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let shared = Arc::new(Shared {
            fetcher: Arc::clone(&self.fetcher),
            ledger: Arc::clone(&self.ledger),
            reporter: Arc::clone(&self.reporter),
            counters: SummaryCounters::new(entries.len()),
            pacing: self.options.pacing.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut path_locks: HashMap<PathBuf, Arc<AsyncMutex<()>>> = HashMap::new();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        info!(total_files = entries.len(), "starting batch");
        shared.reporter.on_batch_start(entries.len());

        for entry in entries {
            if interrupted.load(Ordering::SeqCst) {
                shared.counters.set_interrupted();
                break;
            }

            // Race the permit against the interrupt flag so Ctrl+C while
            // every worker is busy stops the loop right away.
            let permit = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => None,
                result = Arc::clone(&semaphore).acquire_owned() => {
                    Some(result.map_err(|_| BatchError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                shared.counters.set_interrupted();
                break;
            };

            let target = DownloadTarget::resolve(
                entry,
                output_dir,
                self.options.default_subdomain.as_deref(),
                &self.urls,
            );

            let path_lock = Arc::clone(path_locks.entry(target.save_path.clone()).or_default());
            let path_guard = tokio::select! {
                biased;
                () = wait_for_interrupt(&interrupted) => None,
                guard = path_lock.lock_owned() => Some(guard),
            };
            let Some(path_guard) = path_guard else {
                shared.counters.set_interrupted();
                break;
            };

            if let Some(reason) = self.skip_reason(&target).await {
                if reason == SkipReason::DryRun {
                    debug!(url = %target.url, save_path = %target.save_path.display(), "would download");
                    shared.activity(&format!(
                        "{}: {} -> {}",
                        reason.label(),
                        target.url,
                        target.save_path.display()
                    ));
                } else {
                    shared.activity(&format!("{}: {}", reason.label(), target.display_name));
                }
                shared.counters.record_skip(reason);
                shared.reporter.on_entry_complete();
                drop(permit);
                continue;
            }

            if let Some(parent) = target.save_path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!(path = %parent.display(), error = %e, "failed to create directory");
                    shared.activity(&format!(
                        "Failed (could not create directory): {}",
                        target.display_name
                    ));
                    shared.counters.record_failed();
                    shared.reporter.on_entry_complete();
                    continue;
                }
            }

            let shared = Arc::clone(&shared);
            let interrupted = Arc::clone(&interrupted);
            handles.push(tokio::spawn(async move {
                // Permit and path lock are released when this block exits.
                let _permit = permit;
                let _path_guard = path_guard;
                transfer(&shared, &target, &interrupted).await;
            }));
        }

        debug!(task_count = handles.len(), "waiting for transfers to finish");
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "transfer task panicked");
                shared.counters.record_failed();
            }
        }

        if interrupted.load(Ordering::SeqCst) {
            shared.counters.set_interrupted();
        }

        let summary = shared.counters.snapshot();
        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped(),
            failed = summary.failed,
            interrupted = summary.interrupted,
            "batch complete"
        );
        shared.reporter.on_batch_end(&summary);
        Ok(summary)
    }

    /// First matching skip reason for `target`, if any.
    async fn skip_reason(&self, target: &DownloadTarget) -> Option<SkipReason> {
        if self.ledger.contains(&target.save_path) {
            return Some(SkipReason::AlreadyLogged);
        }
        if exists(&target.save_path).await {
            return Some(SkipReason::ExistsInOutput);
        }
        if let Some(probe) = &self.probe {
            let probe = Arc::clone(probe);
            let name = target.display_name.clone();
            match tokio::task::spawn_blocking(move || probe.contains(&name)).await {
                Ok(true) => return Some(SkipReason::FoundLocally),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "local probe task failed"),
            }
        }
        if self.options.dry_run {
            return Some(SkipReason::DryRun);
        }
        None
    }
}

/// Fetches one target, records the outcome and paces before the next entry.
async fn transfer(shared: &Shared, target: &DownloadTarget, interrupted: &AtomicBool) {
    let name = target.display_name.as_str();
    shared.reporter.on_file_start(name);
    let result = shared
        .fetcher
        .fetch(target, shared.reporter.as_ref(), interrupted)
        .await;
    shared.reporter.on_file_finish(name);

    match result {
        Ok(FetchOutcome::Completed(stats)) => {
            if let Err(e) = shared.ledger.record(&target.save_path).await {
                error!(error = %e, "failed to record completed download");
                shared.activity(&format!("Could not update ledger for {name}: {e}"));
            }
            shared.counters.record_downloaded();
            shared.activity(&format!(
                "Downloaded successfully: {name} @ {}",
                human_readable_speed(stats.final_speed)
            ));
        }
        Ok(FetchOutcome::Exhausted { attempts, last_error }) => {
            warn!(attempts, error = %last_error, file = name, "giving up");
            shared.counters.record_failed();
            shared.activity(&format!("Failed after retries: {name}"));
        }
        Ok(FetchOutcome::Interrupted { .. }) => {
            shared.counters.set_interrupted();
            shared.activity(&format!("Interrupted: {name}"));
        }
        Err(e) => {
            error!(error = %e, file = name, "download aborted by local error");
            shared.counters.record_failed();
            shared.activity(&format!("Failed (local error): {name}: {e}"));
        }
    }

    if !interrupted.load(Ordering::SeqCst) {
        sleep_unless_interrupted(shared.pacing.pacing_delay(), interrupted).await;
    }
    shared.reporter.on_entry_complete();
}

async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::SeqCst) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
