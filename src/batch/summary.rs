//! Run counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Why an entry was not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Present in the completion ledger.
    AlreadyLogged,
    /// A file already exists at the save path.
    ExistsInOutput,
    /// Found by the local-existence probe.
    FoundLocally,
    /// Dry-run mode.
    DryRun,
}

impl SkipReason {
    /// Label used in activity lines and the summary.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AlreadyLogged => "Skipped (already downloaded)",
            Self::ExistsInOutput => "Skipped (exists in output)",
            Self::FoundLocally => "Skipped (found in local dir)",
            Self::DryRun => "Dry run, skipping download",
        }
    }
}

/// Totals for one batch run. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries in the manifest.
    pub total_files: usize,
    /// Files fetched successfully in this run.
    pub downloaded: usize,
    /// Entries skipped because the ledger lists them.
    pub skipped_already_logged: usize,
    /// Entries skipped because the save path already exists.
    pub skipped_exists_output: usize,
    /// Entries skipped because the local probe found them.
    pub skipped_exists_local: usize,
    /// Entries skipped because of dry-run mode.
    pub skipped_dry_run: usize,
    /// Entries whose fetch failed (not a skip bucket).
    pub failed: usize,
    /// Whether the run was cut short by an interruption.
    pub interrupted: bool,
}

impl RunSummary {
    /// Total of all skip buckets.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_already_logged
            + self.skipped_exists_output
            + self.skipped_exists_local
            + self.skipped_dry_run
    }

    /// Entries that reached an outcome (downloaded, skipped or failed).
    #[must_use]
    pub fn processed(&self) -> usize {
        self.downloaded + self.skipped() + self.failed
    }

    /// Whether the "nothing was downloaded" hint should be shown.
    #[must_use]
    pub fn needs_hint(&self, dry_run: bool) -> bool {
        self.downloaded == 0 && !dry_run
    }
}

/// Thread-safe counters updated from concurrent download tasks.
#[derive(Debug, Default)]
pub(crate) struct SummaryCounters {
    total_files: usize,
    downloaded: AtomicUsize,
    skipped_already_logged: AtomicUsize,
    skipped_exists_output: AtomicUsize,
    skipped_exists_local: AtomicUsize,
    skipped_dry_run: AtomicUsize,
    failed: AtomicUsize,
    interrupted: AtomicBool,
}

impl SummaryCounters {
    pub(crate) fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub(crate) fn record_skip(&self, reason: SkipReason) {
        let counter = match reason {
            SkipReason::AlreadyLogged => &self.skipped_already_logged,
            SkipReason::ExistsInOutput => &self.skipped_exists_output,
            SkipReason::FoundLocally => &self.skipped_exists_local,
            SkipReason::DryRun => &self.skipped_dry_run,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> RunSummary {
        RunSummary {
            total_files: self.total_files,
            downloaded: self.downloaded.load(Ordering::SeqCst),
            skipped_already_logged: self.skipped_already_logged.load(Ordering::SeqCst),
            skipped_exists_output: self.skipped_exists_output.load(Ordering::SeqCst),
            skipped_exists_local: self.skipped_exists_local.load(Ordering::SeqCst),
            skipped_dry_run: self.skipped_dry_run.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            interrupted: self.interrupted.load(Ordering::SeqCst),
        }
    }
}
