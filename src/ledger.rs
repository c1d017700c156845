//! Append-only record of completed downloads.
//!
//! The ledger file holds one save path per line. On load every line is reduced
//! to its file name and re-rooted under the *current* output directory, so a
//! file recorded under a different output directory in an earlier run still
//! counts as done. Lines are only ever appended; duplicates are harmless.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Default ledger file name, resolved against the working directory.
pub const DEFAULT_LEDGER_FILE: &str = "downloaded.log";

/// Failure to append to the ledger.
#[derive(Debug, Error)]
#[error("failed to append {entry} to ledger {path}: {source}")]
pub struct LedgerError {
    /// Ledger file path.
    pub path: PathBuf,
    /// Save path that was being recorded.
    pub entry: PathBuf,
    /// Underlying IO error.
    #[source]
    pub source: std::io::Error,
}

/// Completion ledger bound to one output root.
#[derive(Debug)]
pub struct CompletionLedger {
    log_path: PathBuf,
    output_root: PathBuf,
    known: Mutex<HashSet<PathBuf>>,
    writer: tokio::sync::Mutex<Option<File>>,
}

impl CompletionLedger {
    /// Loads the ledger at `log_path`, keyed against `output_root`.
    ///
    /// A missing or unreadable file yields an empty ledger. Blank lines are
    /// skipped.
    #[instrument(fields(log_path = %log_path.display(), output_root = %output_root.display()))]
    pub async fn load(log_path: &Path, output_root: &Path) -> Self {
        let known = match tokio::fs::read_to_string(log_path).await {
            Ok(raw) => rekey_lines(&raw, output_root),
            Err(error) if error.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(error) => {
                warn!(%error, "failed to read ledger, starting empty");
                HashSet::new()
            }
        };
        debug!(entries = known.len(), "ledger loaded");

        Self {
            log_path: log_path.to_path_buf(),
            output_root: output_root.to_path_buf(),
            known: Mutex::new(known),
            writer: tokio::sync::Mutex::new(None),
        }
    }

    /// Path of the backing ledger file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of distinct files currently known as completed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_known().len()
    }

    /// Returns true when no completed files are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a file with the same name as `save_path` was recorded.
    #[must_use]
    pub fn contains(&self, save_path: &Path) -> bool {
        let Some(key) = rekey(save_path, &self.output_root) else {
            return false;
        };
        self.lock_known().contains(&key)
    }

    /// Appends `save_path` to the ledger and syncs it to disk before returning.
    ///
    /// Concurrent callers are serialised so lines never interleave.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the file cannot be opened, written or synced.
    #[instrument(skip(self), fields(save_path = %save_path.display()))]
    pub async fn record(&self, save_path: &Path) -> Result<(), LedgerError> {
        let mut writer = self.writer.lock().await;
        let file = match writer.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)
                .await
                .map_err(|source| self.error(save_path, source))?,
        };
        let file = writer.insert(file);

        let mut line = save_path.to_string_lossy().into_owned();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| self.error(save_path, source))?;
        file.flush()
            .await
            .map_err(|source| self.error(save_path, source))?;
        file.sync_data()
            .await
            .map_err(|source| self.error(save_path, source))?;

        if let Some(key) = rekey(save_path, &self.output_root) {
            self.lock_known().insert(key);
        }
        debug!("ledger entry recorded");
        Ok(())
    }

    fn error(&self, save_path: &Path, source: std::io::Error) -> LedgerError {
        LedgerError {
            path: self.log_path.clone(),
            entry: save_path.to_path_buf(),
            source,
        }
    }

    fn lock_known(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.known
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn rekey_lines(raw: &str, output_root: &Path) -> HashSet<PathBuf> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| rekey(Path::new(line), output_root))
        .collect()
}

fn rekey(path: &Path, output_root: &Path) -> Option<PathBuf> {
    path.file_name().map(|name| output_root.join(name))
}
