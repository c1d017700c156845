//! Local-existence probing.
//!
//! A probe answers "does a file with this name already exist somewhere
//! under the configured directory?". The driver only consults a probe when a
//! local check directory is configured.

use std::ffi::OsStr;
use std::path::PathBuf;

use tracing::trace;
use walkdir::WalkDir;

/// Capability used by the batch driver to skip files present elsewhere.
///
/// Implementations may cache, but must stay correct if the directory changes
/// between calls.
pub trait LocalProbe: Send + Sync + std::fmt::Debug {
    /// Returns true if an entry named exactly `file_name` exists.
    fn contains(&self, file_name: &str) -> bool;
}

/// Recursive, uncached search rooted at one directory.
#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    base_dir: PathBuf,
}

impl DirectoryProbe {
    /// Creates a probe for `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl LocalProbe for DirectoryProbe {
    fn contains(&self, file_name: &str) -> bool {
        let wanted = OsStr::new(file_name);
        let found = WalkDir::new(&self.base_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| entry.file_name() == wanted);
        trace!(base_dir = %self.base_dir.display(), file_name, found, "local probe");
        found
    }
}
