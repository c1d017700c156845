//! URL construction and per-row download targets.
//!
//! A [`DownloadTarget`] is recomputed for every manifest row from the row
//! itself, the configured output root and the default subdomain.

use std::path::{Path, PathBuf};

use crate::manifest::ManifestEntry;

/// Upload host used when no base URL override is configured.
pub const DEFAULT_BASE_URL: &str = "https://us-east-1.tixte.net/uploads";

/// Builds absolute download URLs from manifest fields.
///
/// Construction never fails and performs no validation: an empty subdomain
/// produces a well-formed URL that will simply fail to fetch later.
///
/// ```
/// use exporter_core::UrlBuilder;
///
/// let builder = UrlBuilder::default();
/// assert_eq!(
///     builder.build("acme", "a1b2", "png"),
///     "https://us-east-1.tixte.net/uploads/acme/a1b2.png"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: String,
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl UrlBuilder {
    /// Creates a builder rooted at `base`. A trailing slash is ignored.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// Returns the base URL without trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Maps (subdomain, filename, extension) to an absolute URL.
    #[must_use]
    pub fn build(&self, subdomain: &str, filename: &str, extension: &str) -> String {
        format!("{}/{subdomain}/{filename}.{extension}", self.base)
    }
}

/// Everything needed to fetch one manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Absolute source URL.
    pub url: String,
    /// Destination path under the output root.
    pub save_path: PathBuf,
    /// `filename.extension`, used in logs and progress output.
    pub display_name: String,
}

impl DownloadTarget {
    /// Derives the target for `entry`.
    ///
    /// The row's own subdomain wins; otherwise `default_subdomain`, otherwise
    /// the empty string.
    #[must_use]
    pub fn resolve(
        entry: &ManifestEntry,
        output_root: &Path,
        default_subdomain: Option<&str>,
        urls: &UrlBuilder,
    ) -> Self {
        let subdomain = entry
            .subdomain
            .as_deref()
            .or(default_subdomain)
            .unwrap_or_default();
        let display_name = entry.save_name();
        Self {
            url: urls.build(subdomain, &entry.filename, &entry.extension),
            save_path: output_root.join(&display_name),
            display_name,
        }
    }
}
