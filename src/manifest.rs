//! Manifest loading.
//!
//! The manifest is a CSV export with one row per uploaded file and the
//! columns `Filename`, `Extension` and an optional `Subdomain`. Row order is
//! processing order.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// One file to retrieve, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Remote file stem.
    pub filename: String,
    /// Remote file extension, without the leading dot.
    pub extension: String,
    /// Per-row subdomain override.
    pub subdomain: Option<String>,
}

impl ManifestEntry {
    /// Local file name for this entry (`filename.extension`).
    #[must_use]
    pub fn save_name(&self) -> String {
        format!("{}.{}", self.filename, self.extension)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestRecord {
    #[serde(rename = "Filename")]
    filename: String,
    #[serde(rename = "Extension")]
    extension: String,
    #[serde(rename = "Subdomain", default)]
    subdomain: Option<String>,
}

impl From<ManifestRecord> for ManifestEntry {
    fn from(record: ManifestRecord) -> Self {
        let subdomain = record
            .subdomain
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self {
            filename: record.filename,
            extension: record.extension,
            subdomain,
        }
    }
}

/// Errors raised while reading a manifest. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file does not exist.
    #[error("manifest not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The manifest exists but could not be opened or read.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path.
        path: PathBuf,
        /// Underlying CSV/IO error.
        #[source]
        source: csv::Error,
    },

    /// A row could not be decoded into a manifest entry.
    #[error("malformed manifest row {row} in {path}: {source}")]
    Row {
        /// Manifest path.
        path: PathBuf,
        /// 1-based data row number (header excluded).
        row: usize,
        /// Underlying decode error.
        #[source]
        source: csv::Error,
    },
}

/// Reads all entries from the CSV manifest at `path`, preserving order.
///
/// # Errors
///
/// Returns [`ManifestError`] when the file is missing, unreadable, or any row
/// lacks the `Filename`/`Extension` columns.
#[instrument(fields(path = %path.display()))]
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let entries = read_entries(reader, path)?;
    debug!(rows = entries.len(), "manifest loaded");
    Ok(entries)
}

/// Parses manifest rows from an in-memory CSV document.
///
/// # Errors
///
/// Returns [`ManifestError::Row`] for the first row that cannot be decoded.
pub fn parse_manifest(csv_text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(csv_text.as_bytes());
    read_entries(reader, Path::new("<memory>"))
}

fn read_entries<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    path: &Path,
) -> Result<Vec<ManifestEntry>, ManifestError> {
    reader
        .deserialize::<ManifestRecord>()
        .enumerate()
        .map(|(index, record)| {
            record
                .map(ManifestEntry::from)
                .map_err(|source| classify_row_error(path, index + 1, source))
        })
        .collect()
}

fn classify_row_error(path: &Path, row: usize, source: csv::Error) -> ManifestError {
    if source.is_io_error() {
        ManifestError::Read {
            path: path.to_path_buf(),
            source,
        }
    } else {
        ManifestError::Row {
            path: path.to_path_buf(),
            row,
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_manifest_preserves_order_and_fields() {
        let entries = parse_manifest(
            "Filename,Extension,Subdomain\nzeta,png,site\nalpha,gif,\nmid,jpg,other\n",
        )
        .unwrap();

        let names: Vec<_> = entries.iter().map(ManifestEntry::save_name).collect();
        assert_eq!(names, ["zeta.png", "alpha.gif", "mid.jpg"]);
        assert_eq!(entries[0].subdomain.as_deref(), Some("site"));
        assert_eq!(entries[1].subdomain, None, "empty cell means no override");
        assert_eq!(entries[2].subdomain.as_deref(), Some("other"));
    }

    #[test]
    fn test_parse_manifest_without_subdomain_column() {
        let entries = parse_manifest("Filename,Extension\nfile,txt\n").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subdomain, None);
    }

    #[test]
    fn test_parse_manifest_ignores_extra_columns() {
        let entries =
            parse_manifest("Id,Filename,Extension,Size,Subdomain\n1,f,png,200, s \n").unwrap();
        assert_eq!(entries[0].filename, "f");
        assert_eq!(entries[0].subdomain.as_deref(), Some("s"));
    }

    #[test]
    fn test_parse_manifest_missing_required_column_is_row_error() {
        let result = parse_manifest("Filename\nonly-name\n");
        assert!(
            matches!(result, Err(ManifestError::Row { row: 1, .. })),
            "got {result:?}"
        );
    }

    #[test]
    fn test_parse_manifest_header_only_is_empty() {
        let entries = parse_manifest("Filename,Extension,Subdomain\n").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_load_manifest_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_manifest(&temp.path().join("absent.csv"));
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));
    }

    #[test]
    fn test_load_manifest_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("uploads.csv");
        std::fs::write(&path, "Filename,Extension,Subdomain\na,png,s\n").unwrap();

        let entries = load_manifest(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].save_name(), "a.png");
    }
}
