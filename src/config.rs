//! Optional JSON settings file.
//!
//! Only two keys are read: `local_check_dir` and `subdomain`. Anything else in
//! the file is ignored. A missing, unreadable or malformed file yields
//! default settings; it never aborts a run.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

/// Default settings file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Settings consumed by the batch driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Directory searched recursively for files that already exist locally.
    #[serde(default)]
    pub local_check_dir: Option<PathBuf>,
    /// Subdomain used for rows that do not carry their own.
    #[serde(default)]
    pub subdomain: Option<String>,
}

impl Settings {
    /// Loads settings from `path`, degrading to defaults on any problem.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Self::default();
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read settings file, using defaults");
                return Self::default();
            }
        };

        match Self::from_json_str(&raw) {
            Ok(settings) => {
                debug!(path = %path.display(), ?settings, "settings loaded");
                settings
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "invalid JSON in settings file, using defaults");
                Self::default()
            }
        }
    }

    /// Parses settings from a JSON document.
    ///
    /// Empty strings are normalised to `None`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is not a valid settings object.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let parsed: Self = serde_json::from_str(raw)?;
        Ok(parsed.normalized())
    }

    /// Local check directory, if one is configured and non-empty.
    #[must_use]
    pub fn local_check_dir(&self) -> Option<&Path> {
        self.local_check_dir.as_deref()
    }

    /// Default subdomain, if configured and non-empty.
    #[must_use]
    pub fn default_subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    fn normalized(self) -> Self {
        Self {
            local_check_dir: self
                .local_check_dir
                .filter(|dir| !dir.as_os_str().is_empty()),
            subdomain: self
                .subdomain
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }
}
