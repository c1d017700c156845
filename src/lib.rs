//! Exporter Core Library
//!
//! This library provides the core functionality for the exporter tool, which
//! re-downloads a list of hosted uploads described by a CSV manifest into a
//! local directory and remembers what it already fetched across runs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`manifest`] - CSV manifest loading
//! - [`config`] - Optional JSON settings file
//! - [`target`] - URL construction and per-row download targets
//! - [`ledger`] - Append-only record of completed downloads
//! - [`probe`] - Local-existence checks against another directory
//! - [`download`] - HTTP client, retry policy and the retrying fetcher
//! - [`report`] - Progress/log event sink and formatting helpers
//! - [`batch`] - The batch driver tying everything together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod download;
pub mod ledger;
pub mod manifest;
pub mod probe;
pub mod report;
pub mod target;

// Re-export commonly used types
pub use batch::{
    BatchDriver, BatchError, BatchOptions, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
    RunSummary, SkipReason,
};
pub use config::Settings;
pub use download::{
    Fetch, FetchError, FetchOutcome, HttpClient, RetryDecision, RetryPolicy, RetryingFetcher,
    TransferStats,
};
pub use ledger::{CompletionLedger, LedgerError};
pub use manifest::{ManifestEntry, ManifestError, load_manifest, parse_manifest};
pub use probe::{DirectoryProbe, LocalProbe};
pub use report::{LogRing, NoopReporter, Reporter, human_readable_speed};
pub use target::{DEFAULT_BASE_URL, DownloadTarget, UrlBuilder};
