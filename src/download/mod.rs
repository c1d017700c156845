//! Resumable single-file download engine.
//!
//! # Features
//!
//! - Streaming downloads written in fixed 8 KiB chunks
//! - Bounded retries with uncapped exponential backoff plus jitter
//! - Instantaneous throughput reported after every chunk
//! - Cooperative cancellation between chunks and during sleeps
//! - Transport failures kept apart from local filesystem failures
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use exporter_core::download::{Fetch, HttpClient, RetryPolicy, RetryingFetcher};
//! use exporter_core::report::NoopReporter;
//! use exporter_core::DownloadTarget;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = RetryingFetcher::new(HttpClient::with_default_user_agent()?, RetryPolicy::default());
//! let target = DownloadTarget {
//!     url: "https://example.com/uploads/site/a.png".to_string(),
//!     save_path: "exported_files/a.png".into(),
//!     display_name: "a.png".to_string(),
//! };
//! let outcome = fetcher.fetch(&target, &NoopReporter, &AtomicBool::new(false)).await?;
//! println!("success: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod fetcher;
mod pause;
mod retry;

pub use client::HttpClient;
pub use error::FetchError;
pub use fetcher::{Fetch, FetchOutcome, RetryingFetcher, TransferStats};
pub use pause::sleep_unless_interrupted;
pub use retry::{RetryDecision, RetryPolicy};

// Note: no module-local Result aliases.
// Use `Result<T, FetchError>` explicitly in function signatures.
