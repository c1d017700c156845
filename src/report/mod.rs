//! Progress and log reporting.
//!
//! The batch driver and the fetcher push events into a [`Reporter`]. The core
//! never depends on what a reporter does with them: ledger and filesystem side
//! effects are identical with [`NoopReporter`].
//!
//! Reporters are shared between concurrent download tasks, so implementations
//! must be `Send + Sync` and keep their own output coherent.

mod log_ring;

pub use log_ring::{DEFAULT_LOG_CAPACITY, LogRing};

use crate::batch::RunSummary;

/// Sink for batch and transfer events.
///
/// Every method has a no-op default so implementors only override what they
/// render.
pub trait Reporter: Send + Sync {
    /// A batch of `total` manifest entries is about to be processed.
    fn on_batch_start(&self, _total: usize) {}

    /// A transfer for `name` is starting.
    fn on_file_start(&self, _name: &str) {}

    /// Instantaneous average throughput for the transfer of `name`.
    fn on_file_progress(&self, _name: &str, _bytes_per_sec: f64) {}

    /// The transfer for `name` has ended (any outcome).
    fn on_file_finish(&self, _name: &str) {}

    /// One manifest entry has been fully handled (skipped, fetched or failed).
    fn on_entry_complete(&self) {}

    /// A human-readable activity line.
    fn on_log_line(&self, _text: &str) {}

    /// The batch has ended.
    fn on_batch_end(&self, _summary: &RunSummary) {}
}

/// Reporter that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Formats a throughput in B/s, KB/s or MB/s with two decimals.
///
/// ```
/// use exporter_core::report::human_readable_speed;
///
/// assert_eq!(human_readable_speed(512.0), "512.00 B/s");
/// assert_eq!(human_readable_speed(2048.0), "2.00 KB/s");
/// ```
#[must_use]
pub fn human_readable_speed(bytes_per_sec: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.2} B/s")
    } else if bytes_per_sec < MIB {
        format!("{:.2} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.2} MB/s", bytes_per_sec / MIB)
    }
}
