//! Constants for the download module (timeouts, chunking, defaults).

/// HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP read timeout between body reads (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Size of the slices the response body is written in (8 KiB).
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Approximate spacing of byte-count progress lines in the diagnostic log (1 MiB).
pub const PROGRESS_LOG_INTERVAL: u64 = 1024 * 1024;

/// Maximum number of response body bytes echoed to the log for a failed status.
pub const ERROR_BODY_PREVIEW_BYTES: usize = 500;

/// Default maximum retries per file (attempts = retries + 1).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay in seconds, used for backoff and inter-file pacing.
pub const DEFAULT_BASE_DELAY_SECS: f64 = 1.0;

/// Default upper bound of the random jitter in seconds.
pub const DEFAULT_JITTER_SECS: f64 = 0.5;

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
