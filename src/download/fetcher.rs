//! Single-file transfer with bounded retries.
//!
//! [`RetryingFetcher`] drives one download through an explicit state machine:
//!
//! ```text
//! Attempting ──ok──────────────▶ Succeeded
//!     │ retryable error
//!     ├──retries left──▶ RetryScheduled ──sleep──▶ Attempting
//!     └──none left─────▶ Exhausted
//! ```
//!
//! Every attempt writes the destination file from byte zero. A failed or
//! interrupted attempt removes what it wrote, so bytes from two attempts are
//! never merged and a failed file never looks "already present" to a later
//! run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Response, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, instrument, warn};

use super::constants::{CHUNK_SIZE, ERROR_BODY_PREVIEW_BYTES, PROGRESS_LOG_INTERVAL};
use super::pause::sleep_unless_interrupted;
use super::retry::{RetryDecision, RetryPolicy};
use super::{FetchError, HttpClient};
use crate::report::{Reporter, human_readable_speed};
use crate::target::DownloadTarget;

/// Measurements for a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStats {
    /// Bytes written by the successful attempt.
    pub bytes: u64,
    /// Wall time of the successful attempt's body transfer.
    pub elapsed: Duration,
    /// Last instantaneous average throughput, in bytes per second.
    pub final_speed: f64,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Result of a fetch that did not hit a local (non-retryable) error.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The file was written completely.
    Completed(TransferStats),

    /// Every permitted attempt failed with a transport error.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last_error: FetchError,
    },

    /// The interrupt flag was raised; any partial file has been removed.
    Interrupted {
        /// Attempts started before the interruption.
        attempts: u32,
    },
}

impl FetchOutcome {
    /// True for [`FetchOutcome::Completed`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Final throughput on success, `0.0` otherwise.
    #[must_use]
    pub fn final_speed(&self) -> f64 {
        match self {
            Self::Completed(stats) => stats.final_speed,
            Self::Exhausted { .. } | Self::Interrupted { .. } => 0.0,
        }
    }
}

/// Performs one file transfer on behalf of the batch driver.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Downloads `target.url` into `target.save_path`.
    ///
    /// Transport failures never surface as `Err`; they are retried and end in
    /// [`FetchOutcome::Exhausted`].
    ///
    /// # Errors
    ///
    /// Returns a non-retryable [`FetchError`] (local filesystem failure).
    async fn fetch(
        &self,
        target: &DownloadTarget,
        reporter: &dyn Reporter,
        interrupted: &AtomicBool,
    ) -> Result<FetchOutcome, FetchError>;
}

/// Per-fetch bookkeeping, dropped when the fetch returns.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    last_error: Option<FetchError>,
    bytes_transferred: u64,
    started_at: Instant,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            last_error: None,
            bytes_transferred: 0,
            started_at: Instant::now(),
        }
    }
}

enum FetchPhase {
    Attempting,
    Succeeded(TransferStats),
    RetryScheduled(Duration),
    Exhausted(FetchError),
}

enum AttemptResult {
    Completed(TransferStats),
    Interrupted,
}

/// HTTP fetcher with exponential backoff between attempts.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    client: HttpClient,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    /// Creates a fetcher using `client` for requests and `policy` for retries.
    #[must_use]
    pub fn new(client: HttpClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    async fn attempt(
        &self,
        target: &DownloadTarget,
        reporter: &dyn Reporter,
        interrupted: &AtomicBool,
        state: &mut RetryState,
    ) -> Result<AttemptResult, FetchError> {
        let response = self.client.get(&target.url).await?;
        let status = response.status();
        if status != StatusCode::OK {
            log_rejected_response(&target.url, response).await;
            return Err(FetchError::http_status(&target.url, status.as_u16()));
        }

        debug!(
            content_length = response.content_length().unwrap_or(0),
            "connection established"
        );

        let file = File::create(&target.save_path)
            .await
            .map_err(|e| FetchError::io(&target.save_path, e))?;

        let result = stream_to_file(file, response, target, reporter, interrupted, state).await;
        if !matches!(result, Ok(AttemptResult::Completed(_))) {
            discard_partial_file(&target.save_path).await;
        }
        result
    }
}

#[async_trait]
impl Fetch for RetryingFetcher {
    #[instrument(skip(self, target, reporter, interrupted), fields(url = %target.url))]
    async fn fetch(
        &self,
        target: &DownloadTarget,
        reporter: &dyn Reporter,
        interrupted: &AtomicBool,
    ) -> Result<FetchOutcome, FetchError> {
        let max_attempts = self.policy.max_attempts();
        info!(save_path = %target.save_path.display(), "attempting download");
        debug!(user_agent = self.client.user_agent(), "request headers");

        let mut state = RetryState::new();
        let mut phase = FetchPhase::Attempting;
        loop {
            phase = match phase {
                FetchPhase::Attempting => {
                    if interrupted.load(Ordering::SeqCst) {
                        return Ok(FetchOutcome::Interrupted {
                            attempts: state.attempt,
                        });
                    }
                    debug!(
                        "download attempt {}/{}",
                        state.attempt + 1,
                        max_attempts
                    );
                    state.bytes_transferred = 0;

                    match self.attempt(target, reporter, interrupted, &mut state).await {
                        Ok(AttemptResult::Completed(stats)) => FetchPhase::Succeeded(stats),
                        Ok(AttemptResult::Interrupted) => {
                            info!(
                                bytes = state.bytes_transferred,
                                "download interrupted, partial file removed"
                            );
                            return Ok(FetchOutcome::Interrupted {
                                attempts: state.attempt + 1,
                            });
                        }
                        Err(e) if e.is_retryable() => {
                            warn!(attempt = state.attempt + 1, error = %e, "download attempt failed");
                            match self.policy.decide(state.attempt) {
                                RetryDecision::Retry { delay, .. } => {
                                    state.last_error = Some(e);
                                    FetchPhase::RetryScheduled(delay)
                                }
                                RetryDecision::Exhausted { .. } => FetchPhase::Exhausted(e),
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "unexpected local error, not retrying");
                            return Err(e);
                        }
                    }
                }

                FetchPhase::RetryScheduled(delay) => {
                    info!(
                        "retrying in {:.2}s... (attempt {}/{})",
                        delay.as_secs_f64(),
                        state.attempt + 2,
                        max_attempts
                    );
                    if !sleep_unless_interrupted(delay, interrupted).await {
                        return Ok(FetchOutcome::Interrupted {
                            attempts: state.attempt + 1,
                        });
                    }
                    state.attempt += 1;
                    FetchPhase::Attempting
                }

                FetchPhase::Succeeded(stats) => {
                    let stats = TransferStats {
                        attempts: state.attempt + 1,
                        ..stats
                    };
                    let average = if stats.elapsed.is_zero() {
                        0.0
                    } else {
                        stats.bytes as f64 / stats.elapsed.as_secs_f64()
                    };
                    info!(
                        path = %target.save_path.display(),
                        bytes = stats.bytes,
                        seconds = %format!("{:.2}", stats.elapsed.as_secs_f64()),
                        average = %human_readable_speed(average),
                        attempts = stats.attempts,
                        "download complete"
                    );
                    return Ok(FetchOutcome::Completed(stats));
                }

                FetchPhase::Exhausted(last_error) => {
                    let attempts = state.attempt + 1;
                    warn!(
                        attempts,
                        total_seconds = %format!("{:.2}", state.started_at.elapsed().as_secs_f64()),
                        previous_error = ?state.last_error.as_ref().map(ToString::to_string),
                        "failed to download after {attempts} attempts"
                    );
                    return Ok(FetchOutcome::Exhausted {
                        attempts,
                        last_error,
                    });
                }
            };
        }
    }
}

/// Streams the response body into `file` in fixed-size chunks.
async fn stream_to_file(
    file: File,
    response: Response,
    target: &DownloadTarget,
    reporter: &dyn Reporter,
    interrupted: &AtomicBool,
    state: &mut RetryState,
) -> Result<AttemptResult, FetchError> {
    let io_error = |e: std::io::Error| FetchError::io(&target.save_path, e);
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let started = Instant::now();
    let mut final_speed = 0.0;
    let mut next_progress_log = PROGRESS_LOG_INTERVAL;

    while let Some(network_chunk) = stream.next().await {
        let network_chunk = network_chunk.map_err(|e| FetchError::transport(&target.url, e))?;

        for chunk in network_chunk.chunks(CHUNK_SIZE) {
            writer.write_all(chunk).await.map_err(io_error)?;
            state.bytes_transferred += chunk.len() as u64;

            let elapsed = started.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                final_speed = state.bytes_transferred as f64 / elapsed;
                reporter.on_file_progress(&target.display_name, final_speed);
            }
            if state.bytes_transferred >= next_progress_log {
                debug!(
                    bytes = state.bytes_transferred,
                    speed = %human_readable_speed(final_speed),
                    "progress"
                );
                next_progress_log += PROGRESS_LOG_INTERVAL;
            }

            if interrupted.load(Ordering::SeqCst) {
                return Ok(AttemptResult::Interrupted);
            }
        }
    }

    writer.flush().await.map_err(io_error)?;

    Ok(AttemptResult::Completed(TransferStats {
        bytes: state.bytes_transferred,
        elapsed: started.elapsed(),
        final_speed,
        attempts: state.attempt + 1,
    }))
}

/// Logs headers and the start of the body of a non-200 response.
async fn log_rejected_response(url: &str, response: Response) {
    let status = response.status();
    debug!(%url, status = status.as_u16(), headers = ?response.headers(), "request rejected");

    let mut preview = Vec::with_capacity(ERROR_BODY_PREVIEW_BYTES);
    let mut stream = response.bytes_stream();
    while preview.len() < ERROR_BODY_PREVIEW_BYTES {
        match stream.next().await {
            Some(Ok(chunk)) => {
                let take = chunk.len().min(ERROR_BODY_PREVIEW_BYTES - preview.len());
                preview.extend_from_slice(&chunk[..take]);
            }
            Some(Err(_)) | None => break,
        }
    }
    if !preview.is_empty() {
        debug!(body = %String::from_utf8_lossy(&preview), "response content");
    }
}

async fn discard_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::report::NoopReporter;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct SpeedRecorder {
        samples: Mutex<Vec<(String, f64)>>,
    }

    impl Reporter for SpeedRecorder {
        fn on_file_progress(&self, name: &str, bytes_per_sec: f64) {
            self.samples
                .lock()
                .unwrap()
                .push((name.to_string(), bytes_per_sec));
        }
    }

    fn target(server: &MockServer, dir: &TempDir, name: &str) -> DownloadTarget {
        DownloadTarget {
            url: format!("{}/uploads/site/{name}", server.uri()),
            save_path: dir.path().join(name),
            display_name: name.to_string(),
        }
    }

    fn fetcher(max_retries: u32) -> RetryingFetcher {
        RetryingFetcher::new(
            HttpClient::new("test-agent").unwrap(),
            RetryPolicy::immediate(max_retries),
        )
    }

    #[tokio::test]
    async fn test_fetch_writes_exact_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uploads/site/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcd".to_vec()))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "a.txt");

        let outcome = fetcher(0)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await
            .unwrap();

        let FetchOutcome::Completed(stats) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(stats.bytes, 4);
        assert_eq!(stats.attempts, 1);
        assert_eq!(std::fs::read(&target.save_path).unwrap(), b"abcd");
    }

    #[tokio::test]
    async fn test_fetch_reports_progress_per_chunk() {
        let server = MockServer::start().await;
        let body = vec![7u8; CHUNK_SIZE * 3 + 10];
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "big.bin");
        let recorder = SpeedRecorder::default();

        let outcome = fetcher(0)
            .fetch(&target, &recorder, &AtomicBool::new(false))
            .await
            .unwrap();

        assert!(outcome.is_success());
        let samples = recorder.samples.lock().unwrap();
        assert!(samples.len() <= 4, "at most one sample per 8 KiB chunk");
        assert!(samples.iter().all(|(name, speed)| name == "big.bin" && *speed > 0.0));
        assert_eq!(std::fs::read(&target.save_path).unwrap().len(), body.len());
    }

    #[tokio::test]
    async fn test_fetch_exhausts_after_max_retries_plus_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "fail.png");

        let outcome = fetcher(2)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(outcome.final_speed().abs() < f64::EPSILON);
        match outcome {
            FetchOutcome::Exhausted {
                attempts,
                last_error: FetchError::HttpStatus { status, .. },
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(status, 500);
            }
            other => panic!("expected exhaustion with HTTP 500, got {other:?}"),
        }
        assert!(!target.save_path.exists(), "no file for a failed fetch");
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "empty.png");

        let outcome = fetcher(0)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_fetch_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".to_vec()))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "retry.txt");

        let outcome = fetcher(3)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await
            .unwrap();

        let FetchOutcome::Completed(stats) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(stats.attempts, 2);
        assert_eq!(std::fs::read(&target.save_path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_fetch_truncates_stale_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "stale.txt");
        std::fs::write(&target.save_path, b"old content that is longer").unwrap();

        fetcher(0)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target.save_path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_fetch_unwritable_destination_is_io_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = DownloadTarget {
            url: format!("{}/x", server.uri()),
            save_path: PathBuf::from(dir.path()).join("missing-dir").join("x.bin"),
            display_name: "x.bin".to_string(),
        };

        let result = fetcher(3)
            .fetch(&target, &NoopReporter, &AtomicBool::new(false))
            .await;
        assert!(matches!(result, Err(FetchError::Io { .. })), "got {result:?}");
    }

    #[tokio::test]
    async fn test_fetch_interrupted_before_start_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "never.txt");

        let outcome = fetcher(3)
            .fetch(&target, &NoopReporter, &AtomicBool::new(true))
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Interrupted { attempts: 0 }));
        assert!(!target.save_path.exists());
    }

    #[tokio::test]
    async fn test_fetch_interrupted_during_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let target = target(&server, &dir, "slow.txt");
        let fetcher = RetryingFetcher::new(
            HttpClient::new("test-agent").unwrap(),
            RetryPolicy::new(3, Duration::from_secs(30), Duration::ZERO),
        );
        let interrupted = std::sync::Arc::new(AtomicBool::new(false));
        let setter = std::sync::Arc::clone(&interrupted);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let outcome = fetcher
            .fetch(&target, &NoopReporter, &interrupted)
            .await
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Interrupted { attempts: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
