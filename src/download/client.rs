//! HTTP client wrapper for fetching files.
//!
//! This module provides the `HttpClient` struct which owns the static header
//! set (a single User-Agent) and the connect/read timeouts. It is cheap to
//! clone and intended to be built once per run so connections are pooled.

use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT, READ_TIMEOUT_SECS};
use super::error::FetchError;

/// HTTP client for streaming GET requests.
///
/// # Example
///
/// ```no_run
/// use exporter_core::download::HttpClient;
///
/// # fn example() -> Result<(), reqwest::Error> {
/// let client = HttpClient::new("Mozilla/5.0 (X11; Linux x86_64)")?;
/// assert_eq!(client.user_agent(), "Mozilla/5.0 (X11; Linux x86_64)");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Creates a client sending `user_agent` with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 30 seconds between body reads
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns the builder error when `user_agent` is not a valid header value
    /// or the TLS backend cannot be initialised.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeouts(user_agent, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with the default browser-like User-Agent.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::new`].
    pub fn with_default_user_agent() -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_USER_AGENT)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::new`].
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        user_agent: &str,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent)
            .build()?;
        debug!("HTTP client built");
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// The User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sends a GET request and returns the response with its body unread.
    ///
    /// Any HTTP status is returned as `Ok`; status policy belongs to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`] when the
    /// request cannot be sent or the response headers cannot be read.
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))
    }
}
