//! HTTP transport adapter for the download engine.
//!
//! This module provides the `HttpClient` struct which issues probe and
//! ranged requests with proper timeout configuration, forwards
//! caller-supplied headers, and races every request against a
//! cancellation token.

use std::time::Duration;

use reqwest::header::RANGE;
use reqwest::{Client, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::error::DownloadError;

/// HTTP client used for probing and fetching resources.
///
/// This client is designed to be created once and shared across a download,
/// taking advantage of connection pooling. Response status interpretation
/// belongs to the callers (probe, workers); the client only surfaces raw
/// responses and maps transport-level failures.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Issues a HEAD request with the caller's headers.
    pub(crate) async fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        self.send(self.client.head(url), url, headers, None, cancel)
            .await
    }

    /// Issues a GET request with the caller's headers and an optional
    /// `Range` header value.
    pub(crate) async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        range: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        self.send(self.client.get(url), url, headers, range, cancel)
            .await
    }

    /// Applies headers, then races the request against the cancellation
    /// token. A pre-cancelled token short-circuits without any I/O.
    async fn send(
        &self,
        mut request: RequestBuilder,
        url: &str,
        headers: &[(String, String)],
        range: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Response, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(range) = range {
            debug!(url = %url, range = %range, "sending ranged request");
            request = request.header(RANGE, range);
        }

        tokio::select! {
            () = cancel.cancelled() => Err(DownloadError::Cancelled),
            response = request.send() => {
                response.map_err(|e| DownloadError::network(url, e))
            }
        }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Identity User-Agent sent on every request.
fn default_user_agent() -> String {
    format!("parget/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_user_agent_carries_version() {
        let ua = default_user_agent();
        assert!(ua.starts_with("parget/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_get_forwards_caller_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/with-header"))
            .and(header("x-test-header", "foobar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/with-header", mock_server.uri());
        let headers = vec![("x-test-header".to_string(), "foobar".to_string())];

        let response = client
            .get(&url, &headers, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn test_get_applies_range_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ranged"))
            .and(header("Range", "bytes=0-4"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"hello"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpClient::new();
        let url = format!("{}/ranged", mock_server.uri());

        let response = client
            .get(&url, &[], Some("bytes=0-4"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 206);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_short_circuits_without_io() {
        let mock_server = MockServer::start().await;

        // The request must never reach the server.
        Mock::given(method("GET"))
            .and(path("/never"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = HttpClient::new();
        let url = format!("{}/never", mock_server.uri());

        let result = client.get(&url, &[], None, &cancel).await;
        assert!(matches!(result, Err(DownloadError::Cancelled)));
    }

    #[test]
    fn test_send_failure_maps_to_network_error() {
        // Port 1 is never listening; the connection is refused.
        let client = HttpClient::new_with_timeouts(1, 1);
        let result = tokio_test::block_on(client.get(
            "http://127.0.0.1:1/nothing",
            &[],
            None,
            &CancellationToken::new(),
        ));
        assert!(matches!(result, Err(DownloadError::Network { .. })));
    }
}
