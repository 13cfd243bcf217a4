//! Error types for the download engine.
//!
//! This module defines structured errors for every download operation,
//! providing context-rich error messages for debugging and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing or downloading a resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The probe could not establish a usable response: transport-level
    /// failure (DNS, connection, TLS) or an error status other than
    /// 405 Method Not Allowed.
    #[error("resource unreachable: {url}")]
    Unreachable {
        /// The URL that could not be probed.
        url: String,
        /// The HTTP status code, when the server answered at all.
        status: Option<u16>,
        /// The underlying transport error, when the request never completed.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Network-level error while sending a request or streaming a body.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The server advertised range support but answered a ranged request
    /// with a success status other than 206 Partial Content.
    #[error("server ignored range request for {url}: expected 206, got {status}")]
    RangeNotHonored {
        /// The URL of the ranged request.
        url: String,
        /// The status code the server returned instead.
        status: u16,
    },

    /// The destination path cannot be opened, created, or truncated.
    #[error("destination {path} is not writable: {source}")]
    Destination {
        /// The destination path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// File system error while writing downloaded bytes.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The cancellation signal fired before or during the operation.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Creates an unreachable error from an error status code.
    pub fn unreachable_status(url: impl Into<String>, status: u16) -> Self {
        Self::Unreachable {
            url: url.into(),
            status: Some(status),
            source: None,
        }
    }

    /// Creates an unreachable error from a transport failure.
    pub fn unreachable(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Unreachable {
            url: url.into(),
            status: None,
            source: Some(source),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a range-not-honored error.
    pub fn range_not_honored(url: impl Into<String>, status: u16) -> Self {
        Self::RangeNotHonored {
            url: url.into(),
            status,
        }
    }

    /// Creates a destination error.
    pub fn destination(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Destination {
            path: path.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or
// `From<std::io::Error>` because the variants require context (url, path)
// that the source errors don't carry. The helper constructors are the
// pattern here.
