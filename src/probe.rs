//! Resource probing: size, range-capability, and filename hint.
//!
//! The probe issues a preflight HEAD request and classifies the outcome.
//! A missing `Content-Length` or a 405 Method Not Allowed are soft
//! conditions: the resource is reported as non-rangeable with unknown
//! size and the coordinator falls back to a single streaming GET. Any
//! other error status is a hard `Unreachable` failure.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::client::HttpClient;
use crate::error::DownloadError;
use crate::filename::{filename_from_url, parse_content_disposition};

/// Probe result describing a remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Resource size in bytes; 0 when unknown.
    pub size: u64,
    /// Whether the server honors `Range: bytes=a-b` requests.
    pub rangeable: bool,
    /// Filename hint from `Content-Disposition` or the URL path.
    pub name: Option<String>,
}

/// Probes `url` with a HEAD request, forwarding the caller's headers.
///
/// # Errors
///
/// Returns [`DownloadError::Unreachable`] when the request fails at the
/// transport level or the server answers with an error status other than
/// 405, and [`DownloadError::Cancelled`] when the token fires.
pub async fn probe(
    client: &HttpClient,
    url: &str,
    headers: &[(String, String)],
    cancel: &CancellationToken,
) -> Result<Info, DownloadError> {
    let response = match client.head(url, headers, cancel).await {
        Ok(response) => response,
        Err(DownloadError::Network { url, source }) => {
            return Err(DownloadError::unreachable(url, source));
        }
        Err(other) => return Err(other),
    };

    let status = response.status();
    let url_name = Url::parse(url).ok().as_ref().and_then(filename_from_url);

    if status == StatusCode::METHOD_NOT_ALLOWED {
        // HEAD unsupported: fall back to a single streaming GET later.
        debug!(url = %url, "HEAD not allowed, treating resource as non-rangeable");
        return Ok(Info {
            size: 0,
            rangeable: false,
            name: url_name,
        });
    }

    if !status.is_success() {
        return Err(DownloadError::unreachable_status(url, status.as_u16()));
    }

    let size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let accepts_ranges = response
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

    let name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_disposition)
        .or(url_name);

    let info = Info {
        size,
        // A resource of unknown size cannot be partitioned.
        rangeable: accepts_ranges && size > 0,
        name,
    };
    debug!(
        url = %url,
        size = info.size,
        rangeable = info.rangeable,
        name = info.name.as_deref().unwrap_or(""),
        "probe complete"
    );
    Ok(info)
}
