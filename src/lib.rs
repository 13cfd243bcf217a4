//! Concurrent HTTP file downloader.
//!
//! Given a resource URL and a destination path, this library fetches the
//! resource and writes it to disk, accelerating the transfer with
//! parallel byte-range requests when the origin supports them and
//! falling back to a single sequential stream when it does not.
//!
//! # Architecture
//!
//! - [`HttpClient`] - HTTP transport adapter with cancellation support
//! - [`probe`] - preflight HEAD request discovering size, range-capability,
//!   and filename hint
//! - [`plan`] - partitioning of `[0, size)` into ranged fetch units
//! - [`Download`] - coordinator owning the lifecycle, the bounded worker
//!   pool, and offset-addressed writes into the destination file
//! - [`Progress`] - immutable snapshots of live transfer statistics
//!
//! # Example
//!
//! ```no_run
//! use parget::Download;
//!
//! # async fn example() -> Result<(), parget::DownloadError> {
//! let download = Download::new("https://example.com/archive.zip")
//!     .dest("./archive.zip")
//!     .concurrency(8);
//! download.init().await?;
//! println!("{} bytes, rangeable: {}", download.total_size(), download.is_rangeable());
//! download.start().await?;
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod chunk;
mod client;
mod constants;
mod download;
mod error;
mod filename;
mod probe;
mod progress;
mod writer;

pub use chunk::{Chunk, plan};
pub use client::HttpClient;
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_FILE_NAME, DEFAULT_PROGRESS_INTERVAL, MAX_AUTO_CHUNK_SIZE,
    MIN_AUTO_CHUNK_SIZE, READ_TIMEOUT_SECS, SPEED_WINDOW, default_concurrency,
};
pub use download::{Download, State, fetch};
pub use error::DownloadError;
pub use probe::{Info, probe};
pub use progress::Progress;

// Re-exported so callers can construct cancellation handles without
// depending on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
