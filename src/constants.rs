//! Constants for the download engine (timeouts, chunk bounds, defaults).

use std::num::NonZeroUsize;
use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Fallback destination filename when neither response headers nor the URL
/// path yield a usable name.
pub const DEFAULT_FILE_NAME: &str = "parget.output";

/// Lower bound for auto-selected chunk sizes (64 KiB).
pub const MIN_AUTO_CHUNK_SIZE: u64 = 64 * 1024;

/// Upper bound for auto-selected chunk sizes (64 MiB).
pub const MAX_AUTO_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Sliding window used for the instantaneous speed estimate.
pub const SPEED_WINDOW: Duration = Duration::from_secs(1);

/// Default interval between progress callback invocations.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of concurrent range fetches: the available hardware
/// parallelism, or 4 when it cannot be queried.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(4, NonZeroUsize::get)
}
