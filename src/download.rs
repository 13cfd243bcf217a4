//! Download coordinator: lifecycle, worker pool, and progress reporting.
//!
//! A [`Download`] owns the whole transfer: it probes the resource,
//! resolves the destination path, partitions the resource into chunks,
//! and drives a bounded pool of workers that fetch ranges concurrently
//! into a pre-sized file. Servers without range support (or with unknown
//! size) are served by a single sequential streaming GET.
//!
//! # Concurrency Model
//!
//! - Each worker runs in its own Tokio task and pops chunks from a
//!   shared FIFO queue until it drains
//! - Workers write through independent file handles at absolute offsets,
//!   so completion order is irrelevant
//! - The first failure cancels a child token shared by all workers;
//!   siblings abort promptly and the first observed error is returned
//! - Progress updates are a single atomic add per body buffer
//!
//! # Example
//!
//! ```no_run
//! use parget::Download;
//!
//! # async fn example() -> Result<(), parget::DownloadError> {
//! let download = Download::new("https://example.com/archive.zip").dest("./archive.zip");
//! download.init().await?;
//! download.start().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::chunk::{Chunk, plan};
use crate::client::HttpClient;
use crate::constants::default_concurrency;
use crate::error::DownloadError;
use crate::filename::resolve_dest;
use crate::probe::{Info, probe};
use crate::progress::{Progress, ProgressTracker};
use crate::writer::{DestFile, ensure_writable};

/// Lifecycle state of a [`Download`].
///
/// Transitions are one-way: `Idle → Initialised → Running → terminal`.
/// Repeated `init()` is permitted and re-probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Constructed, not yet probed.
    Idle = 0,
    /// Probe succeeded; destination resolved.
    Initialised = 1,
    /// Transfer in flight.
    Running = 2,
    /// Transfer completed successfully.
    Done = 3,
    /// Transfer failed.
    Failed = 4,
    /// Cancellation signal fired.
    Cancelled = 5,
}

impl State {
    /// Whether the download has reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Initialised,
            2 => Self::Running,
            3 => Self::Done,
            4 => Self::Failed,
            5 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

/// A single download work item: configuration, lifecycle, and live
/// statistics.
///
/// Construct with [`Download::new`] and the chained setters, then call
/// [`init`](Self::init) and [`start`](Self::start). All accessors take
/// `&self`, so a reporter can observe a running transfer from another
/// task (share the value behind an `Arc` or join the two futures).
#[derive(Debug)]
pub struct Download {
    url: String,
    dest: Option<PathBuf>,
    dir: Option<PathBuf>,
    chunk_size: u64,
    concurrency: usize,
    headers: Vec<(String, String)>,
    cancel: CancellationToken,
    client: HttpClient,
    info: RwLock<Option<Info>>,
    resolved: RwLock<Option<PathBuf>>,
    state: AtomicU8,
    tracker: Arc<ProgressTracker>,
}

impl Download {
    /// Creates an idle download for `url` with default configuration:
    /// auto-selected chunk size, hardware-parallelism concurrency, no
    /// extra headers, and a fresh cancellation token.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dest: None,
            dir: None,
            chunk_size: 0,
            concurrency: default_concurrency(),
            headers: Vec::new(),
            cancel: CancellationToken::new(),
            client: HttpClient::new(),
            info: RwLock::new(None),
            resolved: RwLock::new(None),
            state: AtomicU8::new(State::Idle as u8),
            tracker: Arc::new(ProgressTracker::default()),
        }
    }

    /// Sets the destination file path. When it names an existing
    /// directory, the probed filename is appended.
    #[must_use]
    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Sets the destination directory used when no `dest` is given.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Sets the chunk size in bytes; 0 auto-selects.
    #[must_use]
    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Bounds the number of simultaneous range fetches.
    #[must_use]
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers;
        self
    }

    /// Adds a header forwarded on every request (probe and fetches).
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Installs a caller-owned cancellation token.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the HTTP client (custom timeouts, shared pools).
    #[must_use]
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    /// Probes the resource and resolves the destination path.
    ///
    /// May be called again to re-probe. The destination is opened to
    /// verify writability (created when missing, content untouched).
    ///
    /// # Errors
    ///
    /// [`DownloadError::Cancelled`] on a pre-cancelled token,
    /// [`DownloadError::InvalidUrl`] for malformed or non-HTTP URLs,
    /// [`DownloadError::Unreachable`] when the probe fails, and
    /// [`DownloadError::Destination`] when the path cannot be created.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn init(&self) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        validate_url(&self.url)?;

        let info = probe(&self.client, &self.url, &self.headers, &self.cancel).await?;
        let path = resolve_dest(
            self.dest.as_deref(),
            self.dir.as_deref(),
            info.name.as_deref(),
        );
        ensure_writable(&path).await?;

        debug!(path = %path.display(), size = info.size, rangeable = info.rangeable, "initialised");
        self.store_info(info, path);
        if !self.state().is_terminal() {
            self.set_state(State::Initialised);
        }
        Ok(())
    }

    /// Downloads the resource to the destination, blocking until every
    /// chunk completes or the first failure.
    ///
    /// Runs [`init`](Self::init) first when the download is still idle.
    /// On success the destination file holds exactly the resource bytes.
    /// On failure the partial file is left on disk untouched; cleanup is
    /// the caller's responsibility.
    ///
    /// # Errors
    ///
    /// The first error observed by any worker, or the init errors listed
    /// on [`init`](Self::init).
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn start(&self) -> Result<(), DownloadError> {
        let outcome = self.run().await;
        match &outcome {
            Ok(()) => self.set_state(State::Done),
            Err(DownloadError::Cancelled) => self.set_state(State::Cancelled),
            Err(_) => self.set_state(State::Failed),
        }
        outcome
    }

    async fn run(&self) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let (info, path) = self.ensure_init().await?;

        self.set_state(State::Running);
        self.tracker.mark_started();

        if info.rangeable && info.size > 0 {
            self.run_chunked(&info, &path).await?;
        } else {
            self.run_single_stream(&path).await?;
        }

        info!(
            path = %path.display(),
            bytes = self.tracker.size(),
            "download complete"
        );
        Ok(())
    }

    /// Concurrent ranged path: pre-size the file, partition, dispatch
    /// workers, join, surface the first observed error.
    async fn run_chunked(&self, info: &Info, path: &Path) -> Result<(), DownloadError> {
        let dest = DestFile::create(path, info.size).await?;
        let chunks = plan(info.size, true, self.chunk_size, self.concurrency);
        let workers = self.concurrency.max(1).min(chunks.len());
        debug!(chunks = chunks.len(), workers, "dispatching worker pool");

        let queue = Arc::new(Mutex::new(VecDeque::from(chunks)));
        let abort = self.cancel.child_token();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = ChunkWorker {
                client: self.client.clone(),
                url: self.url.clone(),
                headers: self.headers.clone(),
                dest: dest.clone(),
                total_size: info.size,
                queue: Arc::clone(&queue),
                tracker: Arc::clone(&self.tracker),
                abort: abort.clone(),
            };
            handles.push(tokio::spawn(worker.run(worker_id)));
        }

        let mut first_error: Option<DownloadError> = None;
        let mut cancelled = false;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(DownloadError::Cancelled)) => cancelled = true,
                Ok(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(join_error) => {
                    warn!(error = %join_error, "chunk worker panicked");
                    abort.cancel();
                    if first_error.is_none() {
                        first_error = Some(DownloadError::io(
                            path,
                            std::io::Error::other(join_error.to_string()),
                        ));
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        if cancelled || self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        Ok(())
    }

    /// Sequential fallback for non-rangeable resources or unknown sizes:
    /// one GET, streamed to the destination in arrival order.
    async fn run_single_stream(&self, path: &Path) -> Result<(), DownloadError> {
        let response = self
            .client
            .get(&self.url, &self.headers, None, &self.cancel)
            .await?;
        let response = response
            .error_for_status()
            .map_err(|e| DownloadError::network(&self.url, e))?;

        let dest = DestFile::create(path, 0).await?;
        let mut sink = dest.writer_at(0).await?;
        let mut stream = response.bytes_stream();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => match next {
                    Some(Ok(bytes)) => {
                        sink.write_all(&bytes)
                            .await
                            .map_err(|e| DownloadError::io(path, e))?;
                        self.tracker.add(bytes.len() as u64);
                    }
                    Some(Err(source)) => return Err(DownloadError::network(&self.url, source)),
                    None => break,
                }
            }
        }

        sink.flush().await.map_err(|e| DownloadError::io(path, e))?;
        Ok(())
    }

    /// Probes the resource and resolves the destination without starting
    /// the transfer. When the resource cannot be served by the ranged
    /// path (unknown size or no range support), the body is fetched
    /// inline in the same call.
    ///
    /// # Errors
    ///
    /// The same errors as [`init`](Self::init), plus any transfer error
    /// when the inline download runs.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn get_info_or_download(&self) -> Result<Info, DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        validate_url(&self.url)?;

        let info = probe(&self.client, &self.url, &self.headers, &self.cancel).await?;
        let path = resolve_dest(
            self.dest.as_deref(),
            self.dir.as_deref(),
            info.name.as_deref(),
        );
        self.store_info(info.clone(), path.clone());
        self.set_state(State::Initialised);

        if info.size == 0 || !info.rangeable {
            self.set_state(State::Running);
            self.tracker.mark_started();
            match self.run_single_stream(&path).await {
                Ok(()) => self.set_state(State::Done),
                Err(DownloadError::Cancelled) => {
                    self.set_state(State::Cancelled);
                    return Err(DownloadError::Cancelled);
                }
                Err(error) => {
                    self.set_state(State::Failed);
                    return Err(error);
                }
            }
        }

        Ok(info)
    }

    /// Resource size reported by the probe; 0 when unknown.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.read_info().map_or(0, |info| info.size)
    }

    /// Whether the origin honors ranged requests.
    #[must_use]
    pub fn is_rangeable(&self) -> bool {
        self.read_info().is_some_and(|info| info.rangeable)
    }

    /// The resolved destination path; `None` before a successful init.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bytes delivered so far.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.tracker.size()
    }

    /// Rate over the recent window, in bytes per second.
    #[must_use]
    pub fn speed(&self) -> u64 {
        self.tracker.speed()
    }

    /// Average rate since the transfer started, in bytes per second.
    #[must_use]
    pub fn avg_speed(&self) -> u64 {
        self.tracker.avg_speed()
    }

    /// Wall-clock time since the transfer started.
    #[must_use]
    pub fn total_cost(&self) -> Duration {
        self.tracker.elapsed()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Self-contained snapshot of the live statistics.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            size_so_far: self.tracker.size(),
            total_size: self.total_size(),
            speed_bps: self.tracker.speed(),
            avg_speed_bps: self.tracker.avg_speed(),
            elapsed: self.tracker.elapsed(),
        }
    }

    /// Invokes `callback` with a progress snapshot at every tick of
    /// `interval` until the download reaches a terminal state or the
    /// cancellation token fires.
    ///
    /// The callback runs on the reporter task only and never mutates
    /// download state. Run it concurrently with [`start`](Self::start):
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use parget::Download;
    ///
    /// # async fn example() -> Result<(), parget::DownloadError> {
    /// let download = Download::new("https://example.com/archive.zip").dest("./archive.zip");
    /// download.init().await?;
    /// let (result, ()) = tokio::join!(
    ///     download.start(),
    ///     download.run_progress(Duration::from_millis(100), |p| {
    ///         println!("{} / {} bytes", p.size_so_far, p.total_size);
    ///     }),
    /// );
    /// result
    /// # }
    /// ```
    pub async fn run_progress<F>(&self, interval: Duration, mut callback: F)
    where
        F: FnMut(Progress),
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    callback(self.progress());
                    if self.state().is_terminal() {
                        break;
                    }
                }
            }
        }
    }

    async fn ensure_init(&self) -> Result<(Info, PathBuf), DownloadError> {
        if let (Some(info), Some(path)) = (self.read_info(), self.path()) {
            return Ok((info, path));
        }
        self.init().await?;
        match (self.read_info(), self.path()) {
            (Some(info), Some(path)) => Ok((info, path)),
            // init() stores both on success; reaching this means the URL
            // never validated.
            _ => Err(DownloadError::invalid_url(&self.url)),
        }
    }

    fn read_info(&self) -> Option<Info> {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_info(&self, info: Info, path: PathBuf) {
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = Some(info);
        *self
            .resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(path);
    }

    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// One member of the bounded worker pool.
struct ChunkWorker {
    client: HttpClient,
    url: String,
    headers: Vec<(String, String)>,
    dest: DestFile,
    total_size: u64,
    queue: Arc<Mutex<VecDeque<Chunk>>>,
    tracker: Arc<ProgressTracker>,
    abort: CancellationToken,
}

impl ChunkWorker {
    /// Pops chunks until the queue drains or the abort token fires.
    /// The first failure cancels the shared token so siblings stop
    /// dequeuing promptly.
    async fn run(self, worker_id: usize) -> Result<(), DownloadError> {
        loop {
            if self.abort.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let Some(chunk) = self.next_chunk() else {
                debug!(worker_id, "queue drained, worker exiting");
                return Ok(());
            };
            debug!(
                worker_id,
                chunk = chunk.index,
                start = chunk.start,
                end = chunk.end,
                "fetching chunk"
            );
            if let Err(error) = self.fetch_chunk(&chunk).await {
                warn!(worker_id, chunk = chunk.index, error = %error, "chunk fetch failed");
                self.abort.cancel();
                return Err(error);
            }
        }
    }

    fn next_chunk(&self) -> Option<Chunk> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    async fn fetch_chunk(&self, chunk: &Chunk) -> Result<(), DownloadError> {
        let range = format!("bytes={}-{}", chunk.start, chunk.end);
        let response = self
            .client
            .get(&self.url, &self.headers, Some(&range), &self.abort)
            .await?;

        let status = response.status();
        if status.as_u16() != 206 {
            // A one-byte resource collapses to the single range 0-0;
            // some servers answer it with a plain 200.
            let degenerate = chunk.start == 0 && chunk.end == 0 && self.total_size == 1;
            if !(status.as_u16() == 200 && degenerate) {
                return Err(match response.error_for_status() {
                    Ok(_) => DownloadError::range_not_honored(&self.url, status.as_u16()),
                    Err(source) => DownloadError::network(&self.url, source),
                });
            }
        }

        let mut sink = self.dest.writer_at(chunk.start).await?;
        let mut stream = response.bytes_stream();
        loop {
            tokio::select! {
                () = self.abort.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => match next {
                    Some(Ok(bytes)) => {
                        sink.write_all(&bytes)
                            .await
                            .map_err(|e| DownloadError::io(self.dest.path(), e))?;
                        self.tracker.add(bytes.len() as u64);
                    }
                    Some(Err(source)) => return Err(DownloadError::network(&self.url, source)),
                    None => break,
                }
            }
        }
        sink.flush()
            .await
            .map_err(|e| DownloadError::io(self.dest.path(), e))
    }
}

/// One-call convenience: init plus start, returning the resolved path.
///
/// # Errors
///
/// Any error from [`Download::init`] or [`Download::start`].
pub async fn fetch(
    url: &str,
    dest: impl Into<PathBuf>,
    cancel: CancellationToken,
) -> Result<PathBuf, DownloadError> {
    let download = Download::new(url).dest(dest).cancel_token(cancel);
    download.init().await?;
    download.start().await?;
    Ok(download.path().unwrap_or_default())
}

fn validate_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw).map_err(|_| DownloadError::invalid_url(raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::invalid_url(raw));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("http://example.com/a").is_ok());
        assert!(validate_url("https://example.com/a").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_unsupported_scheme() {
        assert!(matches!(
            validate_url("invalid://example.com/a"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("ftp://example.com/a"),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_url_rejects_malformed() {
        assert!(matches!(
            validate_url("not a url"),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_new_download_starts_idle() {
        let download = Download::new("https://example.com/file.bin");
        assert_eq!(download.state(), State::Idle);
        assert_eq!(download.total_size(), 0);
        assert!(!download.is_rangeable());
        assert!(download.path().is_none());
        assert_eq!(download.size(), 0);
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            State::Idle,
            State::Initialised,
            State::Running,
            State::Done,
            State::Failed,
            State::Cancelled,
        ] {
            assert_eq!(State::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(State::Done.is_terminal());
        assert!(State::Failed.is_terminal());
        assert!(State::Cancelled.is_terminal());
        assert!(!State::Idle.is_terminal());
        assert!(!State::Initialised.is_terminal());
        assert!(!State::Running.is_terminal());
    }

    #[test]
    fn test_builder_applies_configuration() {
        let cancel = CancellationToken::new();
        let download = Download::new("https://example.com/file.bin")
            .dest("/tmp/file.bin")
            .dir("/tmp")
            .chunk_size(4096)
            .concurrency(3)
            .header("x-test-header", "foobar")
            .cancel_token(cancel.clone());

        assert_eq!(download.dest.as_deref(), Some(Path::new("/tmp/file.bin")));
        assert_eq!(download.dir.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(download.chunk_size, 4096);
        assert_eq!(download.concurrency, 3);
        assert_eq!(
            download.headers,
            vec![("x-test-header".to_string(), "foobar".to_string())]
        );
        cancel.cancel();
        assert!(download.cancel.is_cancelled());
    }
}
