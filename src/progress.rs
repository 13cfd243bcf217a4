//! Live transfer statistics.
//!
//! Workers touch a single atomic counter on the hot path; everything
//! derived (instantaneous rate, average rate, elapsed time) is computed
//! on demand from that counter plus a small ring of recent samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use crate::constants::SPEED_WINDOW;

/// Upper bound on retained rate samples.
const MAX_WINDOW_SAMPLES: usize = 32;

/// Immutable snapshot of transfer statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Bytes delivered so far.
    pub size_so_far: u64,
    /// Resource size; 0 when unknown.
    pub total_size: u64,
    /// Rate over the most recent window, in bytes per second.
    pub speed_bps: u64,
    /// Bytes since start divided by elapsed time.
    pub avg_speed_bps: u64,
    /// Wall-clock time since the transfer started.
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    total: u64,
}

/// Shared byte counter and rate window.
///
/// The counter is monotonically non-decreasing; workers only ever add.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    downloaded: AtomicU64,
    started: OnceLock<Instant>,
    window: Mutex<VecDeque<Sample>>,
}

impl ProgressTracker {
    /// Stamps the transfer start time. Later calls are no-ops.
    pub fn mark_started(&self) {
        let _ = self.started.set(Instant::now());
    }

    pub fn add(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn size(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.get().map_or(Duration::ZERO, Instant::elapsed)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn avg_speed(&self) -> u64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        (self.size() as f64 / secs) as u64
    }

    /// Rate over the recent sample window. Each call records a sample,
    /// so the estimate sharpens while a reporter is ticking.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn speed(&self) -> u64 {
        let now = Instant::now();
        let total = self.size();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);

        window.push_back(Sample { at: now, total });
        while window.len() > MAX_WINDOW_SAMPLES
            || window
                .front()
                .is_some_and(|s| now.duration_since(s.at) > SPEED_WINDOW)
        {
            window.pop_front();
        }

        let Some(front) = window.front().copied() else {
            return 0;
        };
        let span = now.duration_since(front.at).as_secs_f64();
        if span <= 0.0 {
            return 0;
        }
        ((total - front.total) as f64 / span) as u64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_monotonic() {
        let tracker = ProgressTracker::default();
        assert_eq!(tracker.size(), 0);
        tracker.add(10);
        tracker.add(5);
        assert_eq!(tracker.size(), 15);
    }

    #[test]
    fn test_avg_speed_zero_before_start() {
        let tracker = ProgressTracker::default();
        tracker.add(1024);
        assert_eq!(tracker.avg_speed(), 0);
    }

    #[test]
    fn test_avg_speed_after_elapsed_time() {
        let tracker = ProgressTracker::default();
        tracker.mark_started();
        tracker.add(100_000);
        std::thread::sleep(Duration::from_millis(20));
        assert!(tracker.avg_speed() > 0);
    }

    #[test]
    fn test_speed_is_zero_with_single_sample() {
        let tracker = ProgressTracker::default();
        tracker.add(1024);
        assert_eq!(tracker.speed(), 0);
    }

    #[test]
    fn test_speed_reflects_recent_delta() {
        let tracker = ProgressTracker::default();
        tracker.mark_started();
        tracker.speed();
        tracker.add(100_000);
        std::thread::sleep(Duration::from_millis(20));
        assert!(tracker.speed() > 0);
    }

    #[test]
    fn test_speed_window_is_bounded() {
        let tracker = ProgressTracker::default();
        for _ in 0..(MAX_WINDOW_SAMPLES * 4) {
            tracker.add(1);
            tracker.speed();
        }
        let window = tracker.window.lock().unwrap();
        assert!(window.len() <= MAX_WINDOW_SAMPLES);
    }

    #[test]
    fn test_mark_started_is_idempotent() {
        let tracker = ProgressTracker::default();
        tracker.mark_started();
        let first = *tracker.started.get().unwrap();
        tracker.mark_started();
        assert_eq!(first, *tracker.started.get().unwrap());
    }
}
