//! Input Frame Rate Estimation
//!
//! Sliding-window event rate estimation at millisecond resolution.
//!
//! [`RateStatistics`] counts events in a window of recent milliseconds and
//! reports them scaled to a per-second rate. While the first window is still
//! filling up, the rate is computed over the time actually covered by
//! samples, so a stream does not read as artificially slow during its first
//! second.
//!
//! # Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use lamco_frame_cadence::rate::FrameRateTracker;
//!
//! let mut tracker = FrameRateTracker::new(Duration::from_secs(1));
//! let start = Instant::now();
//!
//! for i in 0..100 {
//!     tracker.record_frame(start + Duration::from_millis(i * 10));
//! }
//!
//! // 100 frames over 991ms
//! assert_eq!(tracker.frame_rate(), Some(101));
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Events recorded within a single millisecond
#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Milliseconds since the tracker epoch
    timestamp_ms: i64,

    /// Sum of counts recorded in this millisecond
    sum: u64,

    /// Number of `update` calls in this millisecond
    samples: usize,
}

/// Sliding-window rate estimator
///
/// The window covers the most recent `window` milliseconds, inclusive of the
/// current one. Rates are `count * 1000 / active_window_ms`, rounded to the
/// nearest integer.
#[derive(Debug, Clone)]
pub struct RateStatistics {
    buckets: VecDeque<Bucket>,
    window_ms: i64,
    scale: f64,
    accumulated: u64,
    num_samples: usize,
    first_timestamp_ms: Option<i64>,
    epoch: Option<Instant>,
}

impl RateStatistics {
    /// Create an estimator reporting events per second over `window`
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: VecDeque::new(),
            window_ms: window.as_millis() as i64,
            scale: 1000.0,
            accumulated: 0,
            num_samples: 0,
            first_timestamp_ms: None,
            epoch: None,
        }
    }

    /// Record `count` events at `now`
    pub fn update(&mut self, count: u64, now: Instant) {
        let epoch = *self.epoch.get_or_insert(now);
        let now_ms = Self::millis_since(epoch, now);

        self.erase_old(now_ms);
        if self.first_timestamp_ms.is_none() || self.num_samples == 0 {
            self.first_timestamp_ms = Some(now_ms);
        }

        match self.buckets.back_mut() {
            Some(bucket) if bucket.timestamp_ms == now_ms => {
                bucket.sum += count;
                bucket.samples += 1;
            }
            _ => self.buckets.push_back(Bucket {
                timestamp_ms: now_ms,
                sum: count,
                samples: 1,
            }),
        }

        self.accumulated += count;
        self.num_samples += 1;
    }

    /// Current rate, or `None` when there is not enough data
    ///
    /// A rate needs more than one millisecond of coverage, and a single
    /// sample only counts once a full window has elapsed since it.
    pub fn rate(&mut self, now: Instant) -> Option<u64> {
        let epoch = self.epoch?;
        let now_ms = Self::millis_since(epoch, now);
        self.erase_old(now_ms);

        let active_window_ms = match self.first_timestamp_ms {
            Some(first) if first <= now_ms - self.window_ms => self.window_ms,
            Some(first) => now_ms - first + 1,
            None => 0,
        };

        if self.num_samples == 0
            || active_window_ms <= 1
            || (self.num_samples <= 1 && active_window_ms < self.window_ms)
        {
            return None;
        }

        let rate = self.accumulated as f64 * self.scale / active_window_ms as f64 + 0.5;
        Some(rate as u64)
    }

    /// Drop all samples
    pub fn reset(&mut self) {
        self.buckets.clear();
        self.accumulated = 0;
        self.num_samples = 0;
        self.first_timestamp_ms = None;
        self.epoch = None;
    }

    fn erase_old(&mut self, now_ms: i64) {
        let new_oldest_ms = now_ms - self.window_ms + 1;
        while let Some(bucket) = self.buckets.front() {
            if bucket.timestamp_ms >= new_oldest_ms {
                break;
            }
            self.accumulated -= bucket.sum;
            self.num_samples -= bucket.samples;
            self.buckets.pop_front();
        }
    }

    fn millis_since(epoch: Instant, now: Instant) -> i64 {
        now.saturating_duration_since(epoch).as_millis() as i64
    }
}

/// Input frame rate tracker
///
/// Records one event per frame and keeps the estimate computed at the most
/// recent frame, which is what the adapter reports between frames.
#[derive(Debug, Clone)]
pub struct FrameRateTracker {
    stats: RateStatistics,
    last_rate: Option<u32>,
}

impl FrameRateTracker {
    /// Create a tracker averaging over `window`
    pub fn new(window: Duration) -> Self {
        Self {
            stats: RateStatistics::new(window),
            last_rate: None,
        }
    }

    /// Record a frame arriving at `now` and refresh the estimate
    pub fn record_frame(&mut self, now: Instant) {
        self.stats.update(1, now);
        self.last_rate = self
            .stats
            .rate(now)
            .map(|rate| u32::try_from(rate).unwrap_or(u32::MAX));
    }

    /// Estimate as of the most recent frame
    pub fn frame_rate(&self) -> Option<u32> {
        self.last_rate
    }
}
