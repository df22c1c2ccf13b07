//! Frame and source description types
//!
//! [`VideoFrame`] is the unit flowing through the adapter. Its payload is
//! opaque: the adapter never looks at pixels, only at the two timestamps it
//! advances when a frame is repeated.

use std::sync::Arc;
use std::time::Duration;

/// A captured video frame
///
/// Cloning is cheap; the payload is reference counted and shared between the
/// original frame and all of its repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Opaque frame payload
    pub data: Arc<[u8]>,

    /// Capture-relative timestamp in microseconds, 0 if unset
    pub timestamp_us: i64,

    /// Wall-clock NTP time in milliseconds, 0 if unset
    pub ntp_time_ms: i64,

    /// Set on frames produced by repeating an earlier frame
    ///
    /// A repeat carries no new content; encoders can treat it as an empty
    /// update.
    pub repeat: bool,
}

impl VideoFrame {
    /// Create a frame without timestamps
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            timestamp_us: 0,
            ntp_time_ms: 0,
            repeat: false,
        }
    }

    /// Set the capture-relative and NTP timestamps
    #[must_use]
    pub fn with_timestamps(mut self, timestamp_us: i64, ntp_time_ms: i64) -> Self {
        self.timestamp_us = timestamp_us;
        self.ntp_time_ms = ntp_time_ms;
        self
    }

    /// Copy of this frame marked as a repeat, with both timestamps advanced
    /// by `elapsed` from the given origin values
    ///
    /// Unset (zero) origin timestamps stay unset.
    pub(crate) fn repeated_from(
        &self,
        origin_timestamp_us: i64,
        origin_ntp_time_ms: i64,
        elapsed: Duration,
    ) -> Self {
        let mut frame = self.clone();
        frame.repeat = true;
        if origin_timestamp_us > 0 {
            frame.timestamp_us = origin_timestamp_us + elapsed.as_micros() as i64;
        }
        if origin_ntp_time_ms != 0 {
            frame.ntp_time_ms = origin_ntp_time_ms + elapsed.as_millis() as i64;
        }
        frame
    }
}

/// Frame rate constraints announced by the video source
///
/// `None` means the source did not specify the bound.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoSourceConstraints {
    /// Minimum frame rate the source guarantees
    pub min_fps: Option<f64>,

    /// Maximum frame rate the source will produce
    pub max_fps: Option<f64>,
}

impl VideoSourceConstraints {
    /// Create constraints with both bounds set
    pub fn new(min_fps: f64, max_fps: f64) -> Self {
        Self {
            min_fps: Some(min_fps),
            max_fps: Some(max_fps),
        }
    }

    /// Maximum frame rate if these constraints allow zero-hertz operation
    ///
    /// Zero-hertz mode needs a finite positive maximum and no minimum rate, i.e. a
    /// source that may legitimately stop producing frames.
    pub(crate) fn zero_hertz_max_fps(&self) -> Option<f64> {
        let max_fps = self.max_fps.filter(|fps| fps.is_finite() && *fps > 0.0)?;
        match self.min_fps {
            Some(min) if min != 0.0 => None,
            _ => Some(max_fps),
        }
    }
}

/// Zero-hertz mode parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZeroHertzParams {
    /// Number of spatial/simulcast layers whose quality convergence is
    /// tracked
    pub num_layers: usize,
}

impl ZeroHertzParams {
    /// Create parameters for the given layer count
    pub fn new(num_layers: usize) -> Self {
        Self { num_layers }
    }
}

/// Shortest frame period the scheduler will follow; faster rates are clamped
const MIN_FRAME_PERIOD: Duration = Duration::from_micros(1);

/// Duration of one frame at the given rate, rounded to whole nanoseconds
pub(crate) fn frame_period(fps: f64) -> Duration {
    Duration::from_nanos((1_000_000_000.0 / fps).round() as u64).max(MIN_FRAME_PERIOD)
}
