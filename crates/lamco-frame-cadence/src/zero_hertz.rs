//! Zero-Hertz Scheduler
//!
//! Screen content often stops changing, and a capture source that only
//! produces frames on change may go silent for minutes. Encoders still need
//! a steady trickle of frames to converge quality after a change and to
//! answer key frame requests. The scheduler bridges the two:
//!
//! ```text
//!   frame ──► queue ──(arrival + period)──► forward ──► repeat ──► repeat ...
//!                                                        │
//!                      short period until layers converge┘, then idle period
//! ```
//!
//! - Every incoming frame is forwarded one frame period after its arrival.
//! - Once the queue drains, the last frame is repeated: every (restricted)
//!   frame period while quality is still converging, every idle period once
//!   all enabled layers have converged.
//! - Repeats advance the frame timestamps by the time elapsed since the
//!   original delivery.
//! - With nothing to repeat, the [`RefreshFrameRequester`] asks the source
//!   for a frame.
//!
//! The scheduler is a plain state machine: callers pass the current time
//! into every operation, collect results from the output queue, and call
//! [`ZeroHertzScheduler::poll`] once [`ZeroHertzScheduler::next_deadline`]
//! has passed.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::cadence::CadenceOutput;
use crate::config::CadenceConfig;
use crate::frame::{frame_period, VideoFrame};
use crate::layers::LayerConvergenceTracker;
use crate::refresh::RefreshFrameRequester;
use crate::task::{earliest, TaskSlot};

/// Observable phase of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadencePhase {
    /// No frame has been received since zero-hertz mode was entered
    AwaitingFirstFrame,
    /// At least one frame is queued for forwarding
    ScheduledForward,
    /// The last frame is being repeated
    Repeating {
        /// Whether the idle repeat period is in use
        idle: bool,
    },
}

#[derive(Debug, Clone)]
struct QueuedFrame {
    frame: VideoFrame,
    arrival: Instant,
}

/// The frame being repeated and where its repeat sequence started
#[derive(Debug, Clone)]
struct RepeatState {
    frame: VideoFrame,
    origin: Instant,
    origin_timestamp_us: i64,
    origin_ntp_time_ms: i64,
    scheduled_at: Instant,
    idle: bool,
}

impl RepeatState {
    fn new(frame: VideoFrame, now: Instant, idle: bool) -> Self {
        Self {
            origin_timestamp_us: frame.timestamp_us,
            origin_ntp_time_ms: frame.ntp_time_ms,
            frame,
            origin: now,
            scheduled_at: now,
            idle,
        }
    }
}

#[derive(Debug, Clone)]
enum CadenceState {
    AwaitingFirstFrame,
    ScheduledForward,
    Repeating(RepeatState),
}

/// Zero-hertz frame scheduler
#[derive(Debug, Clone)]
pub struct ZeroHertzScheduler {
    max_fps: f64,
    frame_period: Duration,
    restricted_period: Option<Duration>,
    idle_repeat_period: Duration,
    layers: LayerConvergenceTracker,
    refresh: RefreshFrameRequester,
    queue: VecDeque<QueuedFrame>,
    state: CadenceState,
    cadence: TaskSlot,
}

impl ZeroHertzScheduler {
    /// Enter zero-hertz operation at `now`
    ///
    /// Starts in [`CadencePhase::AwaitingFirstFrame`] with the refresh
    /// requester armed, so a silent source is asked for its first frame.
    pub fn new(
        max_fps: f64,
        restriction_fps: Option<f64>,
        num_layers: usize,
        config: &CadenceConfig,
        now: Instant,
    ) -> Self {
        let period = frame_period(max_fps);
        let mut refresh = RefreshFrameRequester::new(period, config.refresh_grace_periods);
        refresh.start(now);

        let mut scheduler = Self {
            max_fps,
            frame_period: period,
            restricted_period: None,
            idle_repeat_period: config.idle_repeat_period,
            layers: LayerConvergenceTracker::new(num_layers),
            refresh,
            queue: VecDeque::new(),
            state: CadenceState::AwaitingFirstFrame,
            cadence: TaskSlot::default(),
        };
        scheduler.set_restriction(restriction_fps);
        scheduler
    }

    /// Queue a real frame that arrived at `arrival`
    pub fn on_frame(&mut self, frame: VideoFrame, arrival: Instant, now: Instant) {
        self.refresh.on_real_frame(arrival);
        self.layers.reset_convergence();

        if let CadenceState::Repeating(_) = self.state {
            trace!("New frame replaces repeated frame");
            self.cadence.cancel();
        }
        self.state = CadenceState::ScheduledForward;

        self.queue.push_back(QueuedFrame { frame, arrival });
        if !self.cadence.is_armed() {
            let deadline = self.forward_deadline(arrival, now);
            self.cadence.arm(deadline);
        }
    }

    /// A frame was discarded before reaching the adapter
    pub fn on_discarded_frame(&mut self, now: Instant) {
        self.refresh.on_discarded_frame(now);
    }

    /// A downstream encoder asked for a key frame
    pub fn on_key_frame_request(&mut self, now: Instant) {
        self.layers.reset_convergence();

        let short_period = self.short_repeat_period();
        let idle_period = self.idle_repeat_period;
        let frame_period = self.frame_period;

        match &mut self.state {
            CadenceState::AwaitingFirstFrame | CadenceState::ScheduledForward => {
                self.refresh.on_key_frame_request(now);
            }
            CadenceState::Repeating(repeat) if !repeat.idle => {
                debug!("Key frame request ignored, short repeat already scheduled");
            }
            CadenceState::Repeating(repeat) => {
                let next_idle_repeat = repeat.scheduled_at + idle_period;
                if next_idle_repeat.saturating_duration_since(now) <= frame_period {
                    debug!("Key frame request ignored, idle repeat due within a frame period");
                    return;
                }
                debug!("Key frame request switches to short repeats");
                repeat.idle = false;
                repeat.scheduled_at = now;
                self.cadence.arm(now + short_period);
            }
        }
    }

    /// Adopt a new maximum frame rate
    ///
    /// Pending forwards and repeats are rescheduled one new frame period from
    /// `now`; a repeat in progress is re-forwarded with its timestamps
    /// advanced.
    pub fn on_constraints_changed(&mut self, max_fps: f64, now: Instant) {
        let period = frame_period(max_fps);
        info!(
            "Zero-hertz max fps changed {} -> {} (period {:?})",
            self.max_fps, max_fps, period
        );
        self.max_fps = max_fps;
        self.frame_period = period;
        self.refresh.set_frame_period(period, now);

        match &mut self.state {
            CadenceState::AwaitingFirstFrame => {}
            CadenceState::ScheduledForward => self.cadence.arm(now + period),
            CadenceState::Repeating(repeat) => {
                repeat.idle = false;
                repeat.scheduled_at = now;
                self.cadence.arm(now + period);
            }
        }
    }

    /// Limit the repeat rate while unconverged; `None` or a non-positive
    /// rate lifts the limit
    ///
    /// Takes effect at the next scheduling decision.
    pub fn set_restriction(&mut self, max_fps: Option<f64>) {
        self.restricted_period = max_fps.filter(|fps| *fps > 0.0).map(frame_period);
    }

    /// Re-initialize layer tracking for `num_layers` layers
    pub fn reset_layers(&mut self, num_layers: usize) {
        self.layers = LayerConvergenceTracker::new(num_layers);
    }

    /// Enable or disable a layer
    pub fn set_layer_enabled(&mut self, index: usize, enabled: bool) {
        self.layers.set_layer_enabled(index, enabled);
    }

    /// Record quality convergence feedback for a layer
    pub fn set_layer_converged(&mut self, index: usize, converged: bool) {
        self.layers.set_layer_converged(index, converged);
    }

    /// Fire every task due at `now`, in deadline order
    pub fn poll(&mut self, now: Instant, out: &mut VecDeque<CadenceOutput>) {
        loop {
            let cadence = self.cadence.deadline();
            match earliest(cadence, self.refresh.deadline()) {
                Some(deadline) if deadline <= now => {
                    if cadence == Some(deadline) {
                        self.cadence.cancel();
                        self.run_cadence(now, out);
                    } else if self.refresh.poll(now) {
                        trace!("Requesting refresh frame");
                        out.push_back(CadenceOutput::RefreshFrameRequest);
                    }
                }
                _ => break,
            }
        }
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(self.cadence.deadline(), self.refresh.deadline())
    }

    /// Current phase
    pub fn phase(&self) -> CadencePhase {
        match &self.state {
            CadenceState::AwaitingFirstFrame => CadencePhase::AwaitingFirstFrame,
            CadenceState::ScheduledForward => CadencePhase::ScheduledForward,
            CadenceState::Repeating(repeat) => CadencePhase::Repeating { idle: repeat.idle },
        }
    }

    /// Maximum frame rate the cadence follows
    pub fn max_fps(&self) -> f64 {
        self.max_fps
    }

    /// Current frame period
    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Number of frames waiting to be forwarded
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// Layer convergence state
    pub fn layers(&self) -> &LayerConvergenceTracker {
        &self.layers
    }

    /// Whether a refresh frame request is scheduled
    pub fn refresh_pending(&self) -> bool {
        self.refresh.is_pending()
    }

    fn run_cadence(&mut self, now: Instant, out: &mut VecDeque<CadenceOutput>) {
        let frame = match std::mem::replace(&mut self.state, CadenceState::AwaitingFirstFrame) {
            CadenceState::AwaitingFirstFrame => return,
            CadenceState::ScheduledForward => {
                let Some(head) = self.queue.pop_front() else {
                    debug_assert!(false, "forward scheduled with an empty queue");
                    return;
                };

                if let Some(next_arrival) = self.queue.front().map(|next| next.arrival) {
                    let deadline = self.forward_deadline(next_arrival, now);
                    self.cadence.arm(deadline);
                    self.state = CadenceState::ScheduledForward;
                } else {
                    let idle = self.layers.is_settled();
                    let deadline = now + self.repeat_period(idle);
                    self.cadence.arm(deadline);
                    self.state =
                        CadenceState::Repeating(RepeatState::new(head.frame.clone(), now, idle));
                }

                trace!(
                    "Forwarding frame ts={}us, {:?} after arrival",
                    head.frame.timestamp_us,
                    now.saturating_duration_since(head.arrival)
                );
                head.frame
            }
            CadenceState::Repeating(mut repeat) => {
                let frame = repeat.frame.repeated_from(
                    repeat.origin_timestamp_us,
                    repeat.origin_ntp_time_ms,
                    now.saturating_duration_since(repeat.origin),
                );

                let idle = self.layers.is_settled();
                if idle && !repeat.idle {
                    debug!(
                        "All layers converged, repeating every {:?}",
                        self.idle_repeat_period
                    );
                }
                repeat.idle = idle;
                repeat.scheduled_at = now;
                let deadline = now + self.repeat_period(idle);
                self.cadence.arm(deadline);
                self.state = CadenceState::Repeating(repeat);

                trace!("Repeating frame ts={}us", frame.timestamp_us);
                frame
            }
        };

        out.push_back(CadenceOutput::Frame {
            delivery_time: now,
            queue_overload: false,
            frame,
        });
    }

    fn forward_deadline(&self, arrival: Instant, now: Instant) -> Instant {
        (arrival + self.frame_period).max(now)
    }

    fn short_repeat_period(&self) -> Duration {
        self.restricted_period
            .map_or(self.frame_period, |restricted| restricted.max(self.frame_period))
    }

    fn repeat_period(&self, idle: bool) -> Duration {
        if idle {
            self.idle_repeat_period
        } else {
            self.short_repeat_period()
        }
    }
}
