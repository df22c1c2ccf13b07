//! Refresh-frame requester
//!
//! In zero-hertz mode a source may go quiet for a long time. When the
//! pipeline has nothing to repeat (no frame yet, or the last frame was
//! discarded) the requester asks the source for a fresh frame: first after a
//! grace period of a few frame periods, then once per frame period until a
//! real frame arrives.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::task::TaskSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Grace,
    Periodic,
}

/// Schedules refresh-frame requests towards the capture source
#[derive(Debug, Clone)]
pub struct RefreshFrameRequester {
    frame_period: Duration,
    grace_periods: u32,
    task: TaskSlot,
    phase: Phase,
    last_real_frame: Option<Instant>,
}

impl RefreshFrameRequester {
    /// Create an idle requester
    pub fn new(frame_period: Duration, grace_periods: u32) -> Self {
        Self {
            frame_period,
            grace_periods,
            task: TaskSlot::default(),
            phase: Phase::Grace,
            last_real_frame: None,
        }
    }

    /// Start waiting for a frame unless already waiting
    ///
    /// Returns whether the requester was idle and has been armed.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.task.is_armed() {
            return false;
        }
        self.phase = Phase::Grace;
        self.task.arm(now + self.grace_period());
        debug!(
            "Refresh frame requested in {:?} unless a frame arrives",
            self.grace_period()
        );
        true
    }

    /// A frame was discarded before reaching the pipeline
    pub fn on_discarded_frame(&mut self, now: Instant) {
        self.start(now);
    }

    /// A real frame arrived; stop requesting
    pub fn on_real_frame(&mut self, arrival: Instant) {
        self.task.cancel();
        self.last_real_frame = Some(arrival);
    }

    /// A key frame was requested with nothing scheduled to deliver it
    ///
    /// Suppressed when a real frame arrived less than one frame period ago,
    /// since that frame is about to be delivered. Returns whether the
    /// request was honored.
    pub fn on_key_frame_request(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_real_frame {
            if now.saturating_duration_since(last) < self.frame_period {
                debug!("Key frame request suppressed, frame arrived {:?} ago", now - last);
                return false;
            }
        }
        self.start(now);
        true
    }

    /// Adopt a new frame period, re-arming a pending request from `now`
    pub fn set_frame_period(&mut self, frame_period: Duration, now: Instant) {
        self.frame_period = frame_period;
        if self.task.is_armed() {
            let delay = match self.phase {
                Phase::Grace => self.grace_period(),
                Phase::Periodic => frame_period,
            };
            self.task.arm(now + delay);
        }
    }

    /// Fire the pending request if due, scheduling the next one
    ///
    /// Returns whether a refresh frame should be requested now.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.task.take_due(now) {
            return false;
        }
        self.phase = Phase::Periodic;
        self.task.arm(now + self.frame_period);
        true
    }

    /// Deadline of the next request
    pub fn deadline(&self) -> Option<Instant> {
        self.task.deadline()
    }

    /// Whether a request is scheduled
    pub fn is_pending(&self) -> bool {
        self.task.is_armed()
    }

    fn grace_period(&self) -> Duration {
        self.frame_period * self.grace_periods
    }
}
