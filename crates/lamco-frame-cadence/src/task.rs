//! Single pending-task slot
//!
//! Scheduling state machines in this crate never hold more than one pending
//! task per concern. A [`TaskSlot`] is that one task: arming it replaces
//! whatever was pending, and cancelling it is just clearing the deadline.
//! The driver asks each slot for its deadline and fires it once due.

use std::time::Instant;

/// At most one pending deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSlot {
    deadline: Option<Instant>,
}

impl TaskSlot {
    /// Schedule the task at `deadline`, replacing any pending one
    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Cancel the pending task, if any
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Deadline of the pending task
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a task is pending
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the pending task is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Clear the pending task if it is due, returning whether it was
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

/// Earliest of two optional deadlines
pub(crate) fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_arm_replaces_pending() {
        let now = Instant::now();
        let mut slot = TaskSlot::default();
        assert!(!slot.is_armed());

        slot.arm(now + Duration::from_millis(100));
        slot.arm(now + Duration::from_millis(50));
        assert_eq!(slot.deadline(), Some(now + Duration::from_millis(50)));
    }

    #[test]
    fn test_take_due() {
        let now = Instant::now();
        let mut slot = TaskSlot::default();
        slot.arm(now + Duration::from_millis(100));

        assert!(!slot.take_due(now + Duration::from_millis(99)));
        assert!(slot.take_due(now + Duration::from_millis(100)));
        assert!(!slot.is_armed());
        assert!(!slot.take_due(now + Duration::from_millis(200)));
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut slot = TaskSlot::default();
        slot.arm(now);
        slot.cancel();
        assert!(!slot.is_due(now));
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(Some(later), Some(now)), Some(now));
        assert_eq!(earliest(None, Some(later)), Some(later));
        assert_eq!(earliest(None, None), None);
    }
}
