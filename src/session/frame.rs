//! Frame Queue: At most one scheduled render per display frame.
//!
//! Scheduling replaces whatever was scheduled before, so a burst of chunks
//! within one frame interval collapses into a single render of the latest
//! text. A handle taken for firing stays "in flight" until completed, and
//! cancelling clears it too, so a callback that was already dispatched
//! when the session finalized is recognised as stale.

/// Identifies one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Per-session frame scheduler.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next: u64,
    scheduled: Option<FrameHandle>,
    in_flight: Option<FrameHandle>,
    cancelled: u64,
}

impl FrameQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            next: 0,
            scheduled: None,
            in_flight: None,
            cancelled: 0,
        }
    }

    /// Schedule a frame, cancelling the previously scheduled one.
    pub fn schedule(&mut self) -> FrameHandle {
        if self.scheduled.take().is_some() {
            self.cancelled += 1;
        }
        let handle = FrameHandle(self.next);
        self.next += 1;
        self.scheduled = Some(handle);
        handle
    }

    /// Cancel the scheduled frame and invalidate any in-flight one.
    ///
    /// Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        let scheduled = self.scheduled.take().is_some();
        let in_flight = self.in_flight.take().is_some();
        if scheduled {
            self.cancelled += 1;
        }
        scheduled || in_flight
    }

    /// Take the scheduled frame for firing.
    pub fn take_due(&mut self) -> Option<FrameHandle> {
        let handle = self.scheduled.take()?;
        self.in_flight = Some(handle);
        Some(handle)
    }

    /// Finish firing `handle`. Returns `false` if it went stale meanwhile.
    pub fn complete(&mut self, handle: FrameHandle) -> bool {
        if self.in_flight == Some(handle) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Whether a frame is scheduled.
    pub const fn is_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Frames replaced or cancelled before firing.
    pub const fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_replaces_previous() {
        let mut queue = FrameQueue::new();
        let first = queue.schedule();
        let second = queue.schedule();
        let third = queue.schedule();
        assert_ne!(first, third);
        assert_ne!(second, third);
        assert_eq!(queue.take_due(), Some(third));
        assert_eq!(queue.take_due(), None);
        assert_eq!(queue.cancelled(), 2);
    }

    #[test]
    fn test_complete_in_flight() {
        let mut queue = FrameQueue::new();
        queue.schedule();
        let handle = queue.take_due().unwrap();
        assert!(queue.complete(handle));
        assert!(!queue.complete(handle));
    }

    #[test]
    fn test_cancel_invalidates_in_flight() {
        let mut queue = FrameQueue::new();
        queue.schedule();
        let handle = queue.take_due().unwrap();
        assert!(queue.cancel());
        assert!(!queue.complete(handle));
        assert!(!queue.cancel());
    }

    #[test]
    fn test_cancel_scheduled() {
        let mut queue = FrameQueue::new();
        queue.schedule();
        assert!(queue.is_scheduled());
        assert!(queue.cancel());
        assert!(!queue.is_scheduled());
        assert_eq!(queue.take_due(), None);
    }
}
