//! Single-slot cancellable deadline.

use std::time::Duration;

/// One optional deadline in epoch milliseconds.
///
/// Scheduling replaces any pending deadline, so a component owning a `Timer`
/// can never have two callbacks outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    due_at: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer `delay` after `now_ms`, replacing any pending deadline.
    pub fn schedule_after(&mut self, now_ms: u64, delay: Duration) {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.schedule_at(now_ms.saturating_add(delay_ms));
    }

    /// Arm the timer for an absolute deadline, replacing any pending one.
    pub fn schedule_at(&mut self, due_at_ms: u64) {
        self.due_at = Some(due_at_ms);
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    /// Consume the deadline if it has passed. Returns `true` when it fired.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.due_at {
            Some(due) if due <= now_ms => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn due_at(&self) -> Option<u64> {
        self.due_at
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_when_due() {
        let mut timer = Timer::new();
        timer.schedule_after(1_000, Duration::from_millis(600));
        assert_eq!(timer.due_at(), Some(1_600));

        assert!(!timer.fire(1_599));
        assert!(timer.fire(1_600));
        assert!(!timer.is_pending());
        assert!(!timer.fire(5_000));
    }

    #[test]
    fn test_reschedule_replaces_pending_deadline() {
        let mut timer = Timer::new();
        timer.schedule_after(0, Duration::from_millis(600));
        timer.schedule_after(0, Duration::from_millis(80));

        assert!(timer.fire(80));
        assert!(!timer.fire(600));
    }

    #[test]
    fn test_cancel() {
        let mut timer = Timer::new();
        timer.schedule_at(10);
        timer.cancel();
        assert!(!timer.fire(100));
        assert_eq!(timer.due_at(), None);
    }
}
