//! Periodic staleness re-evaluation.

use std::time::Duration;

use tracing::debug;

use super::timer::Timer;
use crate::config::DEFAULT_TICK;
use crate::data::FleetState;

/// Re-derives every device's `active` flag on a fixed period.
///
/// The first tick is due at registration time. The staleness window is
/// passed on every poll so a configuration change applies on the next tick.
#[derive(Debug)]
pub struct StalenessMonitor {
    period: Duration,
    timer: Timer,
    ticks: u64,
}

impl StalenessMonitor {
    /// Register a monitor whose first tick is due immediately.
    pub fn start(now_ms: u64, period: Duration) -> Self {
        let mut timer = Timer::new();
        timer.schedule_at(now_ms);
        Self {
            period: if period.is_zero() { DEFAULT_TICK } else { period },
            timer,
            ticks: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timer.due_at()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_pending()
    }

    /// Run the tick if it is due.
    ///
    /// Returns `true` if at least one device changed classification (and so
    /// the device list was republished). Missed periods are not replayed:
    /// the next tick is scheduled one period after `now_ms`.
    pub fn poll(&mut self, now_ms: u64, fleet: &mut FleetState, window: Duration) -> bool {
        if !self.timer.fire(now_ms) {
            return false;
        }
        self.ticks += 1;
        self.timer.schedule_after(now_ms, self.period);

        let changed = fleet.reclassify(now_ms, window);
        if changed {
            debug!(
                active = fleet.active_count(),
                total = fleet.len(),
                "Activity classification changed"
            );
        }
        changed
    }

    /// Cancel the pending tick. A torn-down monitor never fires again.
    pub fn teardown(&mut self) {
        self.timer.cancel();
    }
}
