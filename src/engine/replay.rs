//! History replay state machine.
//!
//! A [`ReplayEngine`] owns one [`ReplaySession`] and the only timer that can
//! advance it. It never calls back into the host: every operation returns
//! the [`Emission`] the caller should publish as the current position, and
//! [`ReplayEngine::poll`] advances the cursor when its deadline has passed.
//!
//! ```text
//!            play()                 tick past the end
//! Stopped ──────────▶ Playing ───────────────────────▶ Paused
//!    ▲                 │  ▲                              │
//!    │       pause()   │  │ play()                       │
//!    │                 ▼  │                              │
//!    └─── stop() ──── Paused ◀───────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::timer::Timer;
use crate::data::HistoryPoint;

/// Interval between points at 1x.
pub const BASE_INTERVAL: Duration = Duration::from_millis(600);

/// Shortest interval between points at any speed.
pub const FLOOR_INTERVAL: Duration = Duration::from_millis(80);

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Speed {
    #[default]
    X1,
    X2,
    X5,
    X10,
}

impl Speed {
    pub const ALL: [Speed; 4] = [Speed::X1, Speed::X2, Speed::X5, Speed::X10];

    pub fn multiplier(&self) -> u32 {
        match self {
            Speed::X1 => 1,
            Speed::X2 => 2,
            Speed::X5 => 5,
            Speed::X10 => 10,
        }
    }

    /// Parse a multiplier; only the enumerated speeds are accepted.
    pub fn from_multiplier(multiplier: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.multiplier() == multiplier)
    }

    /// Time between advances: `max(FLOOR_INTERVAL, BASE_INTERVAL / multiplier)`.
    pub fn interval(&self) -> Duration {
        let base = BASE_INTERVAL.as_millis() as f64;
        let ms = (base / f64::from(self.multiplier())).round() as u64;
        Duration::from_millis(ms).max(FLOOR_INTERVAL)
    }

    /// Next faster speed, saturating.
    pub fn faster(&self) -> Self {
        match self {
            Speed::X1 => Speed::X2,
            Speed::X2 => Speed::X5,
            Speed::X5 | Speed::X10 => Speed::X10,
        }
    }

    /// Next slower speed, saturating.
    pub fn slower(&self) -> Self {
        match self {
            Speed::X1 | Speed::X2 => Speed::X1,
            Speed::X5 => Speed::X2,
            Speed::X10 => Speed::X5,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.multiplier())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayState {
    #[default]
    Stopped,
    Playing,
    /// Not playing; the cursor is retained (possibly past the end).
    Paused,
}

impl ReplayState {
    pub fn label(&self) -> &'static str {
        match self {
            ReplayState::Stopped => "stopped",
            ReplayState::Playing => "playing",
            ReplayState::Paused => "paused",
        }
    }
}

/// Playback of one device's sanitized history.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySession {
    pub device_id: String,
    /// Immutable for the session.
    points: Vec<HistoryPoint>,
    pub index: usize,
    pub speed: Speed,
    pub state: ReplayState,
}

impl ReplaySession {
    pub fn new(device_id: impl Into<String>, points: Vec<HistoryPoint>) -> Self {
        Self {
            device_id: device_id.into(),
            points,
            index: 0,
            speed: Speed::default(),
            state: ReplayState::Stopped,
        }
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The point under the cursor, if the cursor is in range.
    pub fn current(&self) -> Option<&HistoryPoint> {
        self.points.get(self.index)
    }

    /// Fraction of the sequence played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        match self.points.len() {
            0 => 0.0,
            1 => {
                if self.index >= 1 {
                    1.0
                } else {
                    0.0
                }
            }
            n => (self.index as f64 / (n - 1) as f64).min(1.0),
        }
    }
}

/// What the caller should publish as the current position.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// A history point at the given cursor index.
    Point { index: usize, point: HistoryPoint },
    /// No history exists; fall back to the live snapshot.
    Live,
}

/// Timer-driven owner of a [`ReplaySession`].
#[derive(Debug)]
pub struct ReplayEngine {
    session: ReplaySession,
    timer: Timer,
}

impl ReplayEngine {
    /// Create a stopped engine at index 0.
    pub fn new(device_id: impl Into<String>, points: Vec<HistoryPoint>) -> Self {
        Self {
            session: ReplaySession::new(device_id, points),
            timer: Timer::new(),
        }
    }

    pub fn session(&self) -> &ReplaySession {
        &self.session
    }

    pub fn device_id(&self) -> &str {
        &self.session.device_id
    }

    pub fn state(&self) -> ReplayState {
        self.session.state
    }

    pub fn index(&self) -> usize {
        self.session.index
    }

    pub fn speed(&self) -> Speed {
        self.session.speed
    }

    pub fn next_due(&self) -> Option<u64> {
        self.timer.due_at()
    }

    /// Start or resume playback.
    ///
    /// Restarts from the first point when the cursor is at or past the last
    /// one. Emits the point under the cursor and schedules the next advance.
    /// Does nothing when already playing or when there is no history.
    pub fn play(&mut self, now_ms: u64) -> Option<Emission> {
        if self.session.is_empty() || self.session.state == ReplayState::Playing {
            return None;
        }
        if self.session.index + 1 >= self.session.len() {
            self.session.index = 0;
        }
        self.session.state = ReplayState::Playing;
        self.timer.schedule_after(now_ms, self.session.speed.interval());
        debug!(
            device = %self.session.device_id,
            index = self.session.index,
            speed = %self.session.speed,
            "Replay playing"
        );
        self.emit()
    }

    /// Pause playback, keeping the cursor. Returns `true` if it was playing.
    pub fn pause(&mut self) -> bool {
        if self.session.state != ReplayState::Playing {
            return false;
        }
        self.timer.cancel();
        self.session.state = ReplayState::Paused;
        true
    }

    /// Stop from any state and rewind to the first point.
    pub fn stop(&mut self) -> Emission {
        self.timer.cancel();
        self.session.index = 0;
        self.session.state = ReplayState::Stopped;
        self.emit().unwrap_or(Emission::Live)
    }

    /// Change speed. While playing this restarts playback at the current
    /// index (re-emitting its point) so the new interval applies at once.
    pub fn set_speed(&mut self, speed: Speed, now_ms: u64) -> Option<Emission> {
        self.session.speed = speed;
        if self.pause() {
            self.play(now_ms)
        } else {
            None
        }
    }

    /// Advance the cursor if the scheduled tick is due.
    ///
    /// Running past the last point pauses playback without emitting and
    /// schedules nothing further.
    pub fn poll(&mut self, now_ms: u64) -> Option<Emission> {
        if !self.timer.fire(now_ms) {
            return None;
        }
        self.session.index += 1;
        if self.session.index >= self.session.len() {
            self.session.state = ReplayState::Paused;
            debug!(device = %self.session.device_id, "Replay finished");
            return None;
        }
        self.timer.schedule_after(now_ms, self.session.speed.interval());
        self.emit()
    }

    /// Whether live updates for this device must not touch the current position.
    pub fn suppresses_live(&self) -> bool {
        match self.session.state {
            ReplayState::Playing => true,
            ReplayState::Paused => self.session.index > 0,
            ReplayState::Stopped => false,
        }
    }

    /// Cancel the pending tick.
    pub fn teardown(&mut self) {
        self.timer.cancel();
        if self.session.state == ReplayState::Playing {
            self.session.state = ReplayState::Paused;
        }
    }

    fn emit(&self) -> Option<Emission> {
        self.session.current().map(|point| Emission::Point {
            index: self.session.index,
            point: *point,
        })
    }
}
