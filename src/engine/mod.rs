//! Timer-driven components.
//!
//! Nothing here spawns a task or sleeps. Each component owns a [`Timer`]
//! holding at most one deadline, and the host advances it by calling
//! `poll(now)` with the current time from a [`Clock`](crate::Clock).

pub mod monitor;
pub mod replay;
pub mod timer;

pub use monitor::StalenessMonitor;
pub use replay::{Emission, ReplayEngine, ReplaySession, ReplayState, Speed};
pub use timer::Timer;
