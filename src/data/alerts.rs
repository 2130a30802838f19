//! Alert evaluation.
//!
//! A pure mapping from the current sample and the threshold configuration to
//! a short, ordered list of alerts. Checks run in a fixed order (battery,
//! signal, temperature, sample age) and the list is capped at
//! [`MAX_ALERTS`]. A check whose value or threshold is absent is skipped.

use super::position::Position;
use crate::config::FleetConfig;

/// Maximum number of alerts reported at once.
pub const MAX_ALERTS: usize = 3;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Info,
    Warn,
    Critical,
}

impl AlertLevel {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warn => "WARN",
            AlertLevel::Critical => "CRIT",
        }
    }
}

/// Which condition raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    BatteryLow,
    SignalLow,
    TempHigh,
    /// The sample's own timestamp is older than the staleness window.
    Stale,
}

impl AlertKind {
    pub fn level(&self) -> AlertLevel {
        match self {
            AlertKind::BatteryLow | AlertKind::Stale => AlertLevel::Critical,
            AlertKind::SignalLow | AlertKind::TempHigh => AlertLevel::Warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    /// Observed value (for [`AlertKind::Stale`], the age in seconds).
    pub value: f64,
    pub threshold: f64,
}

impl Alert {
    fn new(kind: AlertKind, value: f64, threshold: f64, message: String) -> Self {
        Self {
            kind,
            level: kind.level(),
            message,
            value,
            threshold,
        }
    }
}

/// Evaluate `position` against `thresholds` at wall time `now_ms`.
pub fn evaluate(position: &Position, thresholds: &FleetConfig, now_ms: u64) -> Vec<Alert> {
    let mut alerts = Vec::with_capacity(MAX_ALERTS);

    if let (Some(battery), Some(low)) = (position.battery, thresholds.battery_low) {
        if battery < low {
            alerts.push(Alert::new(
                AlertKind::BatteryLow,
                battery,
                low,
                format!("Battery low ({}%)", battery.round()),
            ));
        }
    }

    if let (Some(rssi), Some(low)) = (position.rssi, thresholds.rssi_low) {
        if rssi < low {
            alerts.push(Alert::new(
                AlertKind::SignalLow,
                rssi,
                low,
                format!("Weak signal (RSSI {} dBm)", rssi.round()),
            ));
        }
    }

    if let (Some(temp), Some(high)) = (position.temp, thresholds.temp_high) {
        if temp > high {
            alerts.push(Alert::new(
                AlertKind::TempHigh,
                temp,
                high,
                format!("High temperature ({:.1}°C)", temp),
            ));
        }
    }

    if let (Some(ts), Some(stale)) = (position.ts, thresholds.stale_seconds) {
        let age = now_ms as f64 / 1000.0 - ts;
        if age.is_finite() && age > stale {
            alerts.push(Alert::new(
                AlertKind::Stale,
                age,
                stale,
                format!("No fresh data ({}s)", age.round()),
            ));
        }
    }

    alerts.truncate(MAX_ALERTS);
    alerts
}
