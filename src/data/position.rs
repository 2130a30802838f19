//! The "current position" output shared by live updates and replay.

use super::fleet::DeviceState;
use super::history::HistoryPoint;

/// Where a [`Position`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The live cache's last-known snapshot.
    Live,
    /// A replayed history point at the given cursor index.
    Replay { index: usize },
}

/// Current position and metrics of the selected device.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub device_id: String,
    /// Self-reported sample time (epoch seconds).
    pub ts: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub battery: Option<f64>,
    pub rssi: Option<f64>,
    pub temp: Option<f64>,
    pub origin: Origin,
}

impl Position {
    /// Snapshot of a device's last-known values.
    pub fn live(device: &DeviceState) -> Self {
        let last = &device.last;
        Self {
            device_id: device.device_id.clone(),
            ts: last.ts,
            lat: last.lat,
            lng: last.lng,
            battery: last.battery,
            rssi: last.rssi,
            temp: last.temp,
            origin: Origin::Live,
        }
    }

    /// A replayed history point.
    pub fn replay(device_id: &str, index: usize, point: &HistoryPoint) -> Self {
        Self {
            device_id: device_id.to_string(),
            ts: point.ts,
            lat: Some(point.lat),
            lng: Some(point.lng),
            battery: point.battery,
            rssi: point.rssi,
            temp: point.temp,
            origin: Origin::Replay { index },
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lng?))
    }

    pub fn is_replay(&self) -> bool {
        matches!(self.origin, Origin::Replay { .. })
    }
}
