//! Live trail of the selected device, for track drawing and sparklines.

use std::collections::VecDeque;

use super::history::COORD_EPSILON;
use super::position::Position;
use super::sample::TelemetrySample;

/// Maximum number of track points to keep.
const MAX_TRAIL_SIZE: usize = 3000;

/// Maximum number of metric readings to keep per series.
const MAX_SERIES_SIZE: usize = 60;

/// Metric series tracked alongside the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Battery,
    Rssi,
    Temp,
}

/// Accumulates the live readings of one device.
///
/// Each inbound sample contributes only the fields it carried, so a sample
/// without a battery reading leaves the battery series alone. Recording a
/// sample from a different device resets the trail. Consecutive positions
/// within the coordinate epsilon are not added to the track, but their
/// metrics are still recorded.
#[derive(Debug, Clone, Default)]
pub struct Trail {
    device_id: Option<String>,
    /// Track points as (lat, lng).
    pub points: VecDeque<(f64, f64)>,
    pub battery: VecDeque<f64>,
    pub rssi: VecDeque<f64>,
    pub temp: VecDeque<f64>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Drop everything recorded so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start over from a device's last-known snapshot.
    pub fn seed(&mut self, position: &Position) {
        self.reset();
        self.push(
            &position.device_id,
            position.coordinates(),
            [position.battery, position.rssi, position.temp],
        );
    }

    /// Record one inbound sample.
    pub fn record(&mut self, sample: &TelemetrySample) {
        self.push(
            &sample.device_id,
            sample.lat.zip(sample.lng),
            [sample.battery, sample.rssi, sample.temp],
        );
    }

    fn push(
        &mut self,
        device_id: &str,
        coordinates: Option<(f64, f64)>,
        metrics: [Option<f64>; 3],
    ) {
        if self.device_id.as_deref() != Some(device_id) {
            self.reset();
            self.device_id = Some(device_id.to_string());
        }

        if let Some((lat, lng)) = coordinates {
            let same = self.points.back().is_some_and(|&(last_lat, last_lng)| {
                (last_lat - lat).abs() < COORD_EPSILON
                    && (last_lng - lng).abs() < COORD_EPSILON
            });
            if !same {
                push_capped(&mut self.points, (lat, lng), MAX_TRAIL_SIZE);
            }
        }

        let [battery, rssi, temp] = metrics;
        for (series, value) in [
            (&mut self.battery, battery),
            (&mut self.rssi, rssi),
            (&mut self.temp, temp),
        ] {
            if let Some(v) = value {
                push_capped(series, v, MAX_SERIES_SIZE);
            }
        }
    }

    pub fn series(&self, metric: Metric) -> &VecDeque<f64> {
        match metric {
            Metric::Battery => &self.battery,
            Metric::Rssi => &self.rssi,
            Metric::Temp => &self.temp,
        }
    }

    /// Sparkline data for a metric (normalized to 0-7 for 8 bar levels).
    ///
    /// Returns an empty Vec if there's not enough history.
    pub fn sparkline(&self, metric: Metric) -> Vec<u8> {
        normalize_sparkline(self.series(metric))
    }
}

fn push_capped<T>(buf: &mut VecDeque<T>, value: T, cap: usize) {
    buf.push_back(value);
    if buf.len() > cap {
        buf.pop_front();
    }
}

fn normalize_sparkline(values: &VecDeque<f64>) -> Vec<u8> {
    if values.len() < 2 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if range <= 0.0 {
                0
            } else {
                (((v - min) / range * 7.0) as u8).min(7)
            }
        })
        .collect()
}
