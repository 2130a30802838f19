//! Live fleet state cache.
//!
//! [`FleetState`] exclusively owns the device registry. It merges samples
//! sparsely into a per-device "last known good" snapshot, records the local
//! receipt time, and republishes the full sorted device list through a watch
//! channel whenever the registry changes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::sample::TelemetrySample;
use super::selection::{normalize_query, FleetView};

/// Most recent non-absent value per field across every sample of a device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LastKnown {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub battery: Option<f64>,
    pub rssi: Option<f64>,
    pub temp: Option<f64>,
    /// Last self-reported sample time (epoch seconds).
    pub ts: Option<f64>,
}

impl LastKnown {
    /// Sparse merge: absent fields in `sample` never erase known values.
    pub fn merge(&mut self, sample: &TelemetrySample) {
        merge_field(&mut self.lat, sample.lat);
        merge_field(&mut self.lng, sample.lng);
        merge_field(&mut self.battery, sample.battery);
        merge_field(&mut self.rssi, sample.rssi);
        merge_field(&mut self.temp, sample.temp);
        merge_field(&mut self.ts, sample.ts);
    }

    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

fn merge_field(slot: &mut Option<f64>, value: Option<f64>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Cached state for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub device_id: String,
    pub last: LastKnown,
    /// Local receipt time of the most recent sample (epoch ms).
    pub last_seen_ms: u64,
    pub active: bool,
}

impl DeviceState {
    /// Time elapsed since the last sample was received.
    pub fn seen_ago(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_seen_ms))
    }

    /// Activity classification for the given staleness window.
    pub fn is_active_at(&self, now_ms: u64, window: Duration) -> bool {
        self.seen_ago(now_ms) <= window
    }
}

/// What changed as a result of [`FleetState::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestOutcome {
    /// The sample created a new registry entry.
    pub new_device: bool,
    /// The device became the default selection.
    pub became_selected: bool,
    /// The device was inactive and is active again.
    pub reactivated: bool,
}

/// Owner of the device registry, current selection and search term.
#[derive(Debug)]
pub struct FleetState {
    devices: HashMap<String, DeviceState>,
    list: watch::Sender<Vec<DeviceState>>,
    selected: watch::Sender<Option<String>>,
    search: watch::Sender<String>,
    publish_count: u64,
}

impl Default for FleetState {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetState {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            list: watch::Sender::new(Vec::new()),
            selected: watch::Sender::new(None),
            search: watch::Sender::new(String::new()),
            publish_count: 0,
        }
    }

    /// Merge a sample received at `now_ms` into the registry.
    ///
    /// Marks the device active immediately and republishes the full list.
    /// A new device becomes the default selection only if nothing has been
    /// selected yet.
    pub fn ingest(&mut self, sample: &TelemetrySample, now_ms: u64) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        match self.devices.get_mut(&sample.device_id) {
            Some(device) => {
                device.last.merge(sample);
                device.last_seen_ms = now_ms;
                outcome.reactivated = !device.active;
                device.active = true;
            }
            None => {
                let mut last = LastKnown::default();
                last.merge(sample);
                self.devices.insert(
                    sample.device_id.clone(),
                    DeviceState {
                        device_id: sample.device_id.clone(),
                        last,
                        last_seen_ms: now_ms,
                        active: true,
                    },
                );
                outcome.new_device = true;
                debug!(device = %sample.device_id, "New device registered");
            }
        }

        if self.selected.borrow().is_none() {
            self.selected.send_replace(Some(sample.device_id.clone()));
            outcome.became_selected = true;
        }

        self.publish();
        outcome
    }

    /// Set the current selection.
    ///
    /// Empty input is ignored. Unknown ids are accepted. Returns true when
    /// the selection actually changed.
    pub fn select(&mut self, device_id: &str) -> bool {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return false;
        }
        let previous = self.selected.send_replace(Some(device_id.to_string()));
        previous.as_deref() != Some(device_id)
    }

    /// Store a normalized (trimmed, lowercased) search term.
    pub fn set_search(&mut self, query: &str) {
        self.search.send_replace(normalize_query(query));
    }

    /// Recompute every device's activity flag from elapsed time.
    ///
    /// Only reads receipt times and writes `active`. Republishes and returns
    /// true only when at least one flag flipped.
    pub fn reclassify(&mut self, now_ms: u64, window: Duration) -> bool {
        let mut changed = false;
        for device in self.devices.values_mut() {
            let active = device.is_active_at(now_ms, window);
            if active != device.active {
                debug!(device = %device.device_id, active, "Activity changed");
                device.active = active;
                changed = true;
            }
        }
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&mut self) {
        let mut list: Vec<DeviceState> = self.devices.values().cloned().collect();
        sort_devices(&mut list);
        self.list.send_replace(list);
        self.publish_count += 1;
    }

    /// The last published, sorted device list.
    pub fn devices(&self) -> Vec<DeviceState> {
        self.list.borrow().clone()
    }

    /// Derive the operator-visible list and selection.
    pub fn view(&self) -> FleetView {
        let selected = self.selected();
        FleetView::derive(&self.list.borrow(), &self.search.borrow(), selected.as_deref())
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceState> {
        self.devices.get(device_id)
    }

    /// State of the selected device, if the selection matches a known device.
    pub fn selected_device(&self) -> Option<&DeviceState> {
        let selected = self.selected.borrow();
        selected.as_deref().and_then(|id| self.devices.get(id))
    }

    pub fn selected(&self) -> Option<String> {
        self.selected.borrow().clone()
    }

    pub fn search(&self) -> String {
        self.search.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.devices.values().filter(|d| d.active).count()
    }

    /// Number of times the device list has been republished.
    pub fn publish_count(&self) -> u64 {
        self.publish_count
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<DeviceState>> {
        self.list.subscribe()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<String>> {
        self.selected.subscribe()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<String> {
        self.search.subscribe()
    }
}

/// Active devices first, then most recently seen first, then by id.
pub fn sort_devices(devices: &mut [DeviceState]) {
    devices.sort_by(compare_devices);
}

fn compare_devices(a: &DeviceState, b: &DeviceState) -> Ordering {
    b.active
        .cmp(&a.active)
        .then_with(|| b.last_seen_ms.cmp(&a.last_seen_ms))
        .then_with(|| a.device_id.cmp(&b.device_id))
}
