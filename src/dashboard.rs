//! The session context wiring the fleet cache, monitor and replay engine.
//!
//! A [`Dashboard`] is constructed once per application session and torn down
//! with it. It is the only writer of the current position and alert outputs,
//! and the only caller of the components' mutating operations. Inputs arrive
//! as method calls (ingest, selection, configuration pushes, history
//! results); time advances through [`Dashboard::tick`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{FleetConfig, DEFAULT_STALE_WINDOW};
use crate::data::{
    evaluate, Alert, DeviceState, FleetState, FleetView, HistoryResponse, IngestOutcome, Position,
    TelemetrySample, Trail,
};
use crate::engine::{Emission, ReplayEngine, Speed, StalenessMonitor};
use crate::error::{FetchError, SampleError};

/// History of the selected device, as seen by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    /// Loaded; `count` is the number of points left after sanitization.
    Loaded { count: usize },
    /// The fetch failed; history is empty.
    Failed(String),
}

impl HistoryState {
    pub fn label(&self) -> String {
        match self {
            HistoryState::Idle => "no history".to_string(),
            HistoryState::Loading => "loading...".to_string(),
            HistoryState::Loaded { count } => format!("{} points", count),
            HistoryState::Failed(message) => format!("error: {}", message),
        }
    }
}

/// What a call to [`Dashboard::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// At least one device changed activity classification.
    pub reclassified: bool,
    /// The replay cursor moved (or playback ended).
    pub replay_advanced: bool,
    /// The alert list changed.
    pub alerts_changed: bool,
}

impl TickOutcome {
    pub fn any(&self) -> bool {
        self.reclassified || self.replay_advanced || self.alerts_changed
    }
}

/// Application session context.
#[derive(Debug)]
pub struct Dashboard {
    clock: Arc<dyn Clock>,
    config: FleetConfig,
    stale_window: Duration,
    fleet: FleetState,
    monitor: StalenessMonitor,
    replay: Option<ReplayEngine>,
    history: HistoryState,
    trail: Trail,
    position: watch::Sender<Option<Position>>,
    alerts: watch::Sender<Vec<Alert>>,
}

impl Dashboard {
    /// Create a session. The staleness monitor's first tick is due at once.
    pub fn new(clock: Arc<dyn Clock>, config: FleetConfig, tick: Duration) -> Self {
        let now = clock.now_ms();
        Self {
            stale_window: config.stale_window().unwrap_or(DEFAULT_STALE_WINDOW),
            config,
            monitor: StalenessMonitor::start(now, tick),
            clock,
            fleet: FleetState::new(),
            replay: None,
            history: HistoryState::Idle,
            trail: Trail::new(),
            position: watch::Sender::new(None),
            alerts: watch::Sender::new(Vec::new()),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Validate and merge one inbound record.
    ///
    /// A rejected record changes nothing.
    pub fn ingest(&mut self, raw: &Value) -> Result<IngestOutcome, SampleError> {
        let sample = TelemetrySample::from_value(raw).inspect_err(|e| {
            debug!(error = %e, "Discarding telemetry record");
        })?;
        Ok(self.ingest_sample(&sample))
    }

    /// Merge an already validated sample.
    pub fn ingest_sample(&mut self, sample: &TelemetrySample) -> IngestOutcome {
        let outcome = self.fleet.ingest(sample, self.clock.now_ms());

        if outcome.became_selected {
            info!(device = %sample.device_id, "Default selection");
            self.on_selection_changed();
        } else if self.fleet.selected().as_deref() == Some(sample.device_id.as_str()) {
            self.trail.record(sample);
            self.apply_live();
        }
        outcome
    }

    /// Select a device. Empty input is ignored; unknown ids are accepted.
    pub fn select(&mut self, device_id: &str) -> bool {
        let changed = self.fleet.select(device_id);
        if changed {
            info!(device = %device_id.trim(), "Selected device");
            self.on_selection_changed();
        }
        changed
    }

    pub fn set_search(&mut self, query: &str) {
        self.fleet.set_search(query);
    }

    /// Replace the thresholds.
    ///
    /// The staleness window only changes for a finite, positive value and is
    /// picked up by the next monitor tick. Alerts are re-evaluated at once.
    pub fn apply_config(&mut self, config: FleetConfig) {
        if let Some(window) = config.stale_window() {
            self.stale_window = window;
        }
        self.config = config;
        info!(
            battery_low = ?config.battery_low,
            rssi_low = ?config.rssi_low,
            temp_high = ?config.temp_high,
            stale_window_ms = self.stale_window.as_millis() as u64,
            "Applied configuration"
        );
        self.refresh_alerts();
    }

    /// Run every timer that is due.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now_ms();
        let mut outcome = TickOutcome {
            reclassified: self.monitor.poll(now, &mut self.fleet, self.stale_window),
            ..Default::default()
        };

        if let Some(replay) = self.replay.as_mut() {
            let before = replay.index();
            let emission = replay.poll(now);
            outcome.replay_advanced = replay.index() != before;
            if let Some(emission) = emission {
                self.apply_emission(emission);
            }
        }

        outcome.alerts_changed = self.refresh_alerts();
        outcome
    }

    /// Earliest pending deadline across all timers (epoch ms).
    pub fn next_deadline(&self) -> Option<u64> {
        let replay = self.replay.as_ref().and_then(ReplayEngine::next_due);
        match (self.monitor.next_due(), replay) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Cancel every timer and drop the replay session.
    pub fn teardown(&mut self) {
        self.monitor.teardown();
        if let Some(mut replay) = self.replay.take() {
            replay.teardown();
        }
        debug!("Dashboard torn down");
    }

    // ------------------------------------------------------------------
    // History and replay
    // ------------------------------------------------------------------

    /// Mark history as loading for the selected device and drop the current
    /// session. Returns the device whose history should be fetched.
    pub fn begin_history_load(&mut self) -> Option<String> {
        let device_id = self.fleet.selected()?;
        self.drop_replay();
        self.history = HistoryState::Loading;
        info!(device = %device_id, "Loading history");
        Some(device_id)
    }

    /// Deliver a fetch result.
    ///
    /// Results for a device that is no longer selected are discarded and
    /// `false` is returned. A failure leaves the history empty.
    pub fn history_loaded(
        &mut self,
        device_id: &str,
        result: Result<HistoryResponse, FetchError>,
    ) -> bool {
        if self.fleet.selected().as_deref() != Some(device_id) {
            debug!(device = %device_id, "Discarding history for unselected device");
            return false;
        }
        self.drop_replay();

        match result {
            Ok(response) => {
                let points = response.points();
                info!(
                    device = %device_id,
                    received = response.history.len(),
                    kept = points.len(),
                    "History loaded"
                );
                self.history = HistoryState::Loaded {
                    count: points.len(),
                };
                self.replay = Some(ReplayEngine::new(device_id, points));
            }
            Err(e) => {
                warn!(device = %device_id, error = %e, "History fetch failed");
                self.history = HistoryState::Failed(e.to_string());
            }
        }
        true
    }

    /// Start or resume replay. Returns `true` if playback started.
    pub fn play(&mut self) -> bool {
        let now = self.clock.now_ms();
        let Some(emission) = self.replay.as_mut().and_then(|r| r.play(now)) else {
            return false;
        };
        self.apply_emission(emission);
        true
    }

    pub fn pause(&mut self) -> bool {
        self.replay.as_mut().is_some_and(ReplayEngine::pause)
    }

    /// Stop replay and re-emit the first point, or the live snapshot when
    /// there is no history.
    pub fn stop(&mut self) {
        let emission = match self.replay.as_mut() {
            Some(replay) => replay.stop(),
            None => Emission::Live,
        };
        self.apply_emission(emission);
    }

    pub fn set_speed(&mut self, speed: Speed) {
        let now = self.clock.now_ms();
        let emission = self.replay.as_mut().and_then(|r| r.set_speed(speed, now));
        if let Some(emission) = emission {
            self.apply_emission(emission);
        }
    }

    /// Toggle between playing and paused.
    pub fn toggle_play(&mut self) -> bool {
        if self.pause() {
            false
        } else {
            self.play()
        }
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn stale_window(&self) -> Duration {
        self.stale_window
    }

    pub fn fleet(&self) -> &FleetState {
        &self.fleet
    }

    pub fn view(&self) -> FleetView {
        self.fleet.view()
    }

    pub fn devices(&self) -> Vec<DeviceState> {
        self.fleet.devices()
    }

    pub fn selected(&self) -> Option<String> {
        self.fleet.selected()
    }

    pub fn replay(&self) -> Option<&ReplayEngine> {
        self.replay.as_ref()
    }

    pub fn history(&self) -> &HistoryState {
        &self.history
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn position(&self) -> Option<Position> {
        self.position.borrow().clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.borrow().clone()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<DeviceState>> {
        self.fleet.subscribe_devices()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<String>> {
        self.fleet.subscribe_selected()
    }

    pub fn subscribe_position(&self) -> watch::Receiver<Option<Position>> {
        self.position.subscribe()
    }

    pub fn subscribe_alerts(&self) -> watch::Receiver<Vec<Alert>> {
        self.alerts.subscribe()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn on_selection_changed(&mut self) {
        self.drop_replay();
        self.history = HistoryState::Idle;
        match self.fleet.selected_device() {
            Some(device) => self.trail.seed(&Position::live(device)),
            None => self.trail.reset(),
        }
        self.apply_live();
        if self.fleet.selected_device().is_none() {
            self.position.send_replace(None);
            self.refresh_alerts();
        }
    }

    fn drop_replay(&mut self) {
        if let Some(mut replay) = self.replay.take() {
            replay.teardown();
        }
    }

    /// Publish the selected device's live snapshot unless replay owns the
    /// current position.
    fn apply_live(&mut self) {
        if self.replay.as_ref().is_some_and(ReplayEngine::suppresses_live) {
            return;
        }
        let Some(device) = self.fleet.selected_device() else {
            return;
        };
        self.position.send_replace(Some(Position::live(device)));
        self.refresh_alerts();
    }

    fn apply_emission(&mut self, emission: Emission) {
        match emission {
            Emission::Point { index, point } => {
                let Some(device_id) = self.replay.as_ref().map(|r| r.device_id().to_string())
                else {
                    return;
                };
                self.position
                    .send_replace(Some(Position::replay(&device_id, index, &point)));
                self.refresh_alerts();
            }
            Emission::Live => self.apply_live(),
        }
    }

    /// Re-evaluate alerts for the current position. Returns `true` if the
    /// list changed.
    fn refresh_alerts(&mut self) -> bool {
        let now = self.clock.now_ms();
        let alerts = self
            .position
            .borrow()
            .as_ref()
            .map(|p| evaluate(p, &self.config, now))
            .unwrap_or_default();

        self.alerts.send_if_modified(|current| {
            if *current == alerts {
                false
            } else {
                *current = alerts;
                true
            }
        })
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::{AlertKind, Origin};
    use crate::engine::ReplayState;
    use serde_json::json;

    fn dashboard() -> (ManualClock, Dashboard) {
        let clock = ManualClock::new(1_000_000);
        let dash = Dashboard::new(
            Arc::new(clock.clone()),
            FleetConfig::default(),
            Duration::from_secs(2),
        );
        (clock, dash)
    }

    fn history(n: usize) -> HistoryResponse {
        let points = (0..n)
            .map(|i| json!({"ts": i, "lat": 10.0 + i as f64, "lng": 20.0}))
            .collect();
        HistoryResponse {
            device_id: "d1".to_string(),
            count: Some(n as u64),
            history: points,
        }
    }

    fn origin(dash: &Dashboard) -> Option<Origin> {
        dash.position().map(|p| p.origin)
    }

    #[test]
    fn test_first_sample_selects_and_publishes_live_position() {
        let (_clock, mut dash) = dashboard();
        let outcome = dash
            .ingest(&json!({"device_eui": "d1", "lat": 1.0, "lng": 2.0, "battery": 50}))
            .unwrap();

        assert!(outcome.new_device && outcome.became_selected);
        assert_eq!(dash.selected().as_deref(), Some("d1"));
        let position = dash.position().unwrap();
        assert_eq!(position.coordinates(), Some((1.0, 2.0)));
        assert_eq!(position.origin, Origin::Live);
        assert_eq!(dash.trail().points.len(), 1);

        dash.ingest(&json!({"device_eui": "d2", "lat": 5.0, "lng": 5.0}))
            .unwrap();
        assert_eq!(dash.selected().as_deref(), Some("d1"));
        assert_eq!(dash.position().unwrap().device_id, "d1");
    }

    #[test]
    fn test_rejected_record_changes_nothing() {
        let (_clock, mut dash) = dashboard();
        assert_eq!(
            dash.ingest(&json!({"lat": 1.0})),
            Err(SampleError::MissingDeviceId)
        );
        assert_eq!(dash.ingest(&json!([1, 2])), Err(SampleError::NotAnObject));
        assert!(dash.fleet().is_empty());
        assert_eq!(dash.fleet().publish_count(), 0);
        assert_eq!(dash.position(), None);
    }

    #[test]
    fn test_unknown_selection_yields_no_position() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "battery": 5}))
            .unwrap();
        assert_eq!(dash.alerts().len(), 1);

        assert!(dash.select("ghost"));
        assert_eq!(dash.selected().as_deref(), Some("ghost"));
        assert_eq!(dash.position(), None);
        assert!(dash.alerts().is_empty());
        assert!(dash.view().selected_state.is_none());

        assert!(!dash.select("  "));
    }

    #[test]
    fn test_monitor_flips_inactive_on_tick() {
        let (clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.tick();

        clock.advance(Duration::from_secs(10));
        assert!(!dash.tick().reclassified);
        assert!(dash.devices()[0].active);

        clock.advance(Duration::from_secs(2));
        assert!(dash.tick().reclassified);
        assert!(!dash.devices()[0].active);

        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        assert!(dash.devices()[0].active);
    }

    #[test]
    fn test_invalid_stale_window_keeps_previous() {
        let (_clock, mut dash) = dashboard();
        dash.apply_config(FleetConfig::from_json(&json!({"staleSeconds": 30})));
        assert_eq!(dash.stale_window(), Duration::from_secs(30));

        dash.apply_config(FleetConfig::from_json(&json!({"staleSeconds": 0})));
        assert_eq!(dash.stale_window(), Duration::from_secs(30));

        dash.apply_config(FleetConfig::from_json(&json!({"staleSeconds": "soon"})));
        assert_eq!(dash.stale_window(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_push_reevaluates_alerts() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "battery": 30}))
            .unwrap();
        assert!(dash.alerts().is_empty());

        dash.apply_config(FleetConfig::from_json(&json!({"batteryLow": 40})));
        let alerts = dash.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::BatteryLow);
    }

    #[test]
    fn test_stale_sample_alert_appears_on_tick() {
        let (clock, mut dash) = dashboard();
        let ts = clock.now_ms() / 1000;
        dash.ingest(&json!({"device_eui": "d1", "ts": ts})).unwrap();
        assert!(dash.alerts().is_empty());

        clock.advance(Duration::from_secs(11));
        assert!(dash.tick().alerts_changed);
        assert_eq!(dash.alerts()[0].kind, AlertKind::Stale);
    }

    #[test]
    fn test_replay_suppresses_live_until_stopped() {
        let (clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "lat": 1.0, "lng": 1.0}))
            .unwrap();

        assert_eq!(dash.begin_history_load().as_deref(), Some("d1"));
        assert_eq!(dash.history(), &HistoryState::Loading);
        assert!(dash.history_loaded("d1", Ok(history(3))));
        assert_eq!(dash.history(), &HistoryState::Loaded { count: 3 });

        assert!(dash.play());
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 0 }));

        clock.advance(Duration::from_millis(600));
        assert!(dash.tick().replay_advanced);
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 1 }));

        dash.ingest(&json!({"device_eui": "d1", "lat": 9.0, "lng": 9.0}))
            .unwrap();
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 1 }));
        assert_eq!(dash.fleet().get("d1").unwrap().last.lat, Some(9.0));

        dash.stop();
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 0 }));
        assert_eq!(dash.replay().unwrap().state(), ReplayState::Stopped);

        dash.ingest(&json!({"device_eui": "d1", "lat": 9.5, "lng": 9.0}))
            .unwrap();
        assert_eq!(origin(&dash), Some(Origin::Live));
        assert_eq!(dash.position().unwrap().lat, Some(9.5));
    }

    #[test]
    fn test_replay_runs_to_pause_and_restarts() {
        let (clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.history_loaded("d1", Ok(history(3)));
        dash.play();

        for _ in 0..3 {
            clock.advance(Duration::from_millis(600));
            dash.tick();
        }
        let replay = dash.replay().unwrap();
        assert_eq!(replay.state(), ReplayState::Paused);
        assert_eq!(replay.next_due(), None);
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 2 }));

        assert!(dash.play());
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 0 }));
    }

    #[test]
    fn test_fetch_failure_clears_history() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "lat": 1.0, "lng": 1.0}))
            .unwrap();
        dash.history_loaded("d1", Ok(history(3)));
        dash.play();

        dash.begin_history_load();
        assert!(dash.replay().is_none());
        dash.history_loaded("d1", Err(FetchError::Status(503)));

        assert!(matches!(dash.history(), HistoryState::Failed(_)));
        assert!(!dash.play());

        dash.stop();
        assert_eq!(origin(&dash), Some(Origin::Live));
    }

    #[test]
    fn test_trail_records_incoming_fields_only() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "lat": 1.0, "lng": 1.0, "battery": 80}))
            .unwrap();
        dash.ingest(&json!({"device_eui": "d1", "rssi": -70}))
            .unwrap();

        // The merged snapshot still carries the battery, the trail does not repeat it
        assert_eq!(dash.position().unwrap().battery, Some(80.0));
        assert_eq!(dash.trail().battery.len(), 1);
        assert_eq!(dash.trail().rssi.len(), 1);

        dash.stop();
        assert_eq!(origin(&dash), Some(Origin::Live));
        assert_eq!(dash.trail().battery.len(), 1);
        assert_eq!(dash.trail().rssi.len(), 1);
        assert_eq!(dash.trail().points.len(), 1);
    }

    #[test]
    fn test_explicit_selection_seeds_trail_from_snapshot() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1", "battery": 50})).unwrap();
        dash.ingest(&json!({"device_eui": "d2", "lat": 3.0, "lng": 4.0, "temp": 21}))
            .unwrap();
        dash.ingest(&json!({"device_eui": "d2", "temp": 22})).unwrap();

        dash.select("d2");
        let trail = dash.trail();
        assert_eq!(trail.device_id(), Some("d2"));
        assert_eq!(trail.points.len(), 1);
        assert_eq!(trail.temp.len(), 1);
        assert_eq!(trail.temp.back(), Some(&22.0));
        assert!(trail.battery.is_empty());
    }

    #[test]
    fn test_results_for_unselected_device_are_discarded() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.begin_history_load();
        dash.select("d2");

        assert!(!dash.history_loaded("d1", Ok(history(3))));
        assert!(dash.replay().is_none());
        assert_eq!(dash.history(), &HistoryState::Idle);
    }

    #[test]
    fn test_selection_change_drops_session() {
        let (_clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.ingest(&json!({"device_eui": "d2", "lat": 3.0, "lng": 4.0}))
            .unwrap();
        dash.history_loaded("d1", Ok(history(3)));
        dash.play();

        dash.select("d2");
        assert!(dash.replay().is_none());
        assert_eq!(dash.history(), &HistoryState::Idle);
        let position = dash.position().unwrap();
        assert_eq!(position.device_id, "d2");
        assert_eq!(position.origin, Origin::Live);
    }

    #[test]
    fn test_set_speed_restarts_current_point() {
        let (clock, mut dash) = dashboard();
        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.history_loaded("d1", Ok(history(5)));
        dash.play();
        clock.advance(Duration::from_millis(600));
        dash.tick();

        dash.set_speed(Speed::X5);
        assert_eq!(origin(&dash), Some(Origin::Replay { index: 1 }));
        assert_eq!(dash.replay().unwrap().next_due(), Some(clock.now_ms() + 120));
    }

    #[test]
    fn test_next_deadline_and_teardown() {
        let (clock, mut dash) = dashboard();
        let start = clock.now_ms();
        assert_eq!(dash.next_deadline(), Some(start));

        dash.tick();
        assert_eq!(dash.next_deadline(), Some(start + 2_000));

        dash.ingest(&json!({"device_eui": "d1"})).unwrap();
        dash.history_loaded("d1", Ok(history(3)));
        dash.play();
        assert_eq!(dash.next_deadline(), Some(start + 600));

        dash.teardown();
        assert_eq!(dash.next_deadline(), None);
        assert!(dash.replay().is_none());
    }
}
