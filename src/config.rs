//! Threshold configuration and the settings file.
//!
//! Settings are loaded with the `config` crate from an optional file
//! (TOML/JSON/YAML) overlaid by `FLEETWATCH_*` environment variables, and are
//! always default-merged: any missing key takes its default value.
//!
//! ```toml
//! [thresholds]
//! battery_low = 20
//! rssi_low = -90
//! temp_high = 60
//! stale_seconds = 10
//!
//! [history]
//! base_url = "http://localhost:8000/v1/telemetry"
//! limit = 500
//!
//! [monitor]
//! tick = "2s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::coerce::lenient_f64;
use crate::data::duration::parse_duration;
use crate::data::history::DEFAULT_HISTORY_LIMIT;

/// Default staleness window.
pub const DEFAULT_STALE_WINDOW: Duration = Duration::from_secs(10);

/// Default period of the staleness monitor.
pub const DEFAULT_TICK: Duration = Duration::from_secs(2);

/// Alert thresholds and staleness window.
///
/// Each value is optional: a value that failed to coerce to a finite number
/// disables the corresponding check instead of failing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FleetConfig {
    /// Battery level (%) below which an alert is raised.
    #[serde(alias = "battery_low", deserialize_with = "lenient_f64")]
    pub battery_low: Option<f64>,
    /// Signal strength (dBm) below which an alert is raised.
    #[serde(alias = "rssi_low", deserialize_with = "lenient_f64")]
    pub rssi_low: Option<f64>,
    /// Temperature (°C) above which an alert is raised.
    #[serde(alias = "temp_high", deserialize_with = "lenient_f64")]
    pub temp_high: Option<f64>,
    /// Seconds without contact after which a device is inactive.
    #[serde(alias = "stale_seconds", deserialize_with = "lenient_f64")]
    pub stale_seconds: Option<f64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            battery_low: Some(20.0),
            rssi_low: Some(-90.0),
            temp_high: Some(60.0),
            stale_seconds: Some(DEFAULT_STALE_WINDOW.as_secs_f64()),
        }
    }
}

impl FleetConfig {
    /// Default-merge a pushed JSON document (`{batteryLow, rssiLow, tempHigh, staleSeconds}`).
    ///
    /// Anything that is not an object yields the defaults.
    pub fn from_json(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// The staleness window, if `stale_seconds` is finite and positive.
    pub fn stale_window(&self) -> Option<Duration> {
        self.stale_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

/// History fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Base URL of the telemetry API (`{base_url}/history/{device}/`).
    pub base_url: String,
    /// Number of points requested per fetch.
    pub limit: u32,
    /// Read histories from `{dir}/{device}.json` instead of HTTP.
    pub dir: Option<PathBuf>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1/telemetry".to_string(),
            limit: DEFAULT_HISTORY_LIMIT,
            dir: None,
        }
    }
}

/// Staleness monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Tick period, e.g. "2s".
    pub tick: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tick: "2s".to_string(),
        }
    }
}

impl MonitorSettings {
    pub fn tick_period(&self) -> Duration {
        parse_duration(&self.tick)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_TICK)
    }
}

/// Complete settings document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub thresholds: FleetConfig,
    pub history: HistorySettings,
    pub monitor: MonitorSettings,
}

impl Settings {
    /// Load settings from an optional file plus `FLEETWATCH_*` environment variables.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("FLEETWATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let cfg = FleetConfig::default();
        assert_eq!(cfg.battery_low, Some(20.0));
        assert_eq!(cfg.rssi_low, Some(-90.0));
        assert_eq!(cfg.temp_high, Some(60.0));
        assert_eq!(cfg.stale_window(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_json_push_is_default_merged() {
        let cfg = FleetConfig::from_json(&json!({"batteryLow": 35, "staleSeconds": "30"}));
        assert_eq!(cfg.battery_low, Some(35.0));
        assert_eq!(cfg.rssi_low, Some(-90.0));
        assert_eq!(cfg.stale_window(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values_disable_checks() {
        let cfg = FleetConfig::from_json(&json!({"tempHigh": "hot", "staleSeconds": -5}));
        assert_eq!(cfg.temp_high, None);
        assert_eq!(cfg.stale_seconds, Some(-5.0));
        assert_eq!(cfg.stale_window(), None);
        assert_eq!(FleetConfig::from_json(&json!("nope")), FleetConfig::default());
    }

    #[test]
    fn test_snake_case_aliases() {
        let cfg = FleetConfig::from_json(&json!({"rssi_low": -100}));
        assert_eq!(cfg.rssi_low, Some(-100.0));
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.history.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(settings.monitor.tick_period(), DEFAULT_TICK);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[thresholds]\nbattery_low = 30\n\n[history]\nlimit = 1000\n\n[monitor]\ntick = \"500ms\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.thresholds.battery_low, Some(30.0));
        assert_eq!(settings.thresholds.temp_high, Some(60.0));
        assert_eq!(settings.history.limit, 1000);
        assert_eq!(settings.history.base_url, HistorySettings::default().base_url);
        assert_eq!(settings.monitor.tick_period(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[thresholds\nbattery_low = ").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }
}
