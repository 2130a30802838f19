//! # fleetwatch
//!
//! An operator dashboard and library for monitoring a fleet of
//! telemetry-emitting field devices.
//!
//! Devices push small JSON samples (position, battery, signal strength,
//! temperature). The crate keeps a live cache of every device, classifies
//! each as active or inactive by how recently it was heard from, evaluates
//! alerts on the selected device, and replays a device's recorded history
//! at adjustable speed.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌─────────┐    ┌───────────┐    ┌──────────┐    ┌─────────┐ │
//! │  │  app    │───▶│ dashboard │───▶│    ui    │───▶│Terminal │ │
//! │  │ (state) │    │ (session) │    │(rendering)    │         │ │
//! │  └────┬────┘    └─────┬─────┘    └──────────┘    └─────────┘ │
//! │       │               │                                      │
//! │       ▼               ▼                                      │
//! │  ┌─────────┐    ┌───────────┐                                │
//! │  │ source  │    │data/engine│◀── FleetState | ReplayEngine   │
//! │  │ (input) │    │  (core)   │    StalenessMonitor | alerts    │
//! │  └─────────┘    └───────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`data`]**: Sample validation, the fleet cache, search filtering,
//!   history sanitization, alert evaluation
//! - **[`engine`]**: Timer-driven components (staleness monitor, replay)
//! - **[`dashboard`]**: The [`Dashboard`] session object that wires the core
//!   together and publishes its outputs on `watch` channels
//! - **[`source`]**: Ingestion ([`TelemetrySource`]), settings hot reload,
//!   and history fetch
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The terminal dashboard
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Read NDJSON telemetry from stdin
//! bridge | fleetwatch
//!
//! # Connect to a TCP endpoint and fetch history over HTTP
//! fleetwatch --connect localhost:9000 --history-url http://localhost:8000/v1/telemetry
//!
//! # Log fleet changes instead of drawing
//! fleetwatch --connect localhost:9000 --headless
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use fleetwatch::{Dashboard, FleetConfig, ManualClock};
//! use serde_json::json;
//!
//! let clock = ManualClock::new(1_700_000_000_000);
//! let mut dashboard =
//!     Dashboard::new(Arc::new(clock.clone()), FleetConfig::default(), Duration::from_secs(2));
//!
//! dashboard
//!     .ingest(&json!({"device_eui": "pump-7", "lat": 14.69, "lng": -17.44, "battery": 12}))
//!     .unwrap();
//! assert_eq!(dashboard.selected().as_deref(), Some("pump-7"));
//! assert_eq!(dashboard.alerts().len(), 1);
//!
//! // Eleven seconds of silence makes the device inactive
//! clock.advance(Duration::from_secs(11));
//! dashboard.tick();
//! assert_eq!(dashboard.view().active, 0);
//! ```

pub mod app;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FleetConfig, Settings};
pub use dashboard::{Dashboard, HistoryState, TickOutcome};
pub use data::{
    Alert, AlertKind, AlertLevel, DeviceState, FleetState, FleetView, HistoryPoint, HistoryQuery,
    HistoryResponse, Origin, Position, TelemetrySample,
};
pub use engine::{Emission, ReplayEngine, ReplayState, Speed};
pub use error::{FetchError, SampleError};
pub use source::{
    ChannelSource, ConnectionStatus, FileHistoryClient, HistoryClient, HistoryLoader,
    HttpHistoryClient, SettingsFile, StreamSource, TelemetrySource,
};
