//! Data models and pure processing for fleet telemetry.
//!
//! This module turns untrusted inbound records into typed values and holds
//! the live device registry.
//!
//! ## Submodules
//!
//! - [`coerce`]: Lenient finite-number coercion shared by every parser
//! - [`sample`]: [`TelemetrySample`] validation of inbound records
//! - [`fleet`]: The live cache ([`FleetState`], [`DeviceState`])
//! - [`selection`]: Search filtering and the operator-visible [`FleetView`]
//! - [`history`]: [`HistoryPoint`] sequences and [`sanitize`]
//! - [`position`]: The "current position" output ([`Position`])
//! - [`alerts`]: Threshold evaluation ([`evaluate`])
//! - [`trail`]: Live track and metric series of the selected device
//! - [`duration`]: Parsing and formatting of intervals and ages
//!
//! ## Data Flow
//!
//! ```text
//! raw JSON ──▶ TelemetrySample::from_value() ──▶ FleetState::ingest()
//!                                                     │
//!                                                     ├──▶ sorted device list (watch)
//!                                                     └──▶ FleetView::derive()
//!
//! history response ──▶ sanitize() ──▶ ReplayEngine
//! ```

pub mod alerts;
pub mod coerce;
pub mod duration;
pub mod fleet;
pub mod history;
pub mod position;
pub mod sample;
pub mod selection;
pub mod trail;

pub use alerts::{evaluate, Alert, AlertKind, AlertLevel, MAX_ALERTS};
pub use fleet::{DeviceState, FleetState, IngestOutcome, LastKnown};
pub use history::{sanitize, HistoryPoint, HistoryQuery, HistoryResponse, COORD_EPSILON};
pub use position::{Origin, Position};
pub use sample::TelemetrySample;
pub use selection::{filter_devices, matches_query, normalize_query, FleetView};
pub use trail::{Metric, Trail};
