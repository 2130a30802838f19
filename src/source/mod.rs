//! Ingestion sources and external collaborators.
//!
//! Telemetry arrives through a [`TelemetrySource`]: raw JSON records pushed
//! from a message bus, read from a byte stream, or sent over an in-memory
//! channel. Records are left untyped here; validation happens when the
//! dashboard ingests them.
//!
//! The module also holds the settings hot reload ([`SettingsFile`]) and the
//! history fetch collaborators ([`HistoryClient`] and [`HistoryLoader`]).

mod channel;
mod history;
mod settings;
mod stream;

pub use channel::ChannelSource;
pub use history::{FileHistoryClient, HistoryClient, HistoryLoader, HttpHistoryClient};
pub use settings::SettingsFile;
pub use stream::StreamSource;

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Connection state of an ingestion source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Trait for receiving raw telemetry records from various sources.
///
/// # Example
///
/// ```
/// use fleetwatch::{ChannelSource, TelemetrySource};
/// use serde_json::json;
///
/// let (tx, mut source) = ChannelSource::create("mqtt://broker");
/// tx.send(json!({"device_eui": "70B3D57E", "lat": 14.69, "lng": -17.44})).unwrap();
///
/// let records = source.poll();
/// assert_eq!(records.len(), 1);
/// ```
pub trait TelemetrySource: Send + Debug {
    /// Drain every record received since the last poll.
    ///
    /// This method must not block.
    fn poll(&mut self) -> Vec<Value>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the header.
    fn description(&self) -> &str;

    /// The most recent transport or framing error, if any.
    fn error(&self) -> Option<String>;

    fn status(&self) -> ConnectionStatus;
}

/// Status and error slot shared between a source and its reader task.
#[derive(Debug, Clone, Default)]
struct SharedState {
    inner: Arc<Mutex<(ConnectionStatus, Option<String>)>>,
}

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, (ConnectionStatus, Option<String>)> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.lock().0 = status;
    }

    fn set_error(&self, error: Option<String>) {
        self.lock().1 = error;
    }

    fn disconnect(&self, reason: &str) {
        *self.lock() = (ConnectionStatus::Disconnected, Some(reason.to_string()));
    }

    fn status(&self) -> ConnectionStatus {
        self.lock().0
    }

    fn error(&self) -> Option<String> {
        self.lock().1.clone()
    }
}

/// Split one decoded message into records: an array yields its elements.
fn records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}
