//! Error types for ingestion and history fetching.

use thiserror::Error;

/// Reasons an inbound telemetry record is rejected.
///
/// A rejected record causes no state change; it is discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The payload was not a JSON object.
    #[error("telemetry payload is not an object")]
    NotAnObject,

    /// `device_eui` was missing or empty after trimming.
    #[error("telemetry payload has no device id")]
    MissingDeviceId,

    /// The payload was not valid JSON.
    #[error("invalid telemetry JSON: {0}")]
    Json(String),
}

/// Errors that can occur when fetching a device's history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Server answered with a non-success status code.
    #[error("History server returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("Failed to parse history response: {0}")]
    Parse(String),

    /// Failed to read a local history file.
    #[error("Failed to read history: {0}")]
    Io(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("History request timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}
