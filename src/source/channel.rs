//! Channel-based telemetry source.
//!
//! Receives records through a tokio mpsc channel. This is the entry point
//! for message bus integrations, where a subscriber task pushes each decoded
//! message rather than the dashboard pulling it.

use serde_json::Value;
use tokio::sync::mpsc;

use super::{ConnectionStatus, TelemetrySource};

/// A telemetry source fed through an unbounded channel.
///
/// The source reports `Connected` while at least one sender is alive.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Value>,
    description: String,
    closed: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// * `source_description` - where records come from
    ///   (e.g. "mqtt://broker:1883/drones/+/telemetry")
    pub fn new(receiver: mpsc::UnboundedReceiver<Value>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            closed: false,
        }
    }

    /// Create a channel pair for pushing records to a `ChannelSource`.
    pub fn create(source_description: &str) -> (mpsc::UnboundedSender<Value>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, source_description))
    }
}

impl TelemetrySource for ChannelSource {
    fn poll(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(value) => out.extend(super::records(value)),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        out
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.closed.then(|| "All senders dropped".to_string())
    }

    fn status(&self) -> ConnectionStatus {
        if self.closed {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_source_drains_all_pending() {
        let (tx, mut source) = ChannelSource::create("test");
        assert!(source.poll().is_empty());

        tx.send(json!({"device_eui": "a"})).unwrap();
        tx.send(json!([{"device_eui": "b"}, {"device_eui": "c"}]))
            .unwrap();

        let records = source.poll();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["device_eui"], "c");
        assert!(source.poll().is_empty());
        assert_eq!(source.status(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_channel_source_reports_closed_sender() {
        let (tx, mut source) = ChannelSource::create("test");
        tx.send(json!({"device_eui": "a"})).unwrap();
        drop(tx);

        assert_eq!(source.poll().len(), 1);
        assert_eq!(source.status(), ConnectionStatus::Disconnected);
        assert!(source.error().is_some());
        assert_eq!(source.description(), "channel: test");
    }
}
