//! Stream-based telemetry source.
//!
//! Receives newline-delimited JSON records from an async byte stream such as
//! a TCP connection, a bridge process's stdout, or a replayed capture file.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{records, ConnectionStatus, SharedState, TelemetrySource};

/// A telemetry source that reads NDJSON from an async stream.
///
/// A background task reads the stream line by line and forwards each decoded
/// record; `poll()` drains them without blocking. A line that is not valid
/// JSON is skipped and recorded as the last error.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use fleetwatch::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"device_eui\":\"d1\",\"lat\":1.0,\"lng\":2.0}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<Value>,
    description: String,
    shared: SharedState,
}

impl StreamSource {
    /// Spawn a background task that reads from the given async reader.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let shared = SharedState::default();
        shared.set_status(ConnectionStatus::Connected);
        let handle = shared.clone();

        tokio::spawn(async move {
            read_lines(reader, tx, handle).await;
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            shared,
        }
    }

    /// Connect to a TCP endpoint (`host:port`) and read NDJSON from it.
    ///
    /// The source is `Connecting` until the connection is established.
    pub fn connect(addr: &str) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let shared = SharedState::default();
        shared.set_status(ConnectionStatus::Connecting);
        let handle = shared.clone();
        let target = addr.to_string();

        tokio::spawn(async move {
            match TcpStream::connect(&target).await {
                Ok(stream) => {
                    info!("Connected to telemetry stream at {}", target);
                    handle.set_status(ConnectionStatus::Connected);
                    read_lines(stream, tx, handle).await;
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", target, e);
                    handle.disconnect(&format!("Connect error: {}", e));
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("tcp: {}", addr),
            shared,
        }
    }

    /// Create a StreamSource from a raw bytes channel.
    ///
    /// Each message is one JSON document (an object or an array of objects),
    /// as delivered by a message bus client.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, record_rx) = mpsc::channel(256);
        let shared = SharedState::default();
        shared.set_status(ConnectionStatus::Connected);
        let handle = shared.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => {
                        handle.set_error(None);
                        for record in records(value) {
                            if tx.send(record).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => handle.set_error(Some(format!("Parse error: {}", e))),
                }
            }
            handle.disconnect("Channel closed");
        });

        Self {
            receiver: record_rx,
            description: format!("stream: {}", description),
            shared,
        }
    }
}

async fn read_lines<R>(reader: R, tx: mpsc::Sender<Value>, shared: SharedState)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        // Invalid UTF-8 fails JSON decoding like any other malformed line
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                shared.disconnect("Connection closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_ascii();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<Value>(trimmed) {
                    Ok(value) => {
                        shared.set_error(None);
                        for record in records(value) {
                            if tx.send(record).await.is_err() {
                                // Receiver dropped
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Skipping malformed line: {}", e);
                        shared.set_error(Some(format!("Parse error: {}", e)));
                    }
                }
            }
            Err(e) => {
                shared.disconnect(&format!("Read error: {}", e));
                break;
            }
        }
    }
}

impl TelemetrySource for StreamSource {
    fn poll(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(value) = self.receiver.try_recv() {
            out.push(value);
        }
        out
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        self.shared.error()
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn sample_json(id: &str) -> String {
        format!(r#"{{"device_eui":"{}","lat":14.69,"lng":-17.44,"battery":87}}"#, id)
    }

    #[tokio::test]
    async fn test_stream_source_reads_lines() {
        let data = format!("{}\n\n{}\n", sample_json("a"), sample_json("b"));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(Duration::from_millis(50)).await;

        let records = source.poll();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["device_eui"], "b");
        assert!(source.poll().is_empty());
    }

    #[tokio::test]
    async fn test_stream_source_eof_disconnects() {
        let mut source = StreamSource::spawn(Cursor::new(""), "test");

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(source.poll().is_empty());
        assert_eq!(source.status(), ConnectionStatus::Disconnected);
        assert_eq!(source.error().as_deref(), Some("Connection closed"));
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_json() {
        let data = format!("not valid json\n{}\n", sample_json("a"));
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(source.poll().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_utf8() {
        let mut data = b"{\"device_eui\":\"d1\",\"note\":\"\xff\xfe\"}\n".to_vec();
        data.extend_from_slice(b"{\"device_eui\":\"d2\"}\r\n{\"device_eui\":\"d3\"}\n");
        let mut source = StreamSource::spawn(Cursor::new(data), "test");

        tokio::time::sleep(Duration::from_millis(50)).await;

        let records = source.poll();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["device_eui"], "d2");
        assert_eq!(records[1]["device_eui"], "d3");
        // Stream ran on to its end rather than failing on the bad bytes
        assert_eq!(source.error().as_deref(), Some("Connection closed"));
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let source = StreamSource::spawn(Cursor::new(""), "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_source_from_bytes_channel() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut source = StreamSource::from_bytes_channel(rx, "mqtt");

        tx.send(sample_json("a").into_bytes()).await.unwrap();
        tx.send(b"{oops".to_vec()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(source.poll().len(), 1);
        assert!(source.error().unwrap().contains("Parse error"));
        assert_eq!(source.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_connect_starts_connecting() {
        let source = StreamSource::connect("127.0.0.1:1");
        assert_eq!(source.description(), "tcp: 127.0.0.1:1");
        assert_eq!(source.status(), ConnectionStatus::Connecting);
    }
}
