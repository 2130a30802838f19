//! History fetch collaborators.
//!
//! A [`HistoryClient`] answers a [`HistoryQuery`] with the raw response; the
//! dashboard sanitizes it. [`HistoryLoader`] runs fetches in the background
//! and hands back only the result of the most recent request.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::data::{coerce, HistoryQuery, HistoryResponse};
use crate::error::FetchError;

/// Default timeout for a history fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a device's recorded history.
#[async_trait]
pub trait HistoryClient: Send + Sync + Debug {
    async fn fetch(&self, query: &HistoryQuery) -> Result<HistoryResponse, FetchError>;

    /// Human-readable description of where history comes from.
    fn description(&self) -> String;
}

/// HTTP client for `GET {base}/history/{device}/?limit=N[&from=..][&to=..]`.
#[derive(Debug, Clone)]
pub struct HttpHistoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build the request URL for a query.
    pub fn history_url(&self, query: &HistoryQuery) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Http(format!("invalid base URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| FetchError::Http(format!("base URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["history", query.device_id.as_str(), ""]);

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(from) = query.from {
                pairs.append_pair("from", &from.to_string());
            }
            if let Some(to) = query.to {
                pairs.append_pair("to", &to.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl HistoryClient for HttpHistoryClient {
    async fn fetch(&self, query: &HistoryQuery) -> Result<HistoryResponse, FetchError> {
        let url = self.history_url(query)?;
        debug!("Fetching history from {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: Value = response.json().await?;
        Ok(HistoryResponse::from_value(&body))
    }

    fn description(&self) -> String {
        format!("http: {}", self.base_url)
    }
}

/// Reads `{dir}/{device}.json`, holding either a full response document or
/// a bare array of points.
#[derive(Debug, Clone)]
pub struct FileHistoryClient {
    dir: PathBuf,
}

impl FileHistoryClient {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, device_id: &str) -> Result<PathBuf, FetchError> {
        if device_id.is_empty() || device_id.contains(['/', '\\']) || device_id.starts_with('.') {
            return Err(FetchError::Io(format!("invalid device id {:?}", device_id)));
        }
        Ok(self.dir.join(format!("{}.json", device_id)))
    }
}

#[async_trait]
impl HistoryClient for FileHistoryClient {
    async fn fetch(&self, query: &HistoryQuery) -> Result<HistoryResponse, FetchError> {
        let path = self.path_for(&query.device_id)?;
        let content = tokio::fs::read_to_string(&path).await?;
        let body: Value = serde_json::from_str(&content)?;

        let mut response = match body {
            Value::Array(points) => HistoryResponse {
                device_id: query.device_id.clone(),
                count: None,
                history: points,
            },
            other => HistoryResponse::from_value(&other),
        };
        if response.device_id.is_empty() {
            response.device_id = query.device_id.clone();
        }

        apply_query(&mut response.history, query);
        response.count = Some(response.history.len() as u64);
        Ok(response)
    }

    fn description(&self) -> String {
        format!("dir: {}", self.dir.display())
    }
}

/// Range filter and limit, as the history server applies them.
///
/// Records without a numeric `ts` are kept by the range filter. The limit
/// keeps the most recent records.
fn apply_query(history: &mut Vec<Value>, query: &HistoryQuery) {
    if query.from.is_some() || query.to.is_some() {
        history.retain(|record| {
            let Some(ts) = coerce::field(record, "ts") else {
                return true;
            };
            query.from.is_none_or(|from| ts >= from as f64)
                && query.to.is_none_or(|to| ts <= to as f64)
        });
    }
    let limit = query.limit as usize;
    if history.len() > limit {
        history.drain(..history.len() - limit);
    }
}

type LoadResult = (u64, String, Result<HistoryResponse, FetchError>);

/// Runs history fetches in the background.
///
/// Every request supersedes the previous one: results of older requests are
/// dropped when they arrive.
#[derive(Debug)]
pub struct HistoryLoader {
    client: Arc<dyn HistoryClient>,
    handle: Handle,
    limit: u32,
    timeout: Duration,
    generation: u64,
    tx: mpsc::UnboundedSender<LoadResult>,
    rx: mpsc::UnboundedReceiver<LoadResult>,
}

impl HistoryLoader {
    pub fn new(client: Arc<dyn HistoryClient>, handle: Handle, limit: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            handle,
            limit,
            timeout: DEFAULT_FETCH_TIMEOUT,
            generation: 0,
            tx,
            rx,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn description(&self) -> String {
        self.client.description()
    }

    /// Start fetching the history of `device_id`.
    pub fn request(&mut self, device_id: &str) {
        self.generation += 1;
        let generation = self.generation;
        let query = HistoryQuery::new(device_id).limit(self.limit);
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let timeout = self.timeout;

        self.handle.spawn(async move {
            let result = match tokio::time::timeout(timeout, client.fetch(&query)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };
            let _ = tx.send((generation, query.device_id, result));
        });
    }

    /// Invalidate any request in flight.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Return the result of the latest request, if it has arrived.
    pub fn poll(&mut self) -> Option<(String, Result<HistoryResponse, FetchError>)> {
        let mut latest = None;
        while let Ok((generation, device_id, result)) = self.rx.try_recv() {
            if generation == self.generation {
                latest = Some((device_id, result));
            } else {
                debug!(device = %device_id, "Dropping superseded history result");
            }
        }
        latest
    }
}
