//! Historical point sequences and their sanitization.
//!
//! History responses are untrusted: points may be missing coordinates,
//! carry string-typed numbers, arrive out of order or repeat. [`sanitize`]
//! turns such a list into a clean sequence suitable for replay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce;

/// Two consecutive points closer than this in both axes are collapsed.
pub const COORD_EPSILON: f64 = 1e-7;

/// Default number of points requested per history fetch.
pub const DEFAULT_HISTORY_LIMIT: u32 = 500;

/// One sanitized historical observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<f64>,
}

impl HistoryPoint {
    pub fn new(ts: Option<f64>, lat: f64, lng: f64) -> Self {
        Self {
            ts,
            lat,
            lng,
            temp: None,
            battery: None,
            rssi: None,
        }
    }

    /// Coerce a raw record, rejecting it when either coordinate is not finite.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            ts: coerce::field(value, "ts"),
            lat: coerce::field(value, "lat")?,
            lng: coerce::field(value, "lng")?,
            temp: coerce::field(value, "temp"),
            battery: coerce::field(value, "battery"),
            rssi: coerce::field(value, "rssi"),
        })
    }

    /// True when both coordinate deltas to `other` are below [`COORD_EPSILON`].
    pub fn is_near(&self, other: &HistoryPoint) -> bool {
        (self.lat - other.lat).abs() < COORD_EPSILON && (self.lng - other.lng).abs() < COORD_EPSILON
    }
}

/// Clean, sort and deduplicate a raw history list.
///
/// 1. Records without finite `lat`/`lng` are dropped; a bad `ts` is kept as absent.
/// 2. Points are stably sorted by `ts`. A point without `ts` keeps its place
///    behind the timestamped point that preceded it (leading ones stay first).
/// 3. Consecutive near-duplicates are collapsed to the earlier point.
///
/// The result is a fixed point: sanitizing it again yields the same sequence.
pub fn sanitize(raw: &[Value]) -> Vec<HistoryPoint> {
    sanitize_points(raw.iter().filter_map(HistoryPoint::from_value).collect())
}

/// Sort and deduplicate already-coerced points.
pub fn sanitize_points(points: Vec<HistoryPoint>) -> Vec<HistoryPoint> {
    let mut inherited = f64::NEG_INFINITY;
    let mut keyed: Vec<(f64, HistoryPoint)> = points
        .into_iter()
        .map(|p| {
            if let Some(ts) = p.ts {
                inherited = ts;
            }
            (inherited, p)
        })
        .collect();

    // Stable: equal keys keep their original relative order
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut out: Vec<HistoryPoint> = Vec::with_capacity(keyed.len());
    for (_, point) in keyed {
        if out.last().is_some_and(|last| last.is_near(&point)) {
            continue;
        }
        out.push(point);
    }
    out
}

/// Parameters of a history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub device_id: String,
    pub limit: u32,
    /// Lower bound, epoch seconds.
    pub from: Option<i64>,
    /// Upper bound, epoch seconds.
    pub to: Option<i64>,
}

impl HistoryQuery {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            limit: DEFAULT_HISTORY_LIMIT,
            from: None,
            to: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn range(mut self, from: Option<i64>, to: Option<i64>) -> Self {
        self.from = from;
        self.to = to;
        self
    }
}

/// A history response, with the raw points left unsanitized.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryResponse {
    pub device_id: String,
    pub count: Option<u64>,
    pub history: Vec<Value>,
}

impl HistoryResponse {
    /// Permissive parse of `{device_eui, count, history: [...]}`.
    ///
    /// A missing or non-array `history` is treated as empty.
    pub fn from_value(value: &Value) -> Self {
        Self {
            device_id: coerce::device_id(value).unwrap_or_default(),
            count: value.get("count").and_then(Value::as_u64),
            history: value.get("history").and_then(Value::as_array).cloned().unwrap_or_default(),
        }
    }

    pub fn points(&self) -> Vec<HistoryPoint> {
        sanitize(&self.history)
    }
}
