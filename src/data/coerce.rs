//! Lenient numeric coercion for loosely-typed inbound JSON.
//!
//! Numbers and numeric strings coerce to `f64`; everything else (null,
//! booleans, empty or non-numeric strings, NaN/infinite results) is absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON value to a finite number, or `None`.
pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Coerce an optional object field to a finite number.
pub fn field(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(number)
}

/// Read a device identifier from a `device_eui` field.
///
/// Strings are trimmed and numbers are rendered in decimal. Anything else,
/// or an empty result, is `None`.
pub fn device_id(value: &Value) -> Option<String> {
    let id = match value.get("device_eui")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// Serde adapter: deserialize any value, keeping it only if it coerces to a
/// finite number.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value))
}
