//! Telemetry sample model.
//!
//! Normalizes raw inbound records (`{device_eui, lat, lng, battery?, rssi?,
//! temp?, ts?}`) into a closed, typed [`TelemetrySample`]. Individual fields
//! that fail numeric coercion are treated as absent rather than rejecting
//! the record; only a missing device id rejects it.

use serde_json::Value;

use super::coerce;
use crate::error::SampleError;

/// One inbound observation for a device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetrySample {
    /// Device identifier, trimmed and non-empty.
    pub device_id: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Battery level in percent.
    pub battery: Option<f64>,
    /// Received signal strength in dBm.
    pub rssi: Option<f64>,
    /// Temperature in °C.
    pub temp: Option<f64>,
    /// Self-reported sample time in epoch seconds.
    pub ts: Option<f64>,
}

impl TelemetrySample {
    /// Create a sample with only a device id set.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// Parse a sample from a JSON string.
    pub fn parse(content: &str) -> Result<Self, SampleError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| SampleError::Json(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validate a loosely-typed JSON record into a sample.
    pub fn from_value(value: &Value) -> Result<Self, SampleError> {
        if !value.is_object() {
            return Err(SampleError::NotAnObject);
        }

        let device_id = coerce::device_id(value).ok_or(SampleError::MissingDeviceId)?;

        Ok(Self {
            device_id,
            lat: coerce::field(value, "lat"),
            lng: coerce::field(value, "lng"),
            battery: coerce::field(value, "battery"),
            rssi: coerce::field(value, "rssi"),
            temp: coerce::field(value, "temp"),
            ts: coerce::field(value, "ts"),
        })
    }

    /// True when both coordinates are present.
    pub fn has_position(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let sample = TelemetrySample::from_value(&json!({
            "device_eui": "70B3D57ED0074DF2",
            "lat": 14.69,
            "lng": -17.44,
            "battery": 87,
            "rssi": -71,
            "temp": 31.5,
            "ts": 1_700_000_000
        }))
        .unwrap();

        assert_eq!(sample.device_id, "70B3D57ED0074DF2");
        assert_eq!(sample.lat, Some(14.69));
        assert_eq!(sample.lng, Some(-17.44));
        assert_eq!(sample.battery, Some(87.0));
        assert_eq!(sample.rssi, Some(-71.0));
        assert_eq!(sample.temp, Some(31.5));
        assert_eq!(sample.ts, Some(1_700_000_000.0));
        assert!(sample.has_position());
    }

    #[test]
    fn test_device_id_is_trimmed() {
        let sample = TelemetrySample::from_value(&json!({"device_eui": "  abc  "})).unwrap();
        assert_eq!(sample.device_id, "abc");
        assert!(!sample.has_position());
    }

    #[test]
    fn test_missing_or_blank_device_id_is_rejected() {
        assert_eq!(
            TelemetrySample::from_value(&json!({"lat": 1.0})),
            Err(SampleError::MissingDeviceId)
        );
        assert_eq!(
            TelemetrySample::from_value(&json!({"device_eui": "   "})),
            Err(SampleError::MissingDeviceId)
        );
        assert_eq!(
            TelemetrySample::from_value(&json!({"device_eui": null})),
            Err(SampleError::MissingDeviceId)
        );
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert_eq!(TelemetrySample::from_value(&json!([1, 2])), Err(SampleError::NotAnObject));
        assert_eq!(TelemetrySample::from_value(&json!("x")), Err(SampleError::NotAnObject));
    }

    #[test]
    fn test_invalid_fields_become_absent() {
        let sample = TelemetrySample::from_value(&json!({
            "device_eui": "d1",
            "lat": "not a number",
            "lng": "12.5",
            "battery": null,
            "rssi": true,
            "temp": {}
        }))
        .unwrap();

        assert_eq!(sample.lat, None);
        assert_eq!(sample.lng, Some(12.5));
        assert_eq!(sample.battery, None);
        assert_eq!(sample.rssi, None);
        assert_eq!(sample.temp, None);
        assert_eq!(sample.ts, None);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(TelemetrySample::parse("not json"), Err(SampleError::Json(_))));
    }
}
