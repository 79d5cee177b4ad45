//! Forecast payload passed through from the upstream API.
//!
//! The proxy never reshapes the upstream JSON. The only structural
//! requirement is that the body is a JSON object; the accessors below are
//! conveniences for logging and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FetchError;

/// Upstream forecast document, serialized exactly as received.
///
/// # Example
/// ```text
/// {
///   "latitude": 52.52,
///   "longitude": 13.41,
///   "current": { "temperature_2m": 15.5 },
///   "hourly": { "temperature_2m": [14.0, 15.0, 15.5] }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherPayload(Map<String, Value>);

impl WeatherPayload {
    /// Wraps an already-decoded JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decodes a raw upstream body.
    ///
    /// Fails with [`FetchError::Parse`] unless the body is a JSON object.
    pub fn from_slice(body: &[u8]) -> std::result::Result<Self, FetchError> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(Self(fields)),
            Ok(other) => Err(FetchError::Parse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(FetchError::Parse(e.to_string())),
        }
    }

    /// Latitude echoed by the upstream.
    pub fn latitude(&self) -> Option<f64> {
        self.0.get("latitude").and_then(Value::as_f64)
    }

    /// Longitude echoed by the upstream.
    pub fn longitude(&self) -> Option<f64> {
        self.0.get("longitude").and_then(Value::as_f64)
    }

    /// `current.temperature_2m`.
    pub fn current_temperature(&self) -> Option<f64> {
        self.0
            .get("current")
            .and_then(|c| c.get("temperature_2m"))
            .and_then(Value::as_f64)
    }

    /// `hourly.temperature_2m`, skipping any non-numeric samples.
    pub fn hourly_temperatures(&self) -> Option<Vec<f64>> {
        self.0
            .get("hourly")
            .and_then(|h| h.get("temperature_2m"))
            .and_then(Value::as_array)
            .map(|samples| samples.iter().filter_map(Value::as_f64).collect())
    }

    /// True when every field clients rely on is present.
    pub fn has_required_fields(&self) -> bool {
        self.latitude().is_some()
            && self.longitude().is_some()
            && self.current_temperature().is_some()
            && self.hourly_temperatures().is_some()
    }

    /// Borrows the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwraps into the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for WeatherPayload {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn berlin() -> WeatherPayload {
        serde_json::from_value(json!({
            "latitude": 52.52,
            "longitude": 13.41,
            "generationtime_ms": 0.05,
            "current": { "time": "2026-10-16T12:00", "temperature_2m": 15.5 },
            "hourly": { "temperature_2m": [14.0, 15.0, 15.5] }
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let payload = berlin();
        assert_eq!(payload.latitude(), Some(52.52));
        assert_eq!(payload.longitude(), Some(13.41));
        assert_eq!(payload.current_temperature(), Some(15.5));
        assert_eq!(payload.hourly_temperatures(), Some(vec![14.0, 15.0, 15.5]));
        assert!(payload.has_required_fields());
    }

    #[test]
    fn test_serializes_verbatim() {
        let raw = br#"{"latitude":52.52,"longitude":13.41,"extra":{"nested":[1,2,3]}}"#;
        let payload = WeatherPayload::from_slice(raw).unwrap();
        let round: Value = serde_json::to_value(&payload).unwrap();
        let original: Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(round, original);
    }

    #[test]
    fn test_missing_fields() {
        let payload = WeatherPayload::from_slice(br#"{"latitude": 52.52}"#).unwrap();
        assert_eq!(payload.current_temperature(), None);
        assert_eq!(payload.hourly_temperatures(), None);
        assert!(!payload.has_required_fields());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = WeatherPayload::from_slice(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, FetchError::Parse(ref m) if m.contains("array")));
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = WeatherPayload::from_slice(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
