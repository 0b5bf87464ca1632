// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unmodified appliance state as returned by the cloud.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Raw field set for one appliance.
///
/// Field names are the cloud's (`Power`, `SetTemperature`, `VaneVertical`, ...).
/// A `RawState` is always replaced as a whole, never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawState(Map<String, Value>);

impl RawState {
    /// Sub-structure with weather data the cloud attaches to device reads.
    pub const WEATHER_OBSERVATIONS: &'static str = "WeatherObservations";

    /// Wraps a field map.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Converts a JSON response body into a raw state.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnexpectedFormat` if the body is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(ParseError::UnexpectedFormat(format!(
                "expected device state object, got {other}"
            ))),
        }
    }

    /// Returns a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a boolean field.
    #[must_use]
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Returns a numeric field.
    #[must_use]
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Returns a non-negative integer field.
    #[must_use]
    pub fn u32_field(&self, key: &str) -> Option<u32> {
        self.0
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Returns a small integer code field.
    #[must_use]
    pub fn code_field(&self, key: &str) -> Option<u8> {
        self.u32_field(key).and_then(|n| u8::try_from(n).ok())
    }

    /// Returns a string field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns the fields as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_accessors() {
        let raw = RawState::from_value(json!({
            "Power": true,
            "SetTemperature": 21.5,
            "OperationMode": 3,
            "LastCommunication": "2024-01-01T10:00:00",
            "Negative": -1
        }))
        .unwrap();

        assert_eq!(raw.bool_field("Power"), Some(true));
        assert_eq!(raw.f64_field("SetTemperature"), Some(21.5));
        assert_eq!(raw.code_field("OperationMode"), Some(3));
        assert_eq!(raw.str_field("LastCommunication"), Some("2024-01-01T10:00:00"));
        assert_eq!(raw.u32_field("Negative"), None);
        assert_eq!(raw.bool_field("Missing"), None);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(RawState::from_value(json!([1, 2])).is_err());
        assert!(RawState::from_value(Value::Null).is_err());
    }

    #[test]
    fn remove_field() {
        let mut raw = RawState::from_value(json!({ "WeatherObservations": [], "Power": false }))
            .unwrap();
        assert!(raw.remove(RawState::WEATHER_OBSERVATIONS).is_some());
        assert_eq!(raw.to_value(), json!({ "Power": false }));
    }
}
