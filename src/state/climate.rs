// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized climate records.

use serde::{Deserialize, Serialize};

use crate::codec::{FanSpeed, OperationMode, VaneAxis, VanePosition};
use crate::diff::{Diff, DiffBuilder};

use super::RawState;

/// Settings of an appliance: what it is asked to do.
///
/// Every field is optional; a field the appliance does not report (or reports
/// with an unmapped code) is `None` and left out of the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    /// Whether the unit is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    /// Target temperature in °C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    /// Fan speed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan: Option<FanSpeed>,
    /// Operating mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<OperationMode>,
    /// Left/right vane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<VanePosition>,
    /// Up/down vane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VanePosition>,
}

impl ClimateState {
    /// Decodes the settings from a raw state.
    #[must_use]
    pub fn from_raw(raw: &RawState) -> Self {
        let speeds = raw.u32_field("NumberOfFanSpeeds").unwrap_or(0);

        Self {
            power: raw.bool_field("Power"),
            target: raw.f64_field("SetTemperature"),
            fan: raw
                .u32_field("SetFanSpeed")
                .and_then(|code| FanSpeed::decode(code, speeds)),
            mode: raw
                .code_field("OperationMode")
                .and_then(OperationMode::from_code),
            horizontal: raw
                .code_field("VaneHorizontal")
                .and_then(|code| VaneAxis::HORIZONTAL.decode(code)),
            vertical: raw
                .code_field("VaneVertical")
                .and_then(|code| VaneAxis::VERTICAL.decode(code)),
        }
    }

    /// Returns the fields that differ in `next`.
    #[must_use]
    pub fn diff(&self, next: &Self) -> Diff {
        let mut builder = DiffBuilder::new();
        self.record_changes(&mut builder, next);
        builder.finish()
    }

    fn record_changes(&self, builder: &mut DiffBuilder, next: &Self) {
        builder
            .field("power", &self.power, &next.power)
            .field("target", &self.target, &next.target)
            .field("fan", &self.fan, &next.fan)
            .field("mode", &self.mode, &next.mode)
            .field("horizontal", &self.horizontal, &next.horizontal)
            .field("vertical", &self.vertical, &next.vertical);
    }
}

/// Everything the appliance reports, decoded from one raw state.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedState {
    /// Whether the unit is reachable by the cloud.
    pub online: bool,
    /// `false` while a command is still waiting to be delivered to the unit.
    pub in_sync: bool,
    /// Room temperature in °C.
    pub temperature: Option<f64>,
    /// Current settings.
    pub state: ClimateState,
}

impl NormalizedState {
    /// Decodes a raw state.
    #[must_use]
    pub fn from_raw(raw: &RawState) -> Self {
        Self {
            online: !raw.bool_field("Offline").unwrap_or(false),
            in_sync: !raw.bool_field("HasPendingCommand").unwrap_or(false),
            temperature: raw.f64_field("RoomTemperature"),
            state: ClimateState::from_raw(raw),
        }
    }
}

/// Observed condition of an appliance.
///
/// Carries the settings that are confirmed by the unit: while a command is
/// pending, the settings of the previous status are kept instead of the
/// in-flight readback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateStatus {
    /// Whether the unit is reachable by the cloud.
    pub online: bool,
    /// Room temperature in °C.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Confirmed settings, absent until the unit first confirms any.
    #[serde(flatten)]
    pub settings: Option<ClimateState>,
}

impl ClimateStatus {
    /// Derives the status from a fresh normalized state and the previous status.
    #[must_use]
    pub fn derive(next: &NormalizedState, previous: Option<&Self>) -> Self {
        let settings = if next.in_sync {
            Some(next.state.clone())
        } else {
            previous.and_then(|status| status.settings.clone())
        };

        Self {
            online: next.online,
            temperature: next.temperature,
            settings,
        }
    }

    /// Returns the fields that differ in `next`.
    ///
    /// Settings are compared field by field, a missing settings block counting
    /// as every setting being unset.
    #[must_use]
    pub fn diff(&self, next: &Self) -> Diff {
        let unset = ClimateState::default();
        let mut builder = DiffBuilder::new();

        builder
            .field("online", &self.online, &next.online)
            .field("temperature", &self.temperature, &next.temperature);

        self.settings
            .as_ref()
            .unwrap_or(&unset)
            .record_changes(&mut builder, next.settings.as_ref().unwrap_or(&unset));

        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn raw(value: Value) -> RawState {
        RawState::from_value(value).unwrap()
    }

    #[test]
    fn decodes_sentinels_and_mode() {
        let state = ClimateState::from_raw(&raw(json!({
            "OperationMode": 1,
            "SetFanSpeed": 0,
            "NumberOfFanSpeeds": 5,
            "VaneVertical": 0,
            "VaneHorizontal": 12
        })));

        assert_eq!(state.mode, Some(OperationMode::Heat));
        assert_eq!(state.fan, Some(FanSpeed::Auto));
        assert_eq!(state.vertical, Some(VanePosition::Auto));
        assert_eq!(state.horizontal, Some(VanePosition::Swing));
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({ "mode": "heat", "fan": "auto", "vertical": "auto", "horizontal": "swing" })
        );
    }

    #[test]
    fn decodes_fractions() {
        let state = ClimateState::from_raw(&raw(json!({
            "Power": true,
            "SetTemperature": 22.5,
            "SetFanSpeed": 3,
            "NumberOfFanSpeeds": 5,
            "VaneVertical": 2,
            "VaneHorizontal": 5
        })));

        assert_eq!(state.power, Some(true));
        assert_eq!(state.target, Some(22.5));
        assert_eq!(state.fan, Some(FanSpeed::Fraction(0.6)));
        assert_eq!(state.vertical, Some(VanePosition::Fraction(0.25)));
        assert_eq!(state.horizontal, Some(VanePosition::Fraction(1.0)));
    }

    #[test]
    fn unmapped_codes_are_unset() {
        let state = ClimateState::from_raw(&raw(json!({
            "OperationMode": 5,
            "VaneVertical": 6,
            "SetFanSpeed": 2
        })));

        assert_eq!(state.mode, None);
        assert_eq!(state.vertical, None);
        assert_eq!(state.fan, None);
    }

    #[test]
    fn normalized_flags() {
        let normalized = NormalizedState::from_raw(&raw(json!({
            "Offline": false,
            "HasPendingCommand": true,
            "RoomTemperature": 19.0
        })));

        assert!(normalized.online);
        assert!(!normalized.in_sync);
        assert_eq!(normalized.temperature, Some(19.0));

        let empty = NormalizedState::from_raw(&RawState::default());
        assert!(empty.online);
        assert!(empty.in_sync);
    }

    #[test]
    fn status_takes_fresh_settings_when_in_sync() {
        let normalized = NormalizedState::from_raw(&raw(json!({
            "Power": true,
            "RoomTemperature": 20.0,
            "HasPendingCommand": false
        })));

        let status = ClimateStatus::derive(&normalized, None);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "online": true, "temperature": 20.0, "power": true })
        );
    }

    #[test]
    fn status_keeps_previous_settings_while_pending() {
        let confirmed = NormalizedState::from_raw(&raw(json!({
            "Power": true,
            "SetTemperature": 21.0,
            "RoomTemperature": 20.0
        })));
        let previous = ClimateStatus::derive(&confirmed, None);

        let pending = NormalizedState::from_raw(&raw(json!({
            "Power": true,
            "SetTemperature": 25.0,
            "RoomTemperature": 20.5,
            "HasPendingCommand": true
        })));
        let status = ClimateStatus::derive(&pending, Some(&previous));

        assert_eq!(status.temperature, Some(20.5));
        assert_eq!(status.settings.as_ref().unwrap().target, Some(21.0));
    }

    #[test]
    fn status_without_previous_while_pending_has_no_settings() {
        let pending = NormalizedState::from_raw(&raw(json!({
            "Power": true,
            "HasPendingCommand": true
        })));
        let status = ClimateStatus::derive(&pending, None);

        assert!(status.settings.is_none());
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({ "online": true }));
    }

    #[test]
    fn state_diff_lists_changed_fields() {
        let before = ClimateState {
            power: Some(true),
            target: Some(21.0),
            ..ClimateState::default()
        };
        let after = ClimateState {
            power: Some(true),
            target: Some(22.0),
            fan: Some(FanSpeed::Auto),
            ..ClimateState::default()
        };

        assert_eq!(
            Value::Object(before.diff(&after)),
            json!({ "target": 22.0, "fan": "auto" })
        );
        assert!(after.diff(&after).is_empty());
    }

    #[test]
    fn status_diff_compares_settings_field_by_field() {
        let before = ClimateStatus {
            online: true,
            temperature: Some(20.0),
            settings: None,
        };
        let after = ClimateStatus {
            online: true,
            temperature: Some(20.0),
            settings: Some(ClimateState {
                mode: Some(OperationMode::Cool),
                ..ClimateState::default()
            }),
        };

        assert_eq!(Value::Object(before.diff(&after)), json!({ "mode": "cool" }));
        assert_eq!(Value::Object(after.diff(&before)), json!({ "mode": null }));
        assert!(before.diff(&before).is_empty());
    }
}
