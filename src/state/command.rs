// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Requested setting changes and their cloud encoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::codec::{FanSpeed, OperationMode, VaneAxis, VanePosition};
use crate::diff::strict_eq;
use crate::event::DeviceId;

use super::{Ability, RawState};

/// Bitmask telling the cloud that every settable field of the payload applies.
pub const EFFECTIVE_FLAGS_ALL: u32 = 287;

/// A requested change of settings; unset fields are left as they are.
///
/// This is the JSON object accepted on a device's command topic.
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::state::ClimateCommand;
/// use melcloud_mqtt::codec::{FanSpeed, OperationMode};
///
/// let command: ClimateCommand =
///     serde_json::from_str(r#"{ "power": true, "mode": "cool", "fan": "auto" }"#).unwrap();
///
/// assert_eq!(command.power, Some(true));
/// assert_eq!(command.mode, Some(OperationMode::Cool));
/// assert_eq!(command.fan, Some(FanSpeed::Auto));
/// assert_eq!(command.target, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateCommand {
    /// Turn the unit on or off.
    #[serde(default)]
    pub power: Option<bool>,
    /// Target temperature in °C, rounded to the nearest half degree.
    #[serde(default)]
    pub target: Option<f64>,
    /// Fan speed.
    #[serde(default)]
    pub fan: Option<FanSpeed>,
    /// Operating mode.
    #[serde(default)]
    pub mode: Option<OperationMode>,
    /// Left/right vane.
    #[serde(default)]
    pub horizontal: Option<VanePosition>,
    /// Up/down vane.
    #[serde(default)]
    pub vertical: Option<VanePosition>,
}

/// A command encoded into the cloud's field codes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtaCommand {
    power: Option<bool>,
    set_temperature: Option<f64>,
    set_fan_speed: Option<u32>,
    operation_mode: Option<u8>,
    vane_horizontal: Option<u8>,
    vane_vertical: Option<u8>,
}

impl AtaCommand {
    /// Encodes a command for an appliance with the given capabilities.
    ///
    /// Values that cannot be encoded (a fractional fan speed for a unit that
    /// reports no speeds, a vane fraction outside `[0, 1]`) stay unset.
    #[must_use]
    pub fn encode(command: &ClimateCommand, ability: Ability) -> Self {
        Self {
            power: command.power,
            set_temperature: command.target.map(|t| (t * 2.0).round() / 2.0),
            set_fan_speed: command.fan.and_then(|fan| match fan {
                FanSpeed::Auto => Some(fan.encode(ability.speeds)),
                FanSpeed::Fraction(_) if ability.speeds > 0 => Some(fan.encode(ability.speeds)),
                FanSpeed::Fraction(_) => None,
            }),
            operation_mode: command.mode.map(OperationMode::code),
            vane_horizontal: command
                .horizontal
                .and_then(|v| VaneAxis::HORIZONTAL.encode(v)),
            vane_vertical: command.vertical.and_then(|v| VaneAxis::VERTICAL.encode(v)),
        }
    }

    /// Returns each cloud field with its encoded value, `None` when unset.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, Option<Value>); 6] {
        [
            ("Power", self.power.map(Value::from)),
            ("SetTemperature", self.set_temperature.map(Value::from)),
            ("SetFanSpeed", self.set_fan_speed.map(Value::from)),
            ("OperationMode", self.operation_mode.map(Value::from)),
            ("VaneHorizontal", self.vane_horizontal.map(Value::from)),
            ("VaneVertical", self.vane_vertical.map(Value::from)),
        ]
    }

    /// Returns `true` when applying this command would change nothing.
    #[must_use]
    pub fn is_satisfied_by(&self, raw: &RawState) -> bool {
        self.fields().iter().all(|(name, value)| match value {
            None => true,
            Some(value) => raw.get(name).is_some_and(|current| strict_eq(current, value)),
        })
    }

    /// Builds the full write payload, filling unset fields from `raw`.
    #[must_use]
    pub fn into_payload(self, device_id: DeviceId, raw: &RawState) -> Value {
        let mut payload = Map::new();
        payload.insert("DeviceID".to_string(), json!(device_id.get()));
        payload.insert("EffectiveFlags".to_string(), json!(EFFECTIVE_FLAGS_ALL));
        payload.insert("HasPendingCommand".to_string(), Value::Bool(true));

        for (name, value) in self.fields() {
            let value = value.unwrap_or_else(|| raw.get(name).cloned().unwrap_or(Value::Null));
            payload.insert(name.to_string(), value);
        }

        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawState {
        RawState::from_value(json!({
            "Power": true,
            "SetTemperature": 21,
            "SetFanSpeed": 0,
            "NumberOfFanSpeeds": 5,
            "OperationMode": 1,
            "VaneHorizontal": 12,
            "VaneVertical": 0
        }))
        .unwrap()
    }

    #[test]
    fn empty_command_is_satisfied() {
        let command = AtaCommand::encode(&ClimateCommand::default(), Ability { speeds: 5 });
        assert!(command.is_satisfied_by(&raw()));
    }

    #[test]
    fn matching_values_are_satisfied() {
        let command = AtaCommand::encode(
            &ClimateCommand {
                power: Some(true),
                target: Some(21.1),
                fan: Some(FanSpeed::Auto),
                mode: Some(OperationMode::Heat),
                horizontal: Some(VanePosition::Swing),
                vertical: Some(VanePosition::Auto),
            },
            Ability { speeds: 5 },
        );
        assert!(command.is_satisfied_by(&raw()));
    }

    #[test]
    fn differing_value_is_not_satisfied() {
        let command = AtaCommand::encode(
            &ClimateCommand {
                power: Some(false),
                ..ClimateCommand::default()
            },
            Ability { speeds: 5 },
        );
        assert!(!command.is_satisfied_by(&raw()));
    }

    #[test]
    fn field_missing_from_raw_is_not_satisfied() {
        let command = AtaCommand::encode(
            &ClimateCommand {
                power: Some(true),
                ..ClimateCommand::default()
            },
            Ability::default(),
        );
        assert!(!command.is_satisfied_by(&RawState::default()));
    }

    #[test]
    fn target_rounds_to_half_degrees() {
        let command = AtaCommand::encode(
            &ClimateCommand {
                target: Some(22.74),
                ..ClimateCommand::default()
            },
            Ability::default(),
        );
        assert_eq!(command.set_temperature, Some(22.5));
    }

    #[test]
    fn fan_fraction_needs_speed_count() {
        let command = ClimateCommand {
            fan: Some(FanSpeed::Fraction(0.6)),
            ..ClimateCommand::default()
        };
        assert_eq!(
            AtaCommand::encode(&command, Ability { speeds: 5 }).set_fan_speed,
            Some(3)
        );
        assert_eq!(AtaCommand::encode(&command, Ability::default()).set_fan_speed, None);
    }

    #[test]
    fn payload_fills_unset_fields_from_raw() {
        let command = AtaCommand::encode(
            &ClimateCommand {
                mode: Some(OperationMode::Cool),
                vertical: Some(VanePosition::Fraction(1.0)),
                ..ClimateCommand::default()
            },
            Ability { speeds: 5 },
        );

        let payload = command.into_payload(DeviceId::new(42), &raw());
        assert_eq!(
            payload,
            json!({
                "DeviceID": 42,
                "EffectiveFlags": 287,
                "HasPendingCommand": true,
                "Power": true,
                "SetTemperature": 21,
                "SetFanSpeed": 0,
                "OperationMode": 3,
                "VaneHorizontal": 12,
                "VaneVertical": 5
            })
        );
    }

    #[test]
    fn command_rejects_bad_values() {
        assert!(serde_json::from_str::<ClimateCommand>(r#"{ "mode": "turbo" }"#).is_err());
        assert!(serde_json::from_str::<ClimateCommand>(r#"{ "vertical": 3 }"#).is_err());
        assert!(serde_json::from_str::<ClimateCommand>(r#"{ "power": "on" }"#).is_err());
    }
}
