// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration from the environment.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `MQTT_HOST` | broker URL, e.g. `mqtt://broker:1883` | required |
//! | `MQTT_USERNAME` | broker user | none |
//! | `MQTT_PASSWORD` | broker password | none |
//! | `MQTT_ID` | client identifier | generated |
//! | `MQTT_PATH` | topic root | `melcloud` |
//! | `MELCLOUD_USERNAME` | cloud account e-mail | required |
//! | `MELCLOUD_PASSWORD` | cloud account password | required |
//! | `MELCLOUD_INTERVAL` | poll interval in milliseconds | `5000` |

use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::Deserialize;

use crate::bridge::DEFAULT_ROOT;
use crate::device::DEFAULT_POLL_INTERVAL;
use crate::error::{Error, Result};

/// Environment variables read by [`BridgeConfig::from_env`].
pub const VARIABLES: [&str; 8] = [
    "MQTT_HOST",
    "MQTT_USERNAME",
    "MQTT_PASSWORD",
    "MQTT_ID",
    "MQTT_PATH",
    "MELCLOUD_USERNAME",
    "MELCLOUD_PASSWORD",
    "MELCLOUD_INTERVAL",
];

/// The only variable parsed as a number.
const INTERVAL: &str = "MELCLOUD_INTERVAL";

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Broker URL.
    pub url: String,
    /// Broker user.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// Client identifier, generated when absent.
    pub client_id: Option<String>,
    /// Topic root.
    pub root: String,
}

/// Cloud account settings.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudSettings {
    /// Account e-mail.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Delay between two reads of a device.
    pub interval: Duration,
}

impl std::fmt::Debug for CloudSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("interval", &self.interval)
            .finish()
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Broker settings.
    pub mqtt: MqttSettings,
    /// Cloud settings.
    pub melcloud: CloudSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    mqtt: RawMqtt,
    #[serde(default)]
    melcloud: RawCloud,
}

#[derive(Debug, Default, Deserialize)]
struct RawMqtt {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCloud {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
}

impl BridgeConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a value
    /// is malformed.
    pub fn from_env() -> Result<Self> {
        let mut figment = Figment::from(Env::raw().only(&[INTERVAL]).split("_"));

        // Text settings are taken verbatim: `Env` would read `007` as a number
        for variable in VARIABLES.into_iter().filter(|v| *v != INTERVAL) {
            if let Ok(value) = std::env::var(variable) {
                figment = figment.merge(Serialized::default(&key(variable), value));
            }
        }

        Self::from_figment(&figment)
    }

    /// Loads the configuration from any figment.
    ///
    /// Keys are `mqtt.host`, `mqtt.username`, ..., `melcloud.interval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required key is missing or a value is
    /// malformed.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let raw: RawConfig = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        let url = non_empty(raw.mqtt.host).ok_or_else(|| missing("MQTT_HOST"))?;
        let username = non_empty(raw.melcloud.username).ok_or_else(|| missing("MELCLOUD_USERNAME"))?;
        let password = non_empty(raw.melcloud.password).ok_or_else(|| missing("MELCLOUD_PASSWORD"))?;

        let interval = match raw.melcloud.interval {
            Some(0) => {
                return Err(Error::Config(
                    "MELCLOUD_INTERVAL must be greater than zero".to_string(),
                ));
            }
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            mqtt: MqttSettings {
                url,
                username: non_empty(raw.mqtt.username),
                password: non_empty(raw.mqtt.password),
                client_id: non_empty(raw.mqtt.id),
                root: non_empty(raw.mqtt.path).unwrap_or_else(|| DEFAULT_ROOT.to_string()),
            },
            melcloud: CloudSettings {
                username,
                password,
                interval,
            },
        })
    }
}

/// `MQTT_HOST` is read as `mqtt.host`.
fn key(variable: &str) -> String {
    variable.to_ascii_lowercase().replacen('_', ".", 1)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing(variable: &str) -> Error {
    Error::Config(format!("{variable} is not set"))
}
