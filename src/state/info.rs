// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Appliance identity and capabilities.

use serde::{Deserialize, Serialize};

use crate::event::DeviceId;
use crate::manager::topology::{DeviceDescriptor, Location};

use super::RawState;

/// Identity of an appliance, captured once from the device listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Cloud device identifier.
    pub id: DeviceId,
    /// User-assigned name.
    pub name: String,
    /// Serial number.
    pub serial: Option<String>,
    /// MAC address of the Wi-Fi adapter.
    pub mac: Option<String>,
    /// Building the appliance belongs to.
    pub building: u64,
    /// Last time the cloud heard from the unit, as reported by the listing.
    pub last_seen: Option<String>,
    /// Postal address of the building, one line per row.
    pub address: String,
    /// Coordinates of the building.
    pub location: Coordinates,
}

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
}

impl DeviceInfo {
    /// Builds the identity from a listed device and the location it sits in.
    #[must_use]
    pub fn new(device: &DeviceDescriptor, location: &Location) -> Self {
        let address = [
            location.address_line1.as_deref().unwrap_or_default(),
            location.address_line2.as_deref().unwrap_or_default(),
        ]
        .join("\n");

        Self {
            id: DeviceId::new(device.device_id),
            name: device.device_name.clone(),
            serial: device.serial_number.clone(),
            mac: device.mac_address.clone(),
            building: device.building_id,
            last_seen: device
                .device
                .as_ref()
                .and_then(|summary| summary.last_time_stamp.clone()),
            address,
            location: Coordinates {
                latitude: location.latitude,
                longitude: location.longitude,
            },
        }
    }
}

/// What an appliance can do, as far as command encoding is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    /// Number of discrete fan speeds, `0` when unknown.
    pub speeds: u32,
}

impl Ability {
    /// Reads the capabilities from a raw state.
    #[must_use]
    pub fn from_raw(raw: &RawState) -> Self {
        Self {
            speeds: raw.u32_field("NumberOfFanSpeeds").unwrap_or(0),
        }
    }
}

/// Discovery announcement: identity plus capabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAnnouncement {
    /// Identity.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// Capabilities.
    #[serde(flatten)]
    pub ability: Ability,
}
