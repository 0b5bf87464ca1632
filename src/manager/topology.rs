// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device listing returned by `User/ListDevices`.
//!
//! The cloud nests devices inside locations, floors and areas. Only the
//! fields needed to identify and address a device are kept.

use serde::Deserialize;

/// A building with its device tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Location {
    /// Building identifier.
    #[serde(rename = "ID")]
    pub id: u64,
    /// Building name.
    pub name: String,
    /// First address line.
    pub address_line1: Option<String>,
    /// Second address line.
    pub address_line2: Option<String>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Device tree.
    pub structure: Structure,
}

/// Devices of a building, directly and through floors and areas.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Structure {
    /// Devices attached to the building itself.
    pub devices: Vec<DeviceDescriptor>,
    /// Floors.
    pub floors: Vec<Floor>,
    /// Areas not on any floor.
    pub areas: Vec<Area>,
}

/// A floor and its areas.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Floor {
    /// Devices on the floor.
    pub devices: Vec<DeviceDescriptor>,
    /// Areas on the floor.
    pub areas: Vec<Area>,
}

/// An area of a building or floor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Area {
    /// Devices in the area.
    pub devices: Vec<DeviceDescriptor>,
}

/// A device entry of the listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceDescriptor {
    /// Cloud device identifier.
    #[serde(rename = "DeviceID")]
    pub device_id: u64,
    /// Display name.
    pub device_name: String,
    /// Building the device belongs to.
    #[serde(rename = "BuildingID")]
    pub building_id: u64,
    /// Serial number.
    pub serial_number: Option<String>,
    /// MAC address.
    pub mac_address: Option<String>,
    /// Embedded device summary.
    pub device: Option<DeviceSummary>,
}

/// Embedded summary of a listed device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceSummary {
    /// Last time the unit talked to the cloud.
    pub last_time_stamp: Option<String>,
}

/// Collects every device of every location with the location it sits in.
///
/// Visits, per location: the building's devices, then each floor's devices
/// followed by that floor's areas, then the building's areas.
#[must_use]
pub fn flatten(locations: &[Location]) -> Vec<(&DeviceDescriptor, &Location)> {
    let mut devices = Vec::new();

    for location in locations {
        let structure = &location.structure;
        let floors = structure.floors.iter().flat_map(|floor| {
            floor
                .devices
                .iter()
                .chain(floor.areas.iter().flat_map(|area| &area.devices))
        });
        let areas = structure.areas.iter().flat_map(|area| &area.devices);

        devices.extend(
            structure
                .devices
                .iter()
                .chain(floors)
                .chain(areas)
                .map(|device| (device, location)),
        );
    }

    devices
}
