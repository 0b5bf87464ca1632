// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Appliance state records.
//!
//! The cloud reports each appliance as a flat [`RawState`]. Everything else in
//! this module is derived from it and recomputed on every read:
//!
//! - [`ClimateState`]: the settings (power, target, fan, mode, vanes)
//! - [`ClimateStatus`]: online flag, room temperature and confirmed settings
//! - [`Schedule`]: when the unit last and next talks to the cloud
//! - [`Ability`]: capabilities needed to encode commands
//!
//! [`DeviceInfo`] is the exception: it is captured once from the device listing.
//!
//! # Examples
//!
//! ```
//! use melcloud_mqtt::state::{ClimateState, RawState};
//! use melcloud_mqtt::codec::{FanSpeed, OperationMode, VanePosition};
//! use serde_json::json;
//!
//! let raw = RawState::from_value(json!({
//!     "OperationMode": 1,
//!     "SetFanSpeed": 0,
//!     "NumberOfFanSpeeds": 5,
//!     "VaneVertical": 0,
//!     "VaneHorizontal": 12
//! }))?;
//!
//! let state = ClimateState::from_raw(&raw);
//! assert_eq!(state.mode, Some(OperationMode::Heat));
//! assert_eq!(state.fan, Some(FanSpeed::Auto));
//! assert_eq!(state.vertical, Some(VanePosition::Auto));
//! assert_eq!(state.horizontal, Some(VanePosition::Swing));
//! # Ok::<(), melcloud_mqtt::ParseError>(())
//! ```

mod climate;
mod command;
mod info;
mod raw;
mod schedule;

pub use climate::{ClimateState, ClimateStatus, NormalizedState};
pub use command::{AtaCommand, ClimateCommand, EFFECTIVE_FLAGS_ALL};
pub use info::{Ability, Coordinates, DeviceAnnouncement, DeviceInfo};
pub use raw::RawState;
pub use schedule::Schedule;
