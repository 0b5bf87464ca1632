// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet management for all appliances of an account.
//!
//! The [`FleetManager`] is the entry point for applications. It provides:
//!
//! - **Discovery**: every device of every building, floor and area
//! - **Registry**: lookup by [`DeviceId`](crate::event::DeviceId) and command
//!   routing
//! - **Event aggregation**: session and device events on one bus
//!
//! The [`topology`] module holds the device listing types.

mod fleet;
pub mod topology;

pub use fleet::FleetManager;
