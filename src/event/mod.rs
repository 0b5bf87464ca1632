// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for device, session and fleet notifications.
//!
//! Each device owns an [`EventBus<DeviceEvent>`](EventBus); the session
//! manager owns one for [`SessionEvent`]. The fleet manager re-publishes both
//! onto a single [`EventBus<FleetEvent>`](EventBus), tagging device events with
//! their [`DeviceId`].
//!
//! # Examples
//!
//! ```
//! use melcloud_mqtt::event::{DeviceEvent, DeviceId, EventBus, FleetEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(FleetEvent::Device {
//!     device_id: DeviceId::new(1),
//!     event: DeviceEvent::error("timed out"),
//! });
//!
//! assert_eq!(rx.try_recv().unwrap().device_id(), Some(DeviceId::new(1)));
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::{Account, DeviceEvent, FleetEvent, SessionEvent};
pub use device_id::DeviceId;
pub use event_bus::EventBus;
