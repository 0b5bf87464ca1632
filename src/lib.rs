// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `melcloud_mqtt` - Bridge MELCloud climate-control appliances to MQTT.
//!
//! The cloud only offers a polled REST API. This crate keeps a synchronized
//! model of every appliance of an account and exposes it as change
//! notifications, and it turns requested setting changes into cloud writes.
//!
//! # Architecture
//!
//! - [`protocol`]: authenticated session with indefinite login retry, and a
//!   TTL-aware DNS cache spreading requests across the service's addresses
//! - [`device`]: per-appliance poll loop around a pure state machine
//!   ([`DeviceModel`](device::DeviceModel))
//! - [`manager`]: discovery, registry and event aggregation
//!   ([`FleetManager`](manager::FleetManager))
//! - [`state`], [`codec`], [`diff`]: normalized records, value codecs and
//!   structural diffs
//! - [`bridge`], [`config`]: the MQTT surface and its environment
//!   configuration
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use melcloud_mqtt::event::{DeviceEvent, FleetEvent};
//! use melcloud_mqtt::manager::FleetManager;
//! use melcloud_mqtt::protocol::{SessionConfig, SessionManager};
//! use melcloud_mqtt::state::ClimateCommand;
//!
//! #[tokio::main]
//! async fn main() -> melcloud_mqtt::Result<()> {
//!     let session = Arc::new(SessionManager::new(SessionConfig::default())?);
//!     let fleet = FleetManager::new(session, Duration::from_secs(5));
//!
//!     let mut events = fleet.subscribe();
//!     let devices = fleet.start("user@example.com", "secret").await?;
//!
//!     // Turn the first unit to cooling at 22 °C
//!     if let Some(&id) = devices.first() {
//!         let command: ClimateCommand =
//!             serde_json::from_str(r#"{ "power": true, "mode": "cool", "target": 22 }"#)
//!                 .map_err(melcloud_mqtt::ParseError::from)?;
//!         fleet.set(id, &command).await?;
//!     }
//!
//!     while let Ok(event) = events.recv().await {
//!         if let FleetEvent::Device { device_id, event: DeviceEvent::StateChanged { diff, .. } } = event {
//!             println!("{device_id} changed: {diff:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod device;
pub mod diff;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod state;

pub use error::{Error, ParseError, ProtocolError, Result, ValueError};
