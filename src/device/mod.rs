// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A cloud-connected appliance.
//!
//! [`Device`] couples a [`DeviceModel`] with the session it talks through:
//! it reads the appliance (`Device/Get`), writes commands (`Device/SetAta`),
//! feeds every answer through the model and publishes the resulting events
//! on its own bus.
//!
//! Failures of reads and writes are published as [`DeviceEvent::Error`] by
//! [`poll`](Device::poll) and [`set`](Device::set); the `try_` variants return
//! them instead.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use melcloud_mqtt::device::Device;
//! use melcloud_mqtt::protocol::{SessionConfig, SessionManager};
//! use melcloud_mqtt::state::DeviceInfo;
//!
//! # async fn example(info: DeviceInfo) -> melcloud_mqtt::Result<()> {
//! let session = Arc::new(SessionManager::new(SessionConfig::default())?);
//! session.login("user@example.com", "secret").await?;
//!
//! let device = Arc::new(Device::new(info, Arc::clone(&session)));
//! let mut events = device.subscribe();
//! device.spawn_polling(Duration::from_secs(5), session.shutdown_token());
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}: {event:?}", device.id());
//! }
//! # Ok(())
//! # }
//! ```

pub mod model;

pub use model::{DeviceModel, DeviceSnapshot};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::protocol::{CloudRequest, SessionManager};
use crate::state::{ClimateCommand, DeviceInfo, RawState};

/// Default delay between two reads of a device.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// A cloud-connected appliance.
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    building: u64,
    model: Mutex<DeviceModel>,
    session: Arc<SessionManager>,
    events: EventBus<DeviceEvent>,
}

impl Device {
    /// Creates an unsynchronized device talking through `session`.
    #[must_use]
    pub fn new(info: DeviceInfo, session: Arc<SessionManager>) -> Self {
        Self {
            id: info.id,
            building: info.building,
            model: Mutex::new(DeviceModel::new(info)),
            session,
            events: EventBus::new(),
        }
    }

    /// Cloud identifier.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Identity captured from the device listing.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        self.model.lock().info().clone()
    }

    /// Current records, `None` before the first successful read.
    #[must_use]
    pub fn snapshot(&self) -> Option<DeviceSnapshot> {
        self.model.lock().snapshot().cloned()
    }

    /// Subscribes to this device's events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Folds a raw record into the model and publishes the resulting events.
    pub fn update(&self, raw: RawState) -> DeviceSnapshot {
        let (snapshot, events) = self.model.lock().update(raw);

        for event in events {
            tracing::debug!(device_id = %self.id, kind = event.kind(), "Device event");
            self.events.publish(event);
        }

        snapshot
    }

    /// Reads the device once.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the answer is not a JSON object.
    pub async fn try_poll(&self) -> Result<DeviceSnapshot> {
        let path = format!("Device/Get?id={}&buildingID={}", self.id, self.building);
        let body = self.session.request(CloudRequest::get(path)).await?;

        Ok(self.update(RawState::from_value(body)?))
    }

    /// Reads the device once, publishing a failure as [`DeviceEvent::Error`].
    pub async fn poll(&self) -> Option<DeviceSnapshot> {
        match self.try_poll().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    /// Applies a command.
    ///
    /// Sends nothing and returns `Ok(None)` when the device already has every
    /// requested value. Otherwise writes the full settings and folds the
    /// answer into the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSynchronized`](crate::Error::NotSynchronized)
    /// before the first read, or error if the request fails.
    pub async fn try_set(&self, command: &ClimateCommand) -> Result<Option<DeviceSnapshot>> {
        let prepared = self.model.lock().prepare(command)?;
        let Some(payload) = prepared else {
            tracing::debug!(device_id = %self.id, "Command already satisfied");
            return Ok(None);
        };

        tracing::debug!(device_id = %self.id, payload = %payload, "Writing settings");
        let body = self
            .session
            .request(CloudRequest::post("Device/SetAta", payload))
            .await?;

        Ok(Some(self.update(RawState::from_value(body)?)))
    }

    /// Applies a command, publishing a failure as [`DeviceEvent::Error`].
    pub async fn set(&self, command: &ClimateCommand) -> Option<DeviceSnapshot> {
        match self.try_set(command).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    /// Spawns the poll loop: one read now, then one every `interval`, until
    /// `cancel` fires.
    pub fn spawn_polling(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let device = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(device_id = %device.id, ?interval, "Starting poll loop");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        device.poll().await;
                    }
                }
            }

            tracing::debug!(device_id = %device.id, "Poll loop stopped");
        })
    }

    fn report(&self, error: &crate::Error) {
        tracing::warn!(device_id = %self.id, error = %error, "Device request failed");
        self.events.publish(DeviceEvent::error(error));
    }
}
