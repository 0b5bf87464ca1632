// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fleet manager: discovery, registry and event aggregation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use crate::device::{DEFAULT_POLL_INTERVAL, Device, DeviceSnapshot};
use crate::error::{Error, ParseError, Result};
use crate::event::{DeviceId, EventBus, FleetEvent};
use crate::protocol::{CloudRequest, SessionManager};
use crate::state::{ClimateCommand, DeviceInfo};

use super::topology::{self, Location};

/// Coordinates every appliance of an account.
///
/// Logs in, lists the account's devices, starts one poll loop per device and
/// re-publishes the session's and every device's events on a single
/// [`FleetEvent`] bus.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use melcloud_mqtt::manager::FleetManager;
/// use melcloud_mqtt::protocol::{SessionConfig, SessionManager};
/// use melcloud_mqtt::event::FleetEvent;
///
/// #[tokio::main]
/// async fn main() -> melcloud_mqtt::Result<()> {
///     let session = Arc::new(SessionManager::new(SessionConfig::default())?);
///     let fleet = FleetManager::new(session, Duration::from_secs(5));
///
///     // Subscribe before starting so the baselines are not missed
///     let mut events = fleet.subscribe();
///     fleet.start("user@example.com", "secret").await?;
///
///     while let Ok(event) = events.recv().await {
///         if let FleetEvent::Device { device_id, event } = event {
///             println!("{device_id}: {}", event.kind());
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FleetManager {
    session: Arc<SessionManager>,
    devices: Arc<RwLock<HashMap<DeviceId, Arc<Device>>>>,
    events: EventBus<FleetEvent>,
    interval: Duration,
}

impl FleetManager {
    /// Creates a manager polling each device every `interval`.
    #[must_use]
    pub fn new(session: Arc<SessionManager>, interval: Duration) -> Self {
        Self {
            session,
            devices: Arc::new(RwLock::new(HashMap::new())),
            events: EventBus::new(),
            interval,
        }
    }

    /// Creates a manager with the default poll interval.
    #[must_use]
    pub fn with_default_interval(session: Arc<SessionManager>) -> Self {
        Self::new(session, DEFAULT_POLL_INTERVAL)
    }

    /// Subscribes to fleet events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    /// Returns the session devices talk through.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Logs in, then discovers and attaches every device of the account.
    ///
    /// Login is retried until it succeeds; see [`SessionManager::login`].
    ///
    /// # Errors
    ///
    /// - [`Error::Shutdown`] if shut down while logging in
    /// - any error of [`discover`](Self::discover)
    pub async fn start(&self, username: &str, password: &str) -> Result<Vec<DeviceId>> {
        self.spawn_session_forwarder();
        self.session.login(username, password).await?;
        self.discover().await
    }

    /// Lists the account's devices and attaches each one.
    ///
    /// # Errors
    ///
    /// Returns error if the listing request fails or cannot be parsed.
    pub async fn discover(&self) -> Result<Vec<DeviceId>> {
        let body = self
            .session
            .request(CloudRequest::get("User/ListDevices"))
            .await?;
        let locations: Vec<Location> = serde_json::from_value(body).map_err(ParseError::Json)?;

        let listed = topology::flatten(&locations);
        tracing::info!(
            locations = locations.len(),
            devices = listed.len(),
            "Discovered devices"
        );

        let mut ids = Vec::with_capacity(listed.len());
        for (descriptor, location) in listed {
            ids.push(self.attach(DeviceInfo::new(descriptor, location)).await);
        }

        Ok(ids)
    }

    /// Registers a device and starts polling it.
    ///
    /// A device already registered under the same identifier is kept and
    /// the duplicate is ignored, so each identifier has one poll loop.
    pub async fn attach(&self, info: DeviceInfo) -> DeviceId {
        let device_id = info.id;
        let mut devices = self.devices.write().await;

        if devices.contains_key(&device_id) {
            tracing::warn!(
                device_id = %device_id,
                name = %info.name,
                "Device listed twice, ignoring"
            );
            return device_id;
        }

        let device = Arc::new(Device::new(info, Arc::clone(&self.session)));
        tracing::info!(
            device_id = %device_id,
            name = %device.info().name,
            "Registering device"
        );

        let cancel = self.session.shutdown_token().child_token();
        self.spawn_device_forwarder(&device, cancel.clone());
        device.spawn_polling(self.interval, cancel);
        devices.insert(device_id, device);

        device_id
    }

    /// Returns a registered device.
    pub async fn device(&self, device_id: DeviceId) -> Option<Arc<Device>> {
        self.devices.read().await.get(&device_id).cloned()
    }

    /// Returns the identifiers of all registered devices.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().copied().collect()
    }

    /// Returns the number of registered devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Applies a command to a registered device.
    ///
    /// Failures of the write itself are published on the fleet bus as the
    /// device's error event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if no device has this identifier.
    pub async fn set(
        &self,
        device_id: DeviceId,
        command: &ClimateCommand,
    ) -> Result<Option<DeviceSnapshot>> {
        let device = self
            .device(device_id)
            .await
            .ok_or(Error::DeviceNotFound(device_id.get()))?;

        Ok(device.set(command).await)
    }

    /// Stops every poll loop and any login in progress.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down fleet");
        self.session.shutdown();
    }

    fn spawn_session_forwarder(&self) {
        let rx = self.session.subscribe();
        self.spawn_forwarder(rx, None, self.session.shutdown_token(), FleetEvent::from);
    }

    fn spawn_device_forwarder(&self, device: &Device, cancel: CancellationToken) {
        let device_id = device.id();
        self.spawn_forwarder(device.subscribe(), Some(device_id), cancel, move |event| {
            FleetEvent::Device { device_id, event }
        });
    }

    /// Re-publishes every event of `rx` on the fleet bus until `cancel` fires.
    fn spawn_forwarder<E, F>(
        &self,
        mut rx: broadcast::Receiver<E>,
        device_id: Option<DeviceId>,
        cancel: CancellationToken,
        wrap: F,
    ) where
        E: Clone + Send + 'static,
        F: Fn(E) -> FleetEvent + Send + 'static,
    {
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    received = rx.recv() => received,
                };

                match received {
                    Ok(event) => events.publish(wrap(event)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(?device_id, skipped, "Event forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceEvent;
    use crate::protocol::SessionConfig;
    use crate::state::Coordinates;

    fn fleet() -> FleetManager {
        let session = SessionManager::new(SessionConfig::default()).unwrap();
        FleetManager::new(Arc::new(session), Duration::from_secs(60))
    }

    fn info(id: u64) -> DeviceInfo {
        DeviceInfo {
            id: DeviceId::new(id),
            name: format!("unit {id}"),
            serial: None,
            mac: None,
            building: 1,
            last_seen: None,
            address: String::new(),
            location: Coordinates::default(),
        }
    }

    #[tokio::test]
    async fn new_fleet_is_empty() {
        let fleet = fleet();
        assert_eq!(fleet.device_count().await, 0);
        assert!(fleet.device_ids().await.is_empty());
    }

    #[tokio::test]
    async fn attach_registers_device() {
        let fleet = fleet();
        let id = fleet.attach(info(5)).await;

        assert_eq!(id, DeviceId::new(5));
        assert!(fleet.device(id).await.is_some());
        assert_eq!(fleet.device_ids().await, [id]);
        fleet.shutdown();
    }

    #[tokio::test]
    async fn set_unknown_device_fails() {
        let fleet = fleet();
        let err = fleet
            .set(DeviceId::new(99), &ClimateCommand::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(99)));
    }

    #[tokio::test]
    async fn device_events_are_forwarded() {
        let fleet = fleet();
        let mut events = fleet.subscribe();
        let id = fleet.attach(info(5)).await;

        // The first poll fails without a session and is published as an error
        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            FleetEvent::Device { device_id, event: DeviceEvent::Error { .. } } if device_id == id
        ));
        fleet.shutdown();
    }

    #[tokio::test]
    async fn duplicate_attach_keeps_one_poll_loop() {
        let fleet = fleet();
        let mut events = fleet.subscribe();

        let mut duplicate = info(5);
        duplicate.name = "duplicate".to_string();
        fleet.attach(info(5)).await;
        fleet.attach(duplicate).await;

        assert_eq!(fleet.device_count().await, 1);
        let kept = fleet.device(DeviceId::new(5)).await.unwrap();
        assert_eq!(kept.info().name, "unit 5");

        // One loop means one failed first read
        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            FleetEvent::Device { event: DeviceEvent::Error { .. }, .. }
        ));
        let second = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(second.is_err(), "unexpected event: {second:?}");

        fleet.shutdown();
    }
}
