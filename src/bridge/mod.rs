// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT surface of the fleet.
//!
//! [`MqttBridge`] publishes fleet events as retained JSON documents under a
//! topic root (see [`Topics`]) and routes JSON commands received on
//! `{root}/{id}/set` to the matching device.
//!
//! A broken broker connection ends [`MqttBridge::run`] with an error; the
//! process is expected to exit and be restarted by its supervisor.

mod topics;

pub use topics::{DEFAULT_ROOT, Topics};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::config::MqttSettings;
use crate::error::{Error, ProtocolError, Result};
use crate::event::{DeviceEvent, FleetEvent};
use crate::manager::FleetManager;
use crate::state::ClimateCommand;

/// Counter for generated client identifiers.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default MQTT port.
const DEFAULT_PORT: u16 = 1883;

/// Payload published on the availability topic once logged in.
pub const ONLINE: &str = "online";
/// Payload left as last will on the availability topic.
pub const OFFLINE: &str = "offline";

/// An outbound bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic.
    pub topic: String,
    /// Payload.
    pub payload: String,
    /// Whether the broker keeps it for late subscribers.
    pub retain: bool,
}

impl Message {
    fn retained(topic: String, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            retain: true,
        }
    }

    fn json(topic: String, value: &impl Serialize, retain: bool) -> Option<Self> {
        match serde_json::to_string(value) {
            Ok(payload) => Some(Self {
                topic,
                payload,
                retain,
            }),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Cannot serialize payload");
                None
            }
        }
    }
}

/// Bridge between the fleet and an MQTT broker.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use melcloud_mqtt::bridge::MqttBridge;
/// use melcloud_mqtt::config::BridgeConfig;
/// use melcloud_mqtt::manager::FleetManager;
/// use melcloud_mqtt::protocol::{SessionConfig, SessionManager};
///
/// # async fn example() -> melcloud_mqtt::Result<()> {
/// let config = BridgeConfig::from_env()?;
/// let session = Arc::new(SessionManager::new(SessionConfig::default())?);
/// let fleet = Arc::new(FleetManager::new(session, config.melcloud.interval));
///
/// let (bridge, event_loop) = MqttBridge::connect(&config.mqtt)?;
/// let events = fleet.subscribe();
/// let bridge = tokio::spawn(bridge.run(event_loop, events, Arc::clone(&fleet)));
///
/// fleet
///     .start(&config.melcloud.username, &config.melcloud.password)
///     .await?;
/// bridge.await.ok();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MqttBridge {
    client: AsyncClient,
    topics: Topics,
}

impl MqttBridge {
    /// Creates the broker client with an `offline` last will.
    ///
    /// The connection is established once the returned event loop is driven
    /// by [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL is malformed.
    pub fn connect(settings: &MqttSettings) -> Result<(Self, EventLoop)> {
        let (host, port) = parse_mqtt_url(&settings.url)?;
        let topics = Topics::new(settings.root.clone());

        let client_id = settings.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("melcloud_{}_{counter}", std::process::id())
        });

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            topics.availability(),
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));
        if let Some(username) = &settings.username {
            options.set_credentials(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            );
        }

        tracing::info!(url = %settings.url, root = %topics.root(), "Connecting to MQTT broker");

        let (client, event_loop) = AsyncClient::new(options, 64);
        Ok((Self { client, topics }, event_loop))
    }

    /// Returns the topic layout.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Runs the bridge until the broker connection fails or the fleet bus
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns error if the broker connection fails or a publish cannot be
    /// queued.
    pub async fn run(
        self,
        event_loop: EventLoop,
        mut events: broadcast::Receiver<FleetEvent>,
        fleet: Arc<FleetManager>,
    ) -> Result<()> {
        let (inbound_tx, mut inbound) = mpsc::channel(64);
        let mut connection = tokio::spawn(drive(event_loop, inbound_tx));

        self.client
            .subscribe(self.topics.command_filter(), QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;

        loop {
            tokio::select! {
                result = &mut connection => {
                    return match result {
                        Ok(Err(e)) => Err(e),
                        Ok(Ok(())) => Ok(()),
                        Err(e) => Err(ProtocolError::ChannelClosed(format!("MQTT task: {e}")).into()),
                    };
                }
                Some((topic, payload)) = inbound.recv() => {
                    self.dispatch(&fleet, &topic, &payload);
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        for message in self.messages(&event) {
                            self.publish(message).await?;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Bridge fell behind fleet events");
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    /// Maps a fleet event to the messages to publish.
    #[must_use]
    pub fn messages(&self, event: &FleetEvent) -> Vec<Message> {
        let message = match event {
            FleetEvent::LoggedIn { account } => {
                tracing::info!(account = %account.name, "Cloud session established");
                Some(Message::retained(self.topics.availability(), ONLINE))
            }
            FleetEvent::SessionError { message } => {
                tracing::warn!(error = %message, "Cloud session error");
                None
            }
            FleetEvent::Device { device_id, event } => {
                let id = *device_id;
                match event {
                    DeviceEvent::Discovered(announcement) => {
                        Message::json(self.topics.device(), announcement, true)
                    }
                    DeviceEvent::StateChanged { state, .. } => {
                        Message::json(self.topics.state(id), state, true)
                    }
                    DeviceEvent::StatusChanged { status, .. } => {
                        Message::json(self.topics.status(id), status, true)
                    }
                    DeviceEvent::ScheduleChanged { schedule, .. } => {
                        Message::json(self.topics.schedule(id), schedule, true)
                    }
                    DeviceEvent::Debug { diff } => {
                        Message::json(self.topics.debug(id), diff, false)
                    }
                    DeviceEvent::Error { message } => {
                        tracing::warn!(device_id = %id, error = %message, "Device error");
                        None
                    }
                }
            }
        };

        message.into_iter().collect()
    }

    async fn publish(&self, message: Message) -> Result<()> {
        tracing::debug!(topic = %message.topic, retain = message.retain, "Publishing");
        self.client
            .publish(
                message.topic,
                QoS::AtLeastOnce,
                message.retain,
                message.payload.into_bytes(),
            )
            .await
            .map_err(|e| Error::Protocol(ProtocolError::Mqtt(e)))
    }

    /// Routes an inbound command; bad messages are logged and dropped.
    fn dispatch(&self, fleet: &Arc<FleetManager>, topic: &str, payload: &[u8]) {
        let Some(device_id) = self.topics.parse_command(topic) else {
            tracing::warn!(topic, "Message on unknown topic");
            return;
        };

        let command = match parse_command(payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(topic, error = %e, "Cannot parse command");
                return;
            }
        };

        let fleet = Arc::clone(fleet);
        tokio::spawn(async move {
            if let Err(e) = fleet.set(device_id, &command).await {
                tracing::warn!(device_id = %device_id, error = %e, "Command for unknown device");
            }
        });
    }
}

/// Parses an inbound command payload.
///
/// # Errors
///
/// Returns [`ParseError::Json`](crate::ParseError::Json) if the payload is not
/// a valid command object.
pub fn parse_command(payload: &[u8]) -> Result<ClimateCommand> {
    serde_json::from_slice(payload).map_err(|e| crate::ParseError::Json(e).into())
}

/// Polls the broker connection, forwarding inbound publishes.
async fn drive(
    mut event_loop: EventLoop,
    inbound: mpsc::Sender<(String, Vec<u8>)>,
) -> Result<()> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "MQTT connected");
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "Received MQTT message"
                );
                if inbound
                    .send((publish.topic, publish.payload.to_vec()))
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT connection failed");
                return Err(ProtocolError::ConnectionFailed(format!("MQTT: {e}")).into());
            }
        }
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let address = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    if address.is_empty() {
        return Err(ProtocolError::InvalidAddress(format!("missing host in {url}")).into());
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ProtocolError::InvalidAddress(format!("invalid port: {port}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), DEFAULT_PORT)),
    }
}
