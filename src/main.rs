// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `melcloud-mqtt` binary: runs the bridge configured from the environment.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing_subscriber::EnvFilter;

use melcloud_mqtt::{ProtocolError, Result};
use melcloud_mqtt::bridge::MqttBridge;
use melcloud_mqtt::config::BridgeConfig;
use melcloud_mqtt::manager::FleetManager;
use melcloud_mqtt::protocol::{SessionConfig, SessionManager};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Bridge stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let config = BridgeConfig::from_env()?;

    let session = Arc::new(SessionManager::new(SessionConfig::default())?);
    let fleet = Arc::new(FleetManager::new(session, config.melcloud.interval));

    let (bridge, event_loop) = MqttBridge::connect(&config.mqtt)?;
    let mut bridge: JoinHandle<Result<()>> =
        tokio::spawn(bridge.run(event_loop, fleet.subscribe(), Arc::clone(&fleet)));

    tokio::select! {
        started = fleet.start(&config.melcloud.username, &config.melcloud.password) => {
            let devices = started?;
            tracing::info!(devices = devices.len(), "Bridge running");
        }
        result = &mut bridge => return stopped(&fleet, result),
        _ = tokio::signal::ctrl_c() => {
            fleet.shutdown();
            return Ok(());
        }
    }

    tokio::select! {
        result = &mut bridge => stopped(&fleet, result),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            fleet.shutdown();
            Ok(())
        }
    }
}

/// Stops the fleet once the bridge task has ended.
fn stopped(fleet: &FleetManager, result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    fleet.shutdown();
    match result {
        Ok(outcome) => outcome,
        Err(e) => Err(ProtocolError::ChannelClosed(format!("bridge task: {e}")).into()),
    }
}
