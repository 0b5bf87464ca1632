// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event types published by devices, the session and the fleet.

use serde::{Deserialize, Serialize};

use crate::diff::Diff;
use crate::state::{ClimateState, ClimateStatus, DeviceAnnouncement, Schedule};

use super::DeviceId;

/// Events emitted by a single device.
///
/// Every change notification carries the complete new record and the diff
/// against the previous one. The first successful read publishes
/// [`Discovered`](Self::Discovered) followed by baselines whose diff is the
/// full record.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The device was read for the first time.
    Discovered(DeviceAnnouncement),

    /// The settings changed.
    StateChanged {
        /// Complete new settings.
        state: ClimateState,
        /// Changed fields.
        diff: Diff,
    },

    /// The observed condition changed.
    StatusChanged {
        /// Complete new status.
        status: ClimateStatus,
        /// Changed fields.
        diff: Diff,
    },

    /// The contact schedule changed.
    ScheduleChanged {
        /// Complete new schedule.
        schedule: Schedule,
        /// Changed fields.
        diff: Diff,
    },

    /// The raw cloud record changed.
    Debug {
        /// Structural diff of the raw record.
        diff: Diff,
    },

    /// A poll or command failed.
    Error {
        /// Rendered error.
        message: String,
    },
}

impl DeviceEvent {
    /// Creates an error event from anything displayable.
    #[must_use]
    pub fn error(error: impl std::fmt::Display) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }

    /// Returns `true` for the change notifications of normalized records.
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::StateChanged { .. } | Self::StatusChanged { .. } | Self::ScheduleChanged { .. }
        )
    }

    /// Short name of the event kind, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovered(_) => "discovered",
            Self::StateChanged { .. } => "state",
            Self::StatusChanged { .. } => "status",
            Self::ScheduleChanged { .. } => "schedule",
            Self::Debug { .. } => "debug",
            Self::Error { .. } => "error",
        }
    }
}

/// The account a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account holder name.
    pub name: String,
    /// Account country.
    pub country: String,
}

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A login attempt succeeded.
    LoggedIn {
        /// The account logged into.
        account: Account,
    },

    /// A login attempt failed and will be retried.
    LoginFailed {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Rendered error.
        message: String,
    },
}

/// Events emitted by the fleet manager.
///
/// Aggregates the session's events and every device's events onto one bus.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// The cloud session was established.
    LoggedIn {
        /// The account logged into.
        account: Account,
    },

    /// A login attempt failed.
    SessionError {
        /// Rendered error.
        message: String,
    },

    /// An event from one device.
    Device {
        /// Originating device.
        device_id: DeviceId,
        /// The device's event.
        event: DeviceEvent,
    },
}

impl FleetEvent {
    /// Returns the originating device, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::Device { device_id, .. } => Some(*device_id),
            Self::LoggedIn { .. } | Self::SessionError { .. } => None,
        }
    }
}

impl From<SessionEvent> for FleetEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::LoggedIn { account } => Self::LoggedIn { account },
            SessionEvent::LoginFailed { attempt, message } => Self::SessionError {
                message: format!("login attempt {attempt} failed: {message}"),
            },
        }
    }
}
