// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronization state machine of one appliance.
//!
//! [`DeviceModel`] holds no I/O. It is fed raw cloud records through
//! [`update`](DeviceModel::update) and answers with the events to publish,
//! and it turns commands into write payloads through
//! [`prepare`](DeviceModel::prepare).

use serde::Serialize;
use serde_json::Value;

use crate::diff::{self, Diff};
use crate::error::{Error, Result};
use crate::event::{DeviceEvent, DeviceId};
use crate::state::{
    Ability, AtaCommand, ClimateCommand, ClimateState, ClimateStatus, DeviceAnnouncement,
    DeviceInfo, NormalizedState, RawState, Schedule,
};

/// The normalized records of a synchronized device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Current settings.
    pub state: ClimateState,
    /// Current observed condition.
    pub status: ClimateStatus,
    /// Current contact schedule.
    pub schedule: Schedule,
}

/// State of one appliance, from its first read onwards.
///
/// Starts unsynchronized; the first successful [`update`](Self::update)
/// synchronizes it for good.
#[derive(Debug, Clone)]
pub struct DeviceModel {
    info: DeviceInfo,
    raw: Option<RawState>,
    ability: Ability,
    snapshot: Option<DeviceSnapshot>,
}

impl DeviceModel {
    /// Creates an unsynchronized model.
    #[must_use]
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            raw: None,
            ability: Ability::default(),
            snapshot: None,
        }
    }

    /// Cloud identifier.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.info.id
    }

    /// Identity captured from the device listing.
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Capabilities from the latest read.
    #[must_use]
    pub fn ability(&self) -> Ability {
        self.ability
    }

    /// Latest raw record, `None` before the first read.
    #[must_use]
    pub fn raw(&self) -> Option<&RawState> {
        self.raw.as_ref()
    }

    /// Current records, `None` before the first read.
    #[must_use]
    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        self.snapshot.as_ref()
    }

    /// Whether the device has been read at least once.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Folds a raw record into the model.
    ///
    /// Returns the resulting records and the events to publish, in order:
    /// the raw diff first, then either the discovery announcement and the
    /// three baselines (first update) or the schedule, state and status
    /// changes that are not empty.
    pub fn update(&mut self, mut raw: RawState) -> (DeviceSnapshot, Vec<DeviceEvent>) {
        let mut events = Vec::new();

        raw.remove(RawState::WEATHER_OBSERVATIONS);

        let previous_raw = self.raw.as_ref().map_or(Value::Null, RawState::to_value);
        let raw_diff = diff::diff(&previous_raw, &raw.to_value());
        if !raw_diff.is_empty() {
            events.push(DeviceEvent::Debug { diff: raw_diff });
        }

        let normalized = NormalizedState::from_raw(&raw);
        let schedule = Schedule::from_raw(&raw);
        self.ability = Ability::from_raw(&raw);
        self.raw = Some(raw);

        let status =
            ClimateStatus::derive(&normalized, self.snapshot.as_ref().map(|s| &s.status));

        let snapshot = match self.snapshot.take() {
            None => {
                tracing::debug!(device_id = %self.info.id, "Device synchronized");
                events.push(DeviceEvent::Discovered(DeviceAnnouncement {
                    info: self.info.clone(),
                    ability: self.ability,
                }));
                events.push(DeviceEvent::StateChanged {
                    diff: diff::full(&normalized.state),
                    state: normalized.state.clone(),
                });
                events.push(DeviceEvent::StatusChanged {
                    diff: diff::full(&status),
                    status: status.clone(),
                });
                events.push(DeviceEvent::ScheduleChanged {
                    diff: diff::full(&schedule),
                    schedule: schedule.clone(),
                });

                DeviceSnapshot {
                    state: normalized.state,
                    status,
                    schedule,
                }
            }
            Some(mut current) => {
                let changes = current.schedule.diff(&schedule);
                if changed(&changes) {
                    current.schedule = schedule;
                    events.push(DeviceEvent::ScheduleChanged {
                        schedule: current.schedule.clone(),
                        diff: changes,
                    });
                }

                let changes = current.state.diff(&normalized.state);
                if changed(&changes) {
                    current.state = normalized.state;
                    events.push(DeviceEvent::StateChanged {
                        state: current.state.clone(),
                        diff: changes,
                    });
                }

                let changes = current.status.diff(&status);
                if changed(&changes) {
                    current.status = status;
                    events.push(DeviceEvent::StatusChanged {
                        status: current.status.clone(),
                        diff: changes,
                    });
                }

                current
            }
        };

        self.snapshot = Some(snapshot.clone());
        (snapshot, events)
    }

    /// Encodes a command into a write payload.
    ///
    /// Returns `Ok(None)` when every requested field already has the requested
    /// value, in which case nothing needs to be sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSynchronized`] before the first read, since unset
    /// fields are filled from the latest raw record.
    pub fn prepare(&self, command: &ClimateCommand) -> Result<Option<Value>> {
        let raw = self
            .raw
            .as_ref()
            .ok_or(Error::NotSynchronized(self.info.id.get()))?;

        let encoded = AtaCommand::encode(command, self.ability);
        if encoded.is_satisfied_by(raw) {
            return Ok(None);
        }

        Ok(Some(encoded.into_payload(self.info.id, raw)))
    }
}

fn changed(changes: &Diff) -> bool {
    !changes.is_empty()
}
