// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus topic layout.

use crate::event::DeviceId;

/// Default topic root.
pub const DEFAULT_ROOT: &str = "melcloud";

/// Topic names under a common root.
///
/// | Topic | Content |
/// |-------|---------|
/// | `{root}/state` | `online`, or `offline` as last will |
/// | `{root}/device` | discovery announcements |
/// | `{root}/{id}/state` | settings |
/// | `{root}/{id}/status` | observed condition |
/// | `{root}/{id}/schedule` | contact schedule |
/// | `{root}/{id}/debug` | raw record diffs |
/// | `{root}/{id}/set` | inbound commands |
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::bridge::Topics;
/// use melcloud_mqtt::event::DeviceId;
///
/// let topics = Topics::new("home/ac");
/// assert_eq!(topics.state(DeviceId::new(5)), "home/ac/5/state");
/// assert_eq!(topics.parse_command("home/ac/5/set"), Some(DeviceId::new(5)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    root: String,
}

impl Topics {
    /// Creates the layout under `root`; a trailing `/` is ignored.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the root.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Bridge availability.
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/state", self.root)
    }

    /// Discovery announcements.
    #[must_use]
    pub fn device(&self) -> String {
        format!("{}/device", self.root)
    }

    /// Settings of a device.
    #[must_use]
    pub fn state(&self, id: DeviceId) -> String {
        self.device_topic(id, "state")
    }

    /// Observed condition of a device.
    #[must_use]
    pub fn status(&self, id: DeviceId) -> String {
        self.device_topic(id, "status")
    }

    /// Contact schedule of a device.
    #[must_use]
    pub fn schedule(&self, id: DeviceId) -> String {
        self.device_topic(id, "schedule")
    }

    /// Raw diffs of a device.
    #[must_use]
    pub fn debug(&self, id: DeviceId) -> String {
        self.device_topic(id, "debug")
    }

    /// Commands for a device.
    #[must_use]
    pub fn command(&self, id: DeviceId) -> String {
        self.device_topic(id, "set")
    }

    /// Subscription filter matching every device's command topic.
    #[must_use]
    pub fn command_filter(&self) -> String {
        format!("{}/+/set", self.root)
    }

    /// Extracts the device of a command topic.
    #[must_use]
    pub fn parse_command(&self, topic: &str) -> Option<DeviceId> {
        topic
            .strip_prefix(self.root.as_str())?
            .strip_prefix('/')?
            .strip_suffix("/set")?
            .parse()
            .ok()
    }

    fn device_topic(&self, id: DeviceId, leaf: &str) -> String {
        format!("{}/{id}/{leaf}", self.root)
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let topics = Topics::default();
        let id = DeviceId::new(12);

        assert_eq!(topics.availability(), "melcloud/state");
        assert_eq!(topics.device(), "melcloud/device");
        assert_eq!(topics.status(id), "melcloud/12/status");
        assert_eq!(topics.schedule(id), "melcloud/12/schedule");
        assert_eq!(topics.debug(id), "melcloud/12/debug");
        assert_eq!(topics.command(id), "melcloud/12/set");
        assert_eq!(topics.command_filter(), "melcloud/+/set");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(Topics::new("ac/").state(DeviceId::new(1)), "ac/1/state");
    }

    #[test]
    fn parse_command_round_trips() {
        let topics = Topics::default();
        let id = DeviceId::new(77);
        assert_eq!(topics.parse_command(&topics.command(id)), Some(id));
    }

    #[test]
    fn parse_command_rejects_other_topics() {
        let topics = Topics::default();

        assert_eq!(topics.parse_command("melcloud/12/state"), None);
        assert_eq!(topics.parse_command("other/12/set"), None);
        assert_eq!(topics.parse_command("melcloud/kitchen/set"), None);
        assert_eq!(topics.parse_command("melcloud12/set"), None);
        assert_eq!(topics.parse_command("melcloud/1/2/set"), None);
    }
}
