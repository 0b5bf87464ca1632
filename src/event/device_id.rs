// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cloud identifier of an appliance.
///
/// A distinct type around the numeric `DeviceID` the cloud assigns, so it
/// cannot be confused with building or location identifiers.
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::event::DeviceId;
///
/// let id: DeviceId = "1234".parse().unwrap();
/// assert_eq!(id.get(), 1234);
/// assert_eq!(id.to_string(), "1234");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Wraps a cloud device identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<DeviceId> for u64 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality() {
        assert_eq!(DeviceId::new(7), DeviceId::from(7));
        assert_ne!(DeviceId::new(7), DeviceId::new(8));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", DeviceId::new(42)), "DeviceId(42)");
    }

    #[test]
    fn parse() {
        assert_eq!("42".parse::<DeviceId>().unwrap(), DeviceId::new(42));
        assert!("living-room".parse::<DeviceId>().is_err());
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&DeviceId::new(9)).unwrap(), "9");
    }

    #[test]
    fn hashable() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeviceId::new(1));
        assert!(set.contains(&DeviceId::new(1)));
    }
}
