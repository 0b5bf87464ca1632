// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operation mode codec.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Operating mode of an air-to-air unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Heating.
    Heat,
    /// Dehumidifying.
    Dry,
    /// Cooling.
    Cool,
    /// Fan only.
    Fan,
    /// Automatic heat/cool.
    Auto,
}

impl OperationMode {
    /// All modes, in code order.
    pub const ALL: [Self; 5] = [Self::Heat, Self::Dry, Self::Cool, Self::Fan, Self::Auto];

    /// Returns the appliance code for this mode.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Heat => 1,
            Self::Dry => 2,
            Self::Cool => 3,
            Self::Fan => 7,
            Self::Auto => 8,
        }
    }

    /// Looks a mode up by appliance code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Dry => "dry",
            Self::Cool => "cool",
            Self::Fan => "fan",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValueError::UnknownWord {
                kind: "mode",
                value: s.to_string(),
            })
    }
}
