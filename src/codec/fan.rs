// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan speed codec.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

use super::Repr;

/// Absorbs float error when scaling a decoded fraction back to its speed.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Normalized fan speed.
///
/// Serialized as `"auto"` or a number in `[0, 1]`. The number of discrete
/// speeds is device specific and reported by the appliance, see
/// [`Ability`](crate::state::Ability).
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::codec::FanSpeed;
///
/// assert_eq!(FanSpeed::decode(0, 5), Some(FanSpeed::Auto));
/// assert_eq!(FanSpeed::decode(2, 5), Some(FanSpeed::Fraction(0.4)));
/// assert_eq!(FanSpeed::Fraction(0.4).encode(5), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Repr", into = "Repr")]
pub enum FanSpeed {
    /// The appliance picks the speed.
    Auto,
    /// Fixed speed as a fraction of the fastest setting.
    Fraction(f64),
}

impl FanSpeed {
    /// Code the appliance uses for automatic fan speed.
    pub const AUTO_CODE: u32 = 0;

    /// Decodes an appliance code given the number of discrete speeds.
    ///
    /// Returns `None` when the appliance reports no speeds.
    #[must_use]
    pub fn decode(code: u32, speeds: u32) -> Option<Self> {
        if code == Self::AUTO_CODE {
            return Some(Self::Auto);
        }
        if speeds == 0 {
            return None;
        }
        Some(Self::Fraction(f64::from(code) / f64::from(speeds)))
    }

    /// Encodes this speed given the number of discrete speeds.
    ///
    /// Fractions are floor-scaled, so a fraction below `1 / speeds` lands on
    /// code `0` (automatic).
    #[must_use]
    pub fn encode(self, speeds: u32) -> u32 {
        match self {
            Self::Auto => Self::AUTO_CODE,
            Self::Fraction(n) => {
                let scaled = (n.clamp(0.0, 1.0) * f64::from(speeds) + SCALE_TOLERANCE).floor();
                // Clamped to [0, speeds] above.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let code = scaled as u32;
                code.min(speeds)
            }
        }
    }
}

impl TryFrom<Repr> for FanSpeed {
    type Error = ValueError;

    fn try_from(repr: Repr) -> Result<Self, Self::Error> {
        match repr {
            Repr::Word(word) if word == "auto" => Ok(Self::Auto),
            Repr::Word(word) => Err(ValueError::UnknownWord {
                kind: "fan",
                value: word,
            }),
            Repr::Number(n) if (0.0..=1.0).contains(&n) => Ok(Self::Fraction(n)),
            Repr::Number(n) => Err(ValueError::OutOfRange(n)),
        }
    }
}

impl From<FanSpeed> for Repr {
    fn from(speed: FanSpeed) -> Self {
        match speed {
            FanSpeed::Auto => Repr::Word("auto".to_string()),
            FanSpeed::Fraction(n) => Repr::Number(n),
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fraction(n) => write!(f, "{n}"),
        }
    }
}
