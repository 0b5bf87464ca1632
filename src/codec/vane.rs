// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vane position codec.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

use super::Repr;

/// Normalized position of an air-deflecting vane.
///
/// Serialized as `"auto"`, `"swing"`, or a number in `[0, 1]`.
///
/// # Examples
///
/// ```
/// use melcloud_mqtt::codec::{VaneAxis, VanePosition};
///
/// assert_eq!(VaneAxis::VERTICAL.decode(0), Some(VanePosition::Auto));
/// assert_eq!(VaneAxis::VERTICAL.decode(7), Some(VanePosition::Swing));
/// assert_eq!(VaneAxis::VERTICAL.decode(3), Some(VanePosition::Fraction(0.5)));
/// assert_eq!(VaneAxis::VERTICAL.decode(6), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Repr", into = "Repr")]
pub enum VanePosition {
    /// The appliance picks the position.
    Auto,
    /// The vane oscillates.
    Swing,
    /// Fixed position, `0.0` at one end of travel and `1.0` at the other.
    Fraction(f64),
}

impl TryFrom<Repr> for VanePosition {
    type Error = ValueError;

    fn try_from(repr: Repr) -> Result<Self, Self::Error> {
        match repr {
            Repr::Word(word) if word == "auto" => Ok(Self::Auto),
            Repr::Word(word) if word == "swing" => Ok(Self::Swing),
            Repr::Word(word) => Err(ValueError::UnknownWord {
                kind: "vane",
                value: word,
            }),
            Repr::Number(n) if (0.0..=1.0).contains(&n) => Ok(Self::Fraction(n)),
            Repr::Number(n) => Err(ValueError::OutOfRange(n)),
        }
    }
}

impl From<VanePosition> for Repr {
    fn from(position: VanePosition) -> Self {
        match position {
            VanePosition::Auto => Repr::Word("auto".to_string()),
            VanePosition::Swing => Repr::Word("swing".to_string()),
            VanePosition::Fraction(n) => Repr::Number(n),
        }
    }
}

impl fmt::Display for VanePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Swing => f.write_str("swing"),
            Self::Fraction(n) => write!(f, "{n}"),
        }
    }
}

/// Discretization of one vane axis.
///
/// Code `0` is automatic, `swing_code` is oscillation, and codes
/// `1..=positions` are fixed positions spread evenly over `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaneAxis {
    swing_code: u8,
    positions: u8,
}

impl VaneAxis {
    /// Code the appliance uses for automatic vane control.
    pub const AUTO_CODE: u8 = 0;

    /// Left/right vane.
    pub const HORIZONTAL: Self = Self::new(12, 5);

    /// Up/down vane.
    pub const VERTICAL: Self = Self::new(7, 5);

    /// `positions` must be at least 2 and `swing_code` must lie outside
    /// `0..=positions`; checked when the axis constants are evaluated.
    const fn new(swing_code: u8, positions: u8) -> Self {
        assert!(positions >= 2, "a vane axis needs at least two positions");
        assert!(swing_code > positions, "swing code overlaps the fixed positions");
        Self {
            swing_code,
            positions,
        }
    }

    /// Returns the swing code.
    #[must_use]
    pub fn swing_code(&self) -> u8 {
        self.swing_code
    }

    /// Returns the number of fixed positions.
    #[must_use]
    pub fn positions(&self) -> u8 {
        self.positions
    }

    /// Decodes an appliance code, `None` when the code is unmapped.
    #[must_use]
    pub fn decode(&self, code: u8) -> Option<VanePosition> {
        if code == Self::AUTO_CODE {
            return Some(VanePosition::Auto);
        }
        if code == self.swing_code {
            return Some(VanePosition::Swing);
        }
        if (1..=self.positions).contains(&code) {
            let span = f64::from(self.positions - 1);
            return Some(VanePosition::Fraction(f64::from(code - 1) / span));
        }
        None
    }

    /// Encodes a position, rounding fractions to the nearest fixed position.
    ///
    /// Fractions outside `[0, 1]` have no code.
    #[must_use]
    pub fn encode(&self, position: VanePosition) -> Option<u8> {
        match position {
            VanePosition::Auto => Some(Self::AUTO_CODE),
            VanePosition::Swing => Some(self.swing_code),
            VanePosition::Fraction(n) if (0.0..=1.0).contains(&n) => {
                let span = f64::from(self.positions - 1);
                // Bounded by `positions` after the range check above.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let code = (n * span).round() as u8 + 1;
                Some(code)
            }
            VanePosition::Fraction(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_positions_round_trip() {
        for axis in [VaneAxis::HORIZONTAL, VaneAxis::VERTICAL] {
            for code in 1..=axis.positions() {
                let position = axis.decode(code).unwrap();
                assert_eq!(axis.encode(position), Some(code), "{axis:?} code {code}");
            }
        }
    }

    #[test]
    fn sentinels_round_trip() {
        let h = VaneAxis::HORIZONTAL;
        assert_eq!(h.decode(0), Some(VanePosition::Auto));
        assert_eq!(h.decode(12), Some(VanePosition::Swing));
        assert_eq!(h.encode(VanePosition::Auto), Some(0));
        assert_eq!(h.encode(VanePosition::Swing), Some(12));

        let v = VaneAxis::VERTICAL;
        assert_eq!(v.decode(7), Some(VanePosition::Swing));
        assert_eq!(v.encode(VanePosition::Swing), Some(7));
    }

    #[test]
    fn evenly_spaced_fractions() {
        let v = VaneAxis::VERTICAL;
        assert_eq!(v.decode(1), Some(VanePosition::Fraction(0.0)));
        assert_eq!(v.decode(2), Some(VanePosition::Fraction(0.25)));
        assert_eq!(v.decode(5), Some(VanePosition::Fraction(1.0)));
    }

    #[test]
    fn every_mapped_code_decodes_to_a_valid_position() {
        for axis in [VaneAxis::HORIZONTAL, VaneAxis::VERTICAL] {
            for code in 0..=u8::MAX {
                if let Some(VanePosition::Fraction(n)) = axis.decode(code) {
                    assert!((0.0..=1.0).contains(&n), "{axis:?} code {code} gave {n}");
                }
            }
        }
    }

    #[test]
    fn unmapped_codes_decode_to_none() {
        assert_eq!(VaneAxis::VERTICAL.decode(6), None);
        assert_eq!(VaneAxis::HORIZONTAL.decode(8), None);
        assert_eq!(VaneAxis::HORIZONTAL.decode(7), None);
    }

    #[test]
    fn encode_rounds_to_nearest_position() {
        let v = VaneAxis::VERTICAL;
        assert_eq!(v.encode(VanePosition::Fraction(0.3)), Some(2));
        assert_eq!(v.encode(VanePosition::Fraction(0.4)), Some(3));
        assert_eq!(v.encode(VanePosition::Fraction(1.5)), None);
        assert_eq!(v.encode(VanePosition::Fraction(-0.1)), None);
    }

    #[test]
    fn serde_representation() {
        assert_eq!(
            serde_json::to_string(&VanePosition::Swing).unwrap(),
            "\"swing\""
        );
        assert_eq!(
            serde_json::to_string(&VanePosition::Fraction(0.5)).unwrap(),
            "0.5"
        );

        let parsed: VanePosition = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(parsed, VanePosition::Auto);
        let parsed: VanePosition = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, VanePosition::Fraction(1.0));

        assert!(serde_json::from_str::<VanePosition>("\"left\"").is_err());
        assert!(serde_json::from_str::<VanePosition>("2").is_err());
    }
}
