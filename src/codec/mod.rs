// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codecs between appliance control codes and normalized values.
//!
//! The cloud exposes vane positions, fan speeds and operating modes as small
//! integers whose meaning depends on the unit. These codecs map them to
//! stable values:
//!
//! - [`VanePosition`] via a [`VaneAxis`]: `auto`, `swing`, or a fraction
//! - [`FanSpeed`]: `auto` or a fraction of the fastest speed
//! - [`OperationMode`]: `heat`, `dry`, `cool`, `fan`, `auto`
//!
//! All functions are pure.

mod fan;
mod mode;
mod vane;

pub use fan::FanSpeed;
pub use mode::OperationMode;
pub use vane::{VaneAxis, VanePosition};

use serde::{Deserialize, Serialize};

/// Wire representation shared by values that are either a word or a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Repr {
    Word(String),
    Number(f64),
}
