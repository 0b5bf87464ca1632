// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The appliance's own contact schedule with the cloud.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::{Diff, DiffBuilder};

use super::RawState;

/// When the unit last talked to the cloud and when it will next.
///
/// The cloud sends these timestamps without a zone; they are UTC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Previous contact.
    pub prev: Option<DateTime<Utc>>,
    /// Next expected contact.
    pub next: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Reads the schedule from a raw state.
    #[must_use]
    pub fn from_raw(raw: &RawState) -> Self {
        Self {
            prev: raw.str_field("LastCommunication").and_then(parse_timestamp),
            next: raw.str_field("NextCommunication").and_then(parse_timestamp),
        }
    }

    /// Returns the fields that differ in `next`.
    #[must_use]
    pub fn diff(&self, next: &Self) -> Diff {
        let mut builder = DiffBuilder::new();
        builder
            .field("prev", &self.prev, &next.prev)
            .field("next", &self.next, &next.next);
        builder.finish()
    }
}

/// Parses a cloud timestamp, with or without zone designator.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
