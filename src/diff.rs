// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural diffs.
//!
//! A [`Diff`] maps each changed field to its new value. Structured fields
//! (objects and arrays) that changed map to a nested diff rather than the
//! whole new value, and a structured field whose nested diff is empty is
//! left out entirely. Fields that disappeared map to `null`.
//!
//! [`diff`] works over untyped JSON and is used for the raw cloud payload.
//! The normalized records diff themselves field by field through
//! [`DiffBuilder`].
//!
//! # Examples
//!
//! ```
//! use melcloud_mqtt::diff::diff;
//! use serde_json::json;
//!
//! let before = json!({ "Power": true, "Zone": { "A": 1, "B": 2 } });
//! let after = json!({ "Power": true, "Zone": { "A": 1, "B": 3 } });
//!
//! let changes = diff(&before, &after);
//! assert_eq!(serde_json::Value::Object(changes), json!({ "Zone": { "B": 3 } }));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Changed fields between two versions of a record.
pub type Diff = Map<String, Value>;

/// Computes the structural diff from `old` to `new`.
///
/// Keys are taken from the union of both sides. Non-object values are treated
/// as having no keys, so diffing against `Value::Null` lists every field of
/// the other side.
#[must_use]
pub fn diff(old: &Value, new: &Value) -> Diff {
    let mut result = Diff::new();

    for key in keys(old).chain(keys(new)) {
        if result.contains_key(&key) {
            continue;
        }

        let before = field(old, &key);
        let after = field(new, &key);

        if let Some(change) = diff_field(before, after) {
            result.insert(key, change);
        }
    }

    result
}

/// Computes the change for a single field, `None` when nothing changed.
fn diff_field(before: Option<&Value>, after: Option<&Value>) -> Option<Value> {
    match (before, after) {
        (None, None) => None,
        (Some(a), Some(b)) if strict_eq(a, b) => None,
        (Some(a), Some(b)) if is_structured(a) && is_structured(b) => {
            let nested = diff(a, b);
            if nested.is_empty() {
                None
            } else {
                Some(Value::Object(nested))
            }
        }
        (_, Some(b)) => Some(b.clone()),
        (Some(_), None) => Some(Value::Null),
    }
}

/// Equality of two JSON values, comparing numbers by numeric value.
pub(crate) fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn keys(value: &Value) -> Box<dyn Iterator<Item = String> + '_> {
    match value {
        Value::Object(map) => Box::new(map.keys().cloned()),
        Value::Array(items) => Box::new((0..items.len()).map(|i| i.to_string())),
        _ => Box::new(std::iter::empty()),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Field-by-field diff of a typed record.
///
/// Each call to [`field`](Self::field) compares one field of the previous and
/// next record and records the new value when they differ.
#[derive(Debug, Default)]
pub struct DiffBuilder {
    changes: Diff,
}

impl DiffBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares one field, recording `next` under `name` when it differs.
    pub fn field<T>(&mut self, name: &str, previous: &T, next: &T) -> &mut Self
    where
        T: PartialEq + Serialize,
    {
        if previous != next {
            let value = serde_json::to_value(next).unwrap_or(Value::Null);
            self.changes.insert(name.to_string(), value);
        }
        self
    }

    /// Returns the collected changes.
    #[must_use]
    pub fn finish(self) -> Diff {
        self.changes
    }
}

/// Renders a record as a diff containing every one of its fields.
///
/// Used for baseline notifications, where the whole record counts as changed.
#[must_use]
pub fn full<T: Serialize>(record: &T) -> Diff {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Diff::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Applies a diff onto a value, the way a consumer of notifications would.
    fn apply(target: &mut Value, changes: &Diff) {
        for (key, change) in changes {
            if let Value::Object(nested) = change
                && let Some(existing) = target.get_mut(key.as_str())
                && existing.is_object()
            {
                apply(existing, nested);
                continue;
            }

            if let Value::Object(map) = target {
                if change.is_null() {
                    map.remove(key);
                } else {
                    map.insert(key.clone(), change.clone());
                }
            }
        }
    }

    #[test]
    fn diff_of_value_with_itself_is_empty() {
        let samples = [
            json!({}),
            json!({ "Power": true, "SetTemperature": 21.5 }),
            json!({ "Nested": { "List": [1, 2, { "Deep": null }] } }),
            json!([1, "two", { "three": 3 }]),
        ];

        for sample in &samples {
            assert!(diff(sample, sample).is_empty(), "{sample}");
        }
    }

    #[test]
    fn changed_leaf_is_reported_with_new_value() {
        let a = json!({ "Power": false, "RoomTemperature": 20 });
        let b = json!({ "Power": true, "RoomTemperature": 20 });

        assert_eq!(Value::Object(diff(&a, &b)), json!({ "Power": true }));
    }

    #[test]
    fn numbers_compare_by_value() {
        let a = json!({ "SetTemperature": 22 });
        let b = json!({ "SetTemperature": 22.0 });

        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn added_and_removed_keys() {
        let a = json!({ "Old": 1, "Kept": 2 });
        let b = json!({ "Kept": 2, "New": { "Inner": true } });

        assert_eq!(
            Value::Object(diff(&a, &b)),
            json!({ "Old": null, "New": { "Inner": true } })
        );
    }

    #[test]
    fn nested_change_reports_only_changed_leaves() {
        let a = json!({ "Zone": { "A": 1, "B": { "C": 2, "D": 3 } } });
        let b = json!({ "Zone": { "A": 1, "B": { "C": 2, "D": 4 } } });

        assert_eq!(
            Value::Object(diff(&a, &b)),
            json!({ "Zone": { "B": { "D": 4 } } })
        );
    }

    #[test]
    fn structurally_equal_nested_values_are_omitted() {
        let a: Value = serde_json::from_str(r#"{"Zone":{"A":1,"B":2},"X":1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"X":1,"Zone":{"B":2,"A":1}}"#).unwrap();

        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn arrays_diff_by_index() {
        let a = json!({ "List": [1, 2, 3] });
        let b = json!({ "List": [1, 5, 3] });

        assert_eq!(Value::Object(diff(&a, &b)), json!({ "List": { "1": 5 } }));
    }

    #[test]
    fn structured_value_replaced_by_scalar_is_verbatim() {
        let a = json!({ "Zone": { "A": 1 } });
        let b = json!({ "Zone": 7 });

        assert_eq!(Value::Object(diff(&a, &b)), json!({ "Zone": 7 }));
    }

    #[test]
    fn diff_against_null_lists_every_field() {
        let b = json!({ "Power": true, "Mode": 1 });
        assert_eq!(Value::Object(diff(&Value::Null, &b)), b);
    }

    #[test]
    fn applying_diff_reproduces_new_value() {
        let a = json!({
            "Power": false,
            "Gone": 1,
            "Zone": { "A": 1, "B": { "C": 2 } },
            "Same": { "X": [1, 2] }
        });
        let b = json!({
            "Power": true,
            "Zone": { "A": 1, "B": { "C": 9 }, "E": "new" },
            "Same": { "X": [1, 2] },
            "Added": { "Y": false }
        });

        let mut patched = a.clone();
        apply(&mut patched, &diff(&a, &b));
        assert_eq!(patched, b);
    }

    #[test]
    fn builder_records_only_changed_fields() {
        let mut builder = DiffBuilder::new();
        builder
            .field("power", &Some(true), &Some(false))
            .field("target", &Some(21.0), &Some(21.0))
            .field("mode", &Some("heat"), &None::<&str>);

        assert_eq!(
            Value::Object(builder.finish()),
            json!({ "power": false, "mode": null })
        );
    }

    #[test]
    fn full_lists_every_serialized_field() {
        #[derive(Serialize)]
        struct Sample {
            a: u8,
            b: bool,
        }

        assert_eq!(
            Value::Object(full(&Sample { a: 1, b: true })),
            json!({ "a": 1, "b": true })
        );
    }
}
