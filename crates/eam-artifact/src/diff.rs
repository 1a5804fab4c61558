//! Field-level comparison of record field maps

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Ordered set of camelCase field names
pub type FieldSet = BTreeSet<String>;

/// Fields whose value differs between two field maps
///
/// A key missing on one side compares as `null`.
#[must_use]
pub fn changed_fields(before: &Map<String, Value>, after: &Map<String, Value>) -> FieldSet {
    before
        .keys()
        .chain(after.keys())
        .filter(|key| {
            before.get(*key).unwrap_or(&Value::Null) != after.get(*key).unwrap_or(&Value::Null)
        })
        .cloned()
        .collect()
}

/// Value of `field`, `null` when absent
#[must_use]
pub fn field_value(fields: &Map<String, Value>, field: &str) -> Value {
    fields.get(field).cloned().unwrap_or(Value::Null)
}
