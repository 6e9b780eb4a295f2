//! Usability predicates for dual-source resolution.
//!
//! A response can be a perfectly valid 200 and still carry nothing worth
//! showing. These predicates separate "answered" from "answered with data".

use serde_json::Value;

/// Generic check for JSON payloads.
///
/// Not usable: `null`, an object with a non-null `error` field, an empty array,
/// an empty object, or an object whose array-valued fields are all empty
/// (`{"blocks": []}`, `{"txs": [], "total": 0}`). Scalars are usable.
#[must_use]
pub fn is_usable_json(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => {
            if map.is_empty() {
                return false;
            }
            if map.get("error").is_some_and(|e| !e.is_null()) {
                return false;
            }
            let mut arrays = map.values().filter_map(Value::as_array).peekable();
            if arrays.peek().is_none() {
                return true;
            }
            arrays.any(|a| !a.is_empty())
        }
        _ => true,
    }
}

/// Usable when `field` (a `/`-separated JSON pointer path without the leading
/// slash, e.g. `"result/txs"`) is a non-empty array and no `error` is present.
pub fn non_empty_field(field: &str) -> impl Fn(&Value) -> bool + Send + Sync + Clone + 'static {
    let pointer = format!("/{}", field.trim_start_matches('/'));
    move |value: &Value| {
        if value.get("error").is_some_and(|e| !e.is_null()) {
            return false;
        }
        value.pointer(&pointer).and_then(Value::as_array).is_some_and(|a| !a.is_empty())
    }
}
