//! Canonical JSON encoding for hash inputs.
//!
//! Replicas must agree byte-for-byte on the encoding of an operation before
//! hashing it, so object keys are sorted at every depth and the output is
//! compact. Arrays keep their element order.

use serde_json::{Map, Value};

use crate::vertex::Operation;

/// Produce a canonical JSON string from a [`serde_json::Value`].
///
/// ```
/// use serde_json::json;
/// use hashgraph_core::canonical::canonicalize_json;
///
/// let val = json!({"z": 1, "a": {"c": 3, "b": 2}});
/// assert_eq!(canonicalize_json(&val), r#"{"a":{"b":2,"c":3},"z":1}"#);
/// ```
#[must_use]
pub fn canonicalize_json(value: &Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    buf
}

/// Canonical encoding of an [`Operation`] as it enters the vertex hash.
///
/// The field set is fixed (`drp_type`, `op_type`, `value`) and a missing tag
/// is encoded as `null`, so the root operation always encodes the same way.
#[must_use]
pub fn canonical_operation_json(operation: &Operation) -> String {
    let mut map = Map::new();
    map.insert(
        "drp_type".to_string(),
        operation
            .drp_type
            .map_or(Value::Null, |tag| Value::String(tag.as_str().to_string())),
    );
    map.insert(
        "op_type".to_string(),
        Value::String(operation.op_type.clone()),
    );
    map.insert("value".to_string(), operation.value.clone());
    canonicalize_json(&Value::Object(map))
}

fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        // Display on a scalar Value already yields compact, escaped JSON.
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            buf.push_str(&value.to_string());
        }
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            buf.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                buf.push_str(&Value::String(key.clone()).to_string());
                buf.push(':');
                write_canonical(val, buf);
            }
            buf.push('}');
        }
    }
}
