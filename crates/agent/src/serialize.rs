//! Best-effort serialization of console arguments and caught errors.
//!
//! Primitives pass through untouched, errors become `{name, message,
//! stack}`, other values are deep-cloned via structural serialization, and
//! anything that refuses to serialize is coerced to its debug string. A
//! serialization failure is never allowed to escape into the embedded
//! program's execution.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// An error value caught inside the document, reduced to the wire shape.
#[derive(Clone, Debug, Serialize)]
pub struct CaughtError {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Structurally serialize one value, coercing to a string on failure.
pub fn serialize_arg<T: Serialize + fmt::Debug>(arg: &T) -> Value {
    serde_json::to_value(arg).unwrap_or_else(|_| Value::String(format!("{arg:?}")))
}

/// Serialize a caught error to the `{name, message, stack}` shape.
pub fn serialize_error(err: &CaughtError) -> Value {
    serialize_arg(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn primitives_pass_through() {
        assert_eq!(serialize_arg(&42), json!(42));
        assert_eq!(serialize_arg(&"hi"), json!("hi"));
        assert_eq!(serialize_arg(&true), json!(true));
    }

    #[test]
    fn structures_are_deep_cloned() {
        let mut map = BTreeMap::new();
        map.insert("score", 120);
        assert_eq!(serialize_arg(&map), json!({ "score": 120 }));
    }

    #[test]
    fn errors_take_the_wire_shape() {
        let value = serialize_error(&CaughtError {
            name: "TypeError".into(),
            message: "x is not a function".into(),
            stack: None,
        });
        assert_eq!(
            value,
            json!({ "name": "TypeError", "message": "x is not a function" })
        );
    }

    #[test]
    fn unserializable_values_fall_back_to_string_coercion() {
        // A map with non-string keys cannot become a JSON object.
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "x");
        let value = serialize_arg(&map);
        assert!(matches!(value, Value::String(_)));
    }
}
