use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Fields that legitimately differ between the two systems for the same logical message.
const VOLATILE_FIELDS: &[&str] = &["metadata", "timestamp", "timetoken"];

/// Recursively sort object keys and drop volatile fields. Integer-valued floats are written as
/// integers so `1.0` and `1` hash alike.
///
/// serde_json keeps object keys sorted already, but we rebuild every map anyway so the canonical
/// form does not depend on which map implementation serde_json was compiled with.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|key| !VOLATILE_FIELDS.contains(&key.as_str()))
                .collect();
            keys.sort();

            let mut canonical = Map::with_capacity(keys.len());
            for key in keys {
                canonical.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(canonical)
        }
        Value::Number(number) => Value::Number(canonical_number(number)),
        other => other.clone(),
    }
}

fn canonical_number(number: &Number) -> Number {
    match number.as_f64() {
        Some(float)
            if number.is_f64()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float < i64::MAX as f64 =>
        {
            Number::from(float as i64)
        }
        _ => number.clone(),
    }
}

/// SHA-256 of the canonical JSON text of some message content, hex encoded.
/// There is nothing to hash for null content.
pub fn hash_content(content: &Value) -> Option<String> {
    if content.is_null() {
        return None;
    }

    let canonical = canonicalize(content).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    Some(digest.iter().fold(String::new(), |mut acc, byte| {
        let _ = write!(acc, "{:02x}", byte);
        acc
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_drops_volatile_fields_at_every_depth() {
        let canonical = canonicalize(&json!({
            "text": "hi",
            "timestamp": 1,
            "metadata": {"a": 1},
            "nested": {"timetoken": "1", "keep": [{"metadata": 2, "x": 1}]},
        }));

        assert_eq!(
            canonical,
            json!({"text": "hi", "nested": {"keep": [{"x": 1}]}})
        );
    }

    #[test]
    fn test_hash_ignores_key_order_and_volatile_fields() {
        let a = hash_content(&json!({"a": 1, "b": {"c": 2}, "timestamp": 5}));
        let b = hash_content(&json!({"b": {"c": 2}, "a": 1, "metadata": {"sent": true}}));

        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(a.unwrap().len(), 64);
    }

    #[test]
    fn test_integer_valued_floats_hash_as_integers() {
        assert_eq!(
            canonicalize(&json!({"count": 1.0, "ratio": 0.5, "list": [-3.0]})),
            json!({"count": 1, "ratio": 0.5, "list": [-3]})
        );
        assert_eq!(
            hash_content(&json!({"count": 1.0})),
            hash_content(&json!({"count": 1}))
        );
        assert_ne!(
            hash_content(&json!({"count": 1.5})),
            hash_content(&json!({"count": 1}))
        );
    }

    #[test]
    fn test_hash_differs_for_different_content() {
        assert_ne!(
            hash_content(&json!({"text": "hi"})),
            hash_content(&json!({"text": "bye"}))
        );
    }

    #[test]
    fn test_null_has_no_hash() {
        assert_eq!(hash_content(&Value::Null), None);
    }
}
