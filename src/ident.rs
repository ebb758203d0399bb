//! Identifier normalization
//!
//! The metadata documents and the database store the same identifiers in
//! whatever form the last editor left them: integers, floats, numeric
//! strings, sometimes nothing at all. Everything that compares ids funnels
//! through here first.

use serde_json::Value;

/// Canonicalize a JSON value into an integer identifier.
///
/// Null and non-scalar values are absent; booleans map to 0/1; floats count
/// only when they have no fractional part; strings are trimmed and parsed.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Some(f as i64),
                    _ => None,
                }
            }
        }
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                None
            } else {
                text.parse().ok()
            }
        }
        _ => None,
    }
}

/// Like [`as_int`], but treats the reserved book id sentinels `0` and `-1`
/// as absent. Applies to book identifiers only, never chapters/categories.
pub fn normalize_book_id(value: &Value) -> Option<i64> {
    strip_sentinels(as_int(value))
}

/// Map the `0`/`-1` "no book" sentinels to absent.
pub fn strip_sentinels(id: Option<i64>) -> Option<i64> {
    match id {
        Some(0) | Some(-1) => None,
        other => other,
    }
}

/// Whether a value is empty for alias-chain purposes: null, `false`, numeric
/// zero, and empty strings/collections all fall through to the next alias.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_int_scalars() {
        assert_eq!(as_int(&json!(7)), Some(7));
        assert_eq!(as_int(&json!(-3)), Some(-3));
        assert_eq!(as_int(&json!(7.0)), Some(7));
        assert_eq!(as_int(&json!(7.5)), None);
        assert_eq!(as_int(&json!(true)), Some(1));
        assert_eq!(as_int(&json!(false)), Some(0));
        assert_eq!(as_int(&Value::Null), None);
    }

    #[test]
    fn test_as_int_strings() {
        assert_eq!(as_int(&json!("7")), Some(7));
        assert_eq!(as_int(&json!("  42  ")), Some(42));
        assert_eq!(as_int(&json!("")), None);
        assert_eq!(as_int(&json!("   ")), None);
        assert_eq!(as_int(&json!("7.5")), None);
        assert_eq!(as_int(&json!("abc")), None);
    }

    #[test]
    fn test_as_int_rejects_collections() {
        assert_eq!(as_int(&json!([1])), None);
        assert_eq!(as_int(&json!({"id": 1})), None);
    }

    #[test]
    fn test_normalize_book_id_sentinels() {
        assert_eq!(normalize_book_id(&json!(0)), None);
        assert_eq!(normalize_book_id(&json!(-1)), None);
        assert_eq!(normalize_book_id(&json!("0")), None);
        assert_eq!(normalize_book_id(&json!("-1")), None);
        assert_eq!(normalize_book_id(&json!(7)), Some(7));
        assert_eq!(normalize_book_id(&json!("7")), Some(7));
        assert_eq!(normalize_book_id(&json!(7.0)), Some(7));
    }

    #[test]
    fn test_sentinels_apply_only_via_normalize() {
        // Chapter and category ids go through as_int, where 0 is a real id.
        assert_eq!(as_int(&json!(0)), Some(0));
        assert_eq!(as_int(&json!(-1)), Some(-1));
    }

    #[test]
    fn test_is_falsy() {
        assert!(is_falsy(&Value::Null));
        assert!(is_falsy(&json!(false)));
        assert!(is_falsy(&json!(0)));
        assert!(is_falsy(&json!(0.0)));
        assert!(is_falsy(&json!("")));
        assert!(!is_falsy(&json!(5)));
        assert!(!is_falsy(&json!("x")));
    }
}
