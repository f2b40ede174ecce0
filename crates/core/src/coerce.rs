//! Type coercion for loosely-typed request fields.
//!
//! Clients send form-style payloads where booleans frequently arrive as the
//! strings `"true"` / `"false"`. Every allow-listed partial update goes through
//! these helpers so the accepted forms are identical everywhere.

use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// Coerce a JSON value into a boolean.
///
/// - native booleans pass through
/// - strings compare case-insensitively against `"true"`; any other string is `false`
/// - every other JSON type is rejected
pub fn coerce_bool(field: &str, value: &Value) -> DomainResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
        _ => Err(DomainError::validation(format!("{field} must be a boolean"))),
    }
}

/// Coerce an optional query/body value, falling back to `default` when absent.
pub fn coerce_bool_or(field: &str, value: Option<&Value>, default: bool) -> DomainResult<bool> {
    match value {
        None | Some(Value::Null) => Ok(default),
        Some(v) => coerce_bool(field, v),
    }
}

/// Coerce a JSON value into a string.
///
/// Numbers and booleans are rendered as text; arrays/objects are rejected.
pub fn coerce_string(field: &str, value: &Value) -> DomainResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(DomainError::validation(format!("{field} must be a string"))),
    }
}

/// Coerce into an optional string; JSON `null` clears the field.
pub fn coerce_opt_string(field: &str, value: &Value) -> DomainResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => coerce_string(field, other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_accepts_native_and_string_forms() {
        assert!(coerce_bool("f", &json!(true)).unwrap());
        assert!(!coerce_bool("f", &json!(false)).unwrap());
        assert!(coerce_bool("f", &json!("TRUE")).unwrap());
        assert!(coerce_bool("f", &json!("True")).unwrap());
        assert!(!coerce_bool("f", &json!("false")).unwrap());
        assert!(!coerce_bool("f", &json!("FaLsE")).unwrap());
    }

    #[test]
    fn unrecognised_strings_read_as_false() {
        assert!(!coerce_bool("f", &json!("yes")).unwrap());
        assert!(!coerce_bool("f", &json!("")).unwrap());
    }

    #[test]
    fn non_string_non_bool_is_rejected() {
        let err = coerce_bool("is_like_enabled", &json!(1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().contains("is_like_enabled"));
        assert!(coerce_bool("f", &json!(null)).is_err());
    }

    #[test]
    fn bool_or_defaults_when_absent() {
        assert!(coerce_bool_or("f", None, true).unwrap());
        assert!(!coerce_bool_or("f", Some(&json!(null)), false).unwrap());
        assert!(coerce_bool_or("f", Some(&json!("true")), false).unwrap());
    }

    #[test]
    fn string_coercion() {
        assert_eq!(coerce_string("f", &json!("x")).unwrap(), "x");
        assert_eq!(coerce_string("f", &json!(3)).unwrap(), "3");
        assert!(coerce_string("f", &json!([1])).is_err());
        assert_eq!(coerce_opt_string("f", &json!(null)).unwrap(), None);
    }
}
