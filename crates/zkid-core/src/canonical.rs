//! # Canonical Serialization
//!
//! `CanonicalBytes` is the sole construction path for bytes that are signed
//! or digested anywhere in zkid. Token signatures are HMACs over the
//! canonical form of the unsigned payload; circuit manifests are identified by
//! the SHA-256 of their canonical form.
//!
//! ## Security Invariant
//!
//! The inner field is private and `CanonicalBytes::new()` is the only
//! constructor. Any function that needs signable bytes takes
//! `&CanonicalBytes`, so a caller cannot accidentally MAC a `serde_json::to_vec`
//! output whose key order depends on struct field order.
//!
//! ## Rules
//!
//! 1. Floats are rejected. Amounts, timestamps and field elements are carried
//!    as integers or strings.
//! 2. Object keys are sorted; separators are compact (RFC 8785 via `serde_jcs`).
//! 3. `Timestamp` values serialize as `YYYY-MM-DDTHH:MM:SSZ`.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
///
/// # Invariants
///
/// - Sorted object keys at every nesting level.
/// - No float numbers anywhere in the tree.
/// - Compact separators, UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `CanonicalizationError::FloatRejected` if the value contains a
    /// non-integral number; `SerializationFailed` if serde fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the owned byte vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the value tree and fail on the first float.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(arr) => arr.iter().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_compactly() {
        let cb = CanonicalBytes::new(&json!({"nonce": "ab", "expiresAt": 5, "version": 1})).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"expiresAt":5,"nonce":"ab","version":1}"#
        );
    }

    #[test]
    fn nested_objects_are_sorted() {
        let cb = CanonicalBytes::new(&json!({
            "issuer": {"name": "Acme", "id": "acme-1"},
            "list": [3, 2, 1]
        }))
        .unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"issuer":{"id":"acme-1","name":"Acme"},"list":[3,2,1]}"#
        );
    }

    #[test]
    fn struct_field_order_does_not_matter() {
        #[derive(Serialize)]
        struct A {
            b: u32,
            a: u32,
        }
        #[derive(Serialize)]
        struct B {
            a: u32,
            b: u32,
        }
        let x = CanonicalBytes::new(&A { b: 2, a: 1 }).unwrap();
        let y = CanonicalBytes::new(&B { a: 1, b: 2 }).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn float_rejected() {
        match CanonicalBytes::new(&json!({"amount": 1.5})) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 1.5),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
    }

    #[test]
    fn deeply_nested_float_rejected() {
        assert!(CanonicalBytes::new(&json!({"a": {"b": [{"c": 0.25}]}})).is_err());
    }

    #[test]
    fn large_integers_pass() {
        let cb = CanonicalBytes::new(&json!({"v": u64::MAX})).unwrap();
        assert_eq!(cb.as_bytes(), format!(r#"{{"v":{}}}"#, u64::MAX).as_bytes());
    }

    #[test]
    fn empty_object() {
        let cb = CanonicalBytes::new(&json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert!(!cb.is_empty());
    }
}
