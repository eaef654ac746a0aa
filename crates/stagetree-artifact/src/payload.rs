//! Stage payloads
//!
//! A [`StagePayload`] is the opaque JSON value a stage emits, checked at the
//! boundary and held together with its canonical serialization. The
//! canonical text is what gets fingerprinted.

use serde_json::{Map, Value};

/// Default upper bound on a payload's canonical size (8 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 8 * 1024 * 1024;

/// Validated stage content with its canonical JSON text
#[derive(Debug, Clone, PartialEq)]
pub struct StagePayload {
    value: Value,
    canonical: String,
}

impl StagePayload {
    /// Validate `value` with the default size limit
    ///
    /// # Errors
    /// Returns error if the value is `null` or too large
    pub fn new(value: Value) -> Result<Self, PayloadError> {
        Self::with_limit(value, DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Validate `value`, rejecting canonical text over `max_bytes`
    ///
    /// # Errors
    /// Returns error if the value is `null`, too large, or cannot be
    /// serialized
    pub fn with_limit(value: Value, max_bytes: usize) -> Result<Self, PayloadError> {
        if value.is_null() {
            return Err(PayloadError::Null);
        }
        let value = canonicalize(&value);
        let canonical = serde_json::to_string(&value)?;
        if canonical.len() > max_bytes {
            return Err(PayloadError::TooLarge {
                size: canonical.len(),
                max: max_bytes,
            });
        }
        Ok(Self { value, canonical })
    }

    /// Parse a payload from JSON text
    ///
    /// # Errors
    /// Returns error if the text is not JSON or fails validation
    pub fn from_json_str(text: &str, max_bytes: usize) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(text)?;
        Self::with_limit(value, max_bytes)
    }

    /// The JSON value (object keys sorted)
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Canonical JSON text used for fingerprinting
    #[inline]
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Take the JSON value out
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Rebuild `value` with every object's keys in sorted order
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical JSON text of `value`
///
/// # Errors
/// Returns error if serialization fails
pub fn canonical_json(value: &Value) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(&canonicalize(value))?)
}

/// Errors raised when accepting a payload
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Payload is JSON `null`
    #[error("stage payload must not be null")]
    Null,

    /// Payload exceeds the configured size
    #[error("stage payload too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// Serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_text_sorts_keys() {
        let payload = StagePayload::new(json!({"b": 1, "a": {"z": true, "y": [3, {"d": 0, "c": 1}]}}))
            .unwrap();
        assert_eq!(
            payload.canonical(),
            r#"{"a":{"y":[3,{"c":1,"d":0}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn null_is_rejected() {
        assert!(matches!(StagePayload::new(Value::Null), Err(PayloadError::Null)));
    }

    #[test]
    fn size_limit_is_enforced() {
        let result = StagePayload::with_limit(json!({"terms": "x".repeat(64)}), 16);
        assert!(matches!(result, Err(PayloadError::TooLarge { max: 16, .. })));
    }

    #[test]
    fn from_json_str_accepts_scalars() {
        let payload = StagePayload::from_json_str("\"hello\"", 1024).unwrap();
        assert_eq!(payload.canonical(), "\"hello\"");
    }

    #[test]
    fn from_json_str_reports_bad_json() {
        assert!(matches!(
            StagePayload::from_json_str("{oops", 1024),
            Err(PayloadError::Serialization(_))
        ));
    }
}
