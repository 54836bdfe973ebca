//! The server's error envelope.
//!
//! Success and failure share one channel: any response body may be either
//! the payload the caller expects or an error object
//! `{number, name, description}`. The probe here runs before payload
//! decoding, because a loosely-typed payload (e.g. a bare string) can
//! spuriously absorb an error shape.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Application-level error envelope, all fields optional on the wire.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    /// Numeric error code; some server versions emit it as a string.
    #[serde(default)]
    number: Option<Value>,
    /// Short error name (e.g. `Invalid Login`).
    #[serde(default)]
    name: String,
    /// Human-readable description.
    #[serde(default)]
    description: String,
}

impl ErrorEnvelope {
    /// Probes a decoded response for the error shape.
    ///
    /// Returns `Some` only when the value decodes as an envelope **and** the
    /// envelope is non-blank; an all-blank match is a success payload that
    /// merely shares field names.
    pub(crate) fn probe(value: &Value) -> Option<Self> {
        let envelope: Self = serde_json::from_value(value.clone()).ok()?;
        if envelope.is_blank() { None } else { Some(envelope) }
    }

    /// Server-assigned code, coerced from number or numeric string.
    fn code(&self) -> i64 {
        match &self.number {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// True when code, name, and description are all blank.
    fn is_blank(&self) -> bool {
        self.code() == 0 && self.name.is_empty() && self.description.is_empty()
    }

    /// Returns the short error name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Converts the envelope into a crate error.
    pub(crate) fn into_error(self) -> Error {
        let code = self.code();
        Error::Server {
            code,
            name: self.name,
            description: self.description,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_matches_error_shape() {
        let value = json!({"number": 10, "name": "Invalid Login", "description": "bad"});
        let envelope = ErrorEnvelope::probe(&value).unwrap();
        assert_eq!(envelope.name(), "Invalid Login");
        match envelope.into_error() {
            Error::Server { code, name, description } => {
                assert_eq!(code, 10);
                assert_eq!(name, "Invalid Login");
                assert_eq!(description, "bad");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn probe_coerces_string_codes() {
        let value = json!({"number": "11", "name": "Invalid Session", "description": ""});
        let envelope = ErrorEnvelope::probe(&value).unwrap();
        match envelope.into_error() {
            Error::Server { code, .. } => assert_eq!(code, 11),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn probe_ignores_blank_envelopes() {
        assert!(ErrorEnvelope::probe(&json!({"number": 0, "name": "", "description": ""})).is_none());
        assert!(ErrorEnvelope::probe(&json!({"modules": ["Accounts"]})).is_none());
    }

    #[test]
    fn probe_ignores_non_object_payloads() {
        assert!(ErrorEnvelope::probe(&json!("a plain session id")).is_none());
        assert!(ErrorEnvelope::probe(&json!([1, 2, 3])).is_none());
    }
}
