//! Validated, interned record identifiers.
//!
//! The server assigns every record a 36-character id (lowercase hex and
//! hyphens). Instances are interned in a process-wide table, so two lookups
//! of the same textual id share one allocation. The table is unbounded for
//! the process lifetime; the id space touched in one run is small.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Length of a server-assigned record id.
const ID_LEN: usize = 36;

/// Process-wide intern table, keyed by the textual id.
static INTERN: LazyLock<Mutex<HashMap<String, Arc<str>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Shared empty sentinel, distinct from every valid id.
static EMPTY: LazyLock<Arc<str>> = LazyLock::new(|| Arc::from(""));

/// A server-assigned record id.
///
/// Every live instance has passed format validation; construction of an
/// invalid id fails with [`Error::Format`]. The empty sentinel is obtained
/// via [`RecordId::empty`] (or [`RecordId::get`] on an empty string) and is
/// never equal to a valid id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(Arc<str>);

impl RecordId {
    /// Returns true iff `s` is exactly 36 characters of `[a-f0-9-]`.
    #[must_use]
    pub fn validate(s: &str) -> bool {
        s.len() == ID_LEN
            && s.bytes()
                .all(|b| matches!(b, b'a'..=b'f' | b'0'..=b'9' | b'-'))
    }

    /// Returns the interned id for `s`.
    ///
    /// An empty `s` yields the shared empty sentinel. Otherwise `s` is
    /// validated and either the cached instance is returned or a new one is
    /// constructed and interned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if `s` is non-empty and fails validation.
    pub fn get(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        if !Self::validate(s) {
            return Err(Error::Format(s.to_string()));
        }
        let mut table = INTERN.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let interned = table
            .entry(s.to_string())
            .or_insert_with(|| Arc::from(s))
            .clone();
        Ok(Self(interned))
    }

    /// Returns the shared empty sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self(Arc::clone(&EMPTY))
    }

    /// Returns true for the empty sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true iff `self` and `other` share the same interned
    /// allocation.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for RecordId {
    /// The empty sentinel.
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::get(&s).map_err(D::Error::custom)
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

    const VALID: &str = "11111111-2222-3333-4444-555555555555";

    #[test]
    fn validate_accepts_canonical_ids() {
        assert!(RecordId::validate(VALID));
        assert!(RecordId::validate("abcdefabcdefabcdefabcdefabcdefabcdef"));
    }

    #[test]
    fn validate_rejects_bad_lengths() {
        assert!(!RecordId::validate(""));
        assert!(!RecordId::validate("abc"));
        assert!(!RecordId::validate(&format!("{VALID}0")));
    }

    #[test]
    fn validate_rejects_bad_characters() {
        // Uppercase hex is not accepted.
        assert!(!RecordId::validate("11111111-2222-3333-4444-55555555555A"));
        assert!(!RecordId::validate("g1111111-2222-3333-4444-555555555555"));
        assert!(!RecordId::validate("11111111 2222 3333 4444 555555555555"));
    }

    #[test]
    fn get_interns_and_round_trips() {
        let a = RecordId::get(VALID).unwrap();
        let b = RecordId::get(VALID).unwrap();
        assert_eq!(a, b);
        assert!(a.same_instance(&b));
        assert_eq!(a.to_string(), VALID);
        assert_eq!(a.as_str(), VALID);
    }

    #[test]
    fn get_rejects_invalid() {
        let err = RecordId::get("not-an-id").unwrap_err();
        assert!(matches!(err, Error::Format(s) if s == "not-an-id"));
    }

    #[test]
    fn empty_sentinel_is_shared_and_distinct() {
        let a = RecordId::get("").unwrap();
        let b = RecordId::empty();
        assert!(a.is_empty());
        assert!(a.same_instance(&b));
        let valid = RecordId::get(VALID).unwrap();
        assert_ne!(a, valid);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = RecordId::get("aaaaaaaa-0000-0000-0000-000000000000").unwrap();
        let b = RecordId::get("bbbbbbbb-0000-0000-0000-000000000000").unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_round_trip() {
        let id = RecordId::get(VALID).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{VALID}\""));
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert!(back.same_instance(&id));
    }

    #[test]
    fn deserialize_rejects_invalid() {
        let result: std::result::Result<RecordId, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }
}
