//! Wire types for the RPC methods.
//!
//! One explicit request struct per method gives compile-time shape checking
//! of outgoing payloads; response types mirror what v4.1 servers actually
//! emit (including the empty-map-as-array quirk).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::id::RecordId;

/// Credentials block of a login request.
#[derive(Debug, Serialize)]
pub(crate) struct UserAuth<'a> {
    pub user_name: &'a str,
    pub password: String,
    /// `"true"` for the LDAP-encrypted variant, `"PLAIN"` when the LDAP key
    /// is blank; omitted entirely for ordinary logins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<&'a str>,
}

/// `login` request.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub user_auth: UserAuth<'a>,
    pub application_name: &'a str,
}

/// `login` response.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    /// The issued session token.
    pub id: String,
    #[serde(default)]
    pub name_value_list: Value,
}

impl LoginResponse {
    /// Polling interval advertised by the server, when present.
    pub(crate) fn polling_interval(&self) -> Option<u64> {
        let entry = self.name_value_list.get("polling_interval")?;
        let value = entry.get("value").unwrap_or(entry);
        match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Request shape for methods that take only the session token
/// (`logout`, `get_user_id`, `get_available_modules`).
#[derive(Debug, Serialize)]
pub(crate) struct SessionOnly<'a> {
    pub session: &'a str,
}

/// `get_module_fields` request.
#[derive(Debug, Serialize)]
pub(crate) struct GetModuleFieldsRequest<'a> {
    pub session: &'a str,
    pub module_name: &'a str,
}

/// `get_entry_list` request.
#[derive(Debug, Serialize)]
pub(crate) struct GetEntryListRequest<'a> {
    pub session: &'a str,
    pub module_name: &'a str,
    pub query: &'a str,
    pub order_by: &'a str,
    pub offset: u32,
    pub select_fields: &'a [String],
    pub max_results: u32,
    pub deleted: u8,
}

/// `set_entry` request.
#[derive(Debug, Serialize)]
pub(crate) struct SetEntryRequest<'a> {
    pub session: &'a str,
    pub module_name: &'a str,
    pub name_value_list: &'a [NameValue],
}

/// `set_entry` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SetEntryResponse {
    pub id: String,
}

/// `get_relationships` request.
#[derive(Debug, Serialize)]
pub(crate) struct GetRelationshipsRequest<'a> {
    pub session: &'a str,
    pub module_name: &'a str,
    pub module_id: &'a str,
    pub link_field_name: &'a str,
    pub related_module_query: &'a str,
    pub related_fields: &'a [String],
    pub deleted: u8,
}

/// `set_relationship` request.
#[derive(Debug, Serialize)]
pub(crate) struct SetRelationshipRequest<'a> {
    pub session: &'a str,
    pub module_name: &'a str,
    pub module_id: &'a str,
    pub link_field_name: String,
    pub related_ids: [&'a str; 1],
    pub name_value_list: [NameValue; 0],
    pub delete: u8,
}

/// Counters returned by `set_relationship`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SetRelationshipResult {
    /// Links the server created (non-zero means the field name was accepted).
    #[serde(default)]
    pub created: i64,
    /// Links the server rejected.
    #[serde(default)]
    pub failed: i64,
    /// Links the server removed.
    #[serde(default)]
    pub deleted: i64,
}

/// One `name`/`value` pair, the server's universal field representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameValue {
    /// Field name.
    pub name: String,
    /// Field value; the server is loosely typed here.
    pub value: Value,
}

impl NameValue {
    /// Creates a pair from a field name and any JSON-representable value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One record of an entry-list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Record id, verbatim. Stock servers carry legacy short ids (the admin
    /// user is `1`), so this is kept textual; use [`Entry::record_id`] for a
    /// validated handle.
    pub id: String,
    /// Owning module.
    #[serde(default)]
    pub module_name: String,
    /// Field values, keyed by field name.
    #[serde(default, deserialize_with = "name_value_map")]
    pub name_value_list: HashMap<String, NameValue>,
}

impl Entry {
    /// Returns the entry's id as a validated, interned [`RecordId`].
    ///
    /// # Errors
    ///
    /// [`Error::Format`](crate::error::Error::Format) for ids that predate
    /// the 36-character format.
    pub fn record_id(&self) -> Result<RecordId> {
        RecordId::get(&self.id)
    }

    /// Returns a field value as a string slice, when present and textual.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&str> {
        self.name_value_list.get(field)?.value.as_str()
    }
}

/// `get_entry_list` / `get_relationships` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryList {
    /// Number of records in this page.
    #[serde(default)]
    pub result_count: i64,
    /// Total matching records, when the server reports it.
    #[serde(default)]
    pub total_count: Option<i64>,
    /// The records.
    #[serde(default)]
    pub entry_list: Vec<Entry>,
}

/// Deserializes a name/value map, tolerating the server's habit of emitting
/// an empty array where an empty map is meant.
fn name_value_map<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, NameValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                serde_json::from_value::<NameValue>(v)
                    .map(|nv| (k, nv))
                    .map_err(serde::de::Error::custom)
            })
            .collect(),
        Value::Array(_) | Value::Null => Ok(HashMap::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a name/value map, got {other}"
        ))),
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
    fn login_request_omits_encryption_by_default() {
        let request = LoginRequest {
            user_auth: UserAuth {
                user_name: "admin",
                password: "hashed".to_string(),
                encryption: None,
            },
            application_name: "suiterest",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["user_auth"]["user_name"], "admin");
        assert!(json["user_auth"].get("encryption").is_none());
    }

    #[test]
    fn login_response_polling_interval_variants() {
        let with_wrapped: LoginResponse = serde_json::from_value(json!({
            "id": "tok",
            "name_value_list": {"polling_interval": {"name": "polling_interval", "value": "30"}}
        }))
        .unwrap();
        assert_eq!(with_wrapped.polling_interval(), Some(30));

        let with_number: LoginResponse = serde_json::from_value(json!({
            "id": "tok",
            "name_value_list": {"polling_interval": 45}
        }))
        .unwrap();
        assert_eq!(with_number.polling_interval(), Some(45));

        let without: LoginResponse =
            serde_json::from_value(json!({"id": "tok", "name_value_list": {}})).unwrap();
        assert_eq!(without.polling_interval(), None);
    }

    #[test]
    fn entry_list_tolerates_empty_array_maps() {
        let list: EntryList = serde_json::from_value(json!({
            "result_count": 1,
            "entry_list": [{
                "id": "11111111-2222-3333-4444-555555555555",
                "module_name": "Contacts",
                "name_value_list": []
            }]
        }))
        .unwrap();
        assert_eq!(list.result_count, 1);
        assert!(list.entry_list[0].name_value_list.is_empty());
    }

    #[test]
    fn entry_list_tolerates_legacy_short_ids() {
        // The stock admin user's id is the literal "1"; one such record must
        // not fail the decode of the whole page.
        let list: EntryList = serde_json::from_value(json!({
            "result_count": 2,
            "entry_list": [
                {"id": "1", "module_name": "Users", "name_value_list": []},
                {
                    "id": "11111111-2222-3333-4444-555555555555",
                    "module_name": "Users",
                    "name_value_list": []
                }
            ]
        }))
        .unwrap();
        assert_eq!(list.entry_list[0].id, "1");
        assert!(list.entry_list[0].record_id().is_err());
        let valid = list.entry_list[1].record_id().unwrap();
        assert_eq!(valid.as_str(), "11111111-2222-3333-4444-555555555555");
    }

    #[test]
    fn entry_exposes_textual_values() {
        let entry: Entry = serde_json::from_value(json!({
            "id": "11111111-2222-3333-4444-555555555555",
            "module_name": "Contacts",
            "name_value_list": {
                "last_name": {"name": "last_name", "value": "Smith"}
            }
        }))
        .unwrap();
        assert_eq!(entry.value("last_name"), Some("Smith"));
        assert_eq!(entry.value("first_name"), None);
    }
}
