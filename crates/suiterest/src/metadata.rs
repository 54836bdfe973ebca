//! Lazily cached module and field metadata.
//!
//! Module lists and per-module field shapes change only when an
//! administrator reconfigures the server, so they are fetched once per
//! session and memoized. Entries are immutable once populated; discard the
//! cache together with its session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::session::Session;
use crate::session::wire::{GetModuleFieldsRequest, SessionOnly};

/// Field types that participate in character search.
const SEARCHABLE_TYPES: &[&str] = &[
    "char", "email", "fullname", "name", "phone", "readonly", "text", "url", "varchar",
];

/// Known field types excluded from character search.
const UNSEARCHABLE_TYPES: &[&str] = &[
    "assigned_user_name",
    "bool",
    "currency",
    "date",
    "datetime",
    "datetimecombo",
    "decimal",
    "enum",
    "file",
    "float",
    "id",
    "image",
    "int",
    "link",
    "multienum",
    "parent",
    "parent_type",
    "relate",
];

/// One installed module.
#[derive(Debug, Clone, Deserialize)]
pub struct Module {
    /// Canonical module name (e.g. `Contacts`).
    pub module_key: String,
    /// Human-readable label.
    #[serde(default)]
    pub module_label: String,
}

/// `get_available_modules` response.
#[derive(Debug, Deserialize)]
struct ModulesResponse {
    #[serde(default)]
    modules: Vec<Module>,
}

/// One field of a module.
#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    /// Field name.
    #[serde(default)]
    pub name: String,
    /// Declared type (e.g. `varchar`, `link`).
    #[serde(rename = "type", default)]
    pub field_type: String,
    /// For `link` fields, the server-side relationship name.
    #[serde(default)]
    pub relationship: String,
}

impl Field {
    /// True for `link`-typed fields.
    #[must_use]
    pub fn is_link(&self) -> bool {
        self.field_type == "link"
    }
}

/// `get_module_fields` response: the field shape of one module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleFields {
    /// The module this shape belongs to.
    #[serde(default)]
    pub module_name: String,
    /// Ordinary fields.
    #[serde(default, deserialize_with = "field_map")]
    pub module_fields: Vec<Field>,
    /// Link fields (many-to-many relationships).
    #[serde(default, deserialize_with = "field_map")]
    pub link_fields: Vec<Field>,
}

impl ModuleFields {
    /// Iterates over ordinary and link fields alike.
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.module_fields.iter().chain(self.link_fields.iter())
    }
}

/// Deserializes a field map, tolerating the server's habit of emitting an
/// empty array where an empty map is meant.
fn field_map<'de, D>(deserializer: D) -> std::result::Result<Vec<Field>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(map) => map
            .into_values()
            .map(|v| serde_json::from_value::<Field>(v).map_err(serde::de::Error::custom))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|v| serde_json::from_value::<Field>(v).map_err(serde::de::Error::custom))
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a field map, got {other}"
        ))),
    }
}

/// Session-lifetime cache of module and field metadata.
///
/// Interior mutability keeps lookups `&self`; the locks are never held
/// across an await.
#[derive(Debug, Default)]
pub struct MetadataCache {
    modules: Mutex<Option<Arc<Vec<Module>>>>,
    fields: Mutex<HashMap<String, Arc<ModuleFields>>>,
}

impl MetadataCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the installed modules, fetching them on first access.
    ///
    /// # Errors
    ///
    /// Any error from the underlying `get_available_modules` call; once a
    /// fetch has succeeded, subsequent calls cannot fail.
    pub async fn modules(&self, session: &Session) -> Result<Arc<Vec<Module>>> {
        if let Some(cached) = self.lock_modules().clone() {
            return Ok(cached);
        }
        let request = SessionOnly {
            session: session.require_token()?,
        };
        let response: ModulesResponse = session
            .transport()
            .call("get_available_modules", &request)
            .await?;
        debug!(count = response.modules.len(), "module list fetched");
        let fetched = Arc::new(response.modules);

        let mut guard = self.lock_modules();
        // First population wins; entries are immutable for the session.
        let entry = guard.get_or_insert_with(|| Arc::clone(&fetched));
        Ok(Arc::clone(entry))
    }

    /// Returns the field shape of `module`, fetching it on first access.
    ///
    /// # Errors
    ///
    /// Any error from the underlying `get_module_fields` call; once a fetch
    /// has succeeded for `module`, subsequent calls for it cannot fail.
    pub async fn module_fields(&self, session: &Session, module: &str) -> Result<Arc<ModuleFields>> {
        if let Some(cached) = self.lock_fields().get(module).cloned() {
            return Ok(cached);
        }
        let request = GetModuleFieldsRequest {
            session: session.require_token()?,
            module_name: module,
        };
        let response: ModuleFields = session
            .transport()
            .call("get_module_fields", &request)
            .await?;
        debug!(
            module,
            fields = response.module_fields.len(),
            links = response.link_fields.len(),
            "field metadata fetched"
        );
        let fetched = Arc::new(response);

        let mut guard = self.lock_fields();
        let entry = guard
            .entry(module.to_string())
            .or_insert_with(|| Arc::clone(&fetched));
        Ok(Arc::clone(entry))
    }

    /// Returns the modules related to email, i.e. those with at least one
    /// field named `email_*` or `*_email`.
    ///
    /// Modules whose field fetch fails are skipped with a warning rather
    /// than aborting the scan; heavily customised servers routinely carry
    /// exotic modules with broken metadata.
    ///
    /// # Errors
    ///
    /// Only a failure of the initial module-list fetch.
    pub async fn modules_with_email_fields(&self, session: &Session) -> Result<Vec<Module>> {
        let modules = self.modules(session).await?;
        let mut matching = Vec::new();
        for module in modules.iter() {
            match self.module_fields(session, &module.module_key).await {
                Ok(fields) => {
                    let has_email_field = fields
                        .all_fields()
                        .any(|f| f.name.starts_with("email_") || f.name.ends_with("_email"));
                    if has_email_field {
                        matching.push(module.clone());
                    }
                }
                Err(err) => {
                    warn!(module = %module.module_key, %err, "skipping module, field metadata unavailable");
                }
            }
        }
        Ok(matching)
    }

    /// Returns the names of `module`'s fields usable in character search.
    ///
    /// Custom-table fields (`*_c`) are excluded; they are not guaranteed to
    /// be queryable in the join used for search. Unrecognized declared types
    /// are logged and excluded.
    ///
    /// # Errors
    ///
    /// Any error from fetching the module's field shape.
    pub async fn char_searchable_fields(
        &self,
        session: &Session,
        module: &str,
    ) -> Result<Vec<String>> {
        let fields = self.module_fields(session, module).await?;
        let mut names = Vec::new();
        for field in fields.all_fields() {
            if SEARCHABLE_TYPES.contains(&field.field_type.as_str()) {
                if !field.name.ends_with("_c") {
                    names.push(field.name.clone());
                }
            } else if !UNSEARCHABLE_TYPES.contains(&field.field_type.as_str()) {
                debug!(
                    module,
                    field = %field.name,
                    field_type = %field.field_type,
                    "unrecognized field type, excluded from search"
                );
            }
        }
        Ok(names)
    }

    fn lock_modules(&self) -> std::sync::MutexGuard<'_, Option<Arc<Vec<Module>>>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_fields(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ModuleFields>>> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
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
    fn module_fields_accepts_maps_and_arrays() {
        let from_map: ModuleFields = serde_json::from_value(json!({
            "module_name": "Contacts",
            "module_fields": {
                "last_name": {"name": "last_name", "type": "varchar"},
                "email1": {"name": "email1", "type": "email"}
            },
            "link_fields": []
        }))
        .unwrap();
        assert_eq!(from_map.module_fields.len(), 2);
        assert!(from_map.link_fields.is_empty());
    }

    #[test]
    fn all_fields_chains_links() {
        let fields: ModuleFields = serde_json::from_value(json!({
            "module_name": "Contacts",
            "module_fields": {"last_name": {"name": "last_name", "type": "varchar"}},
            "link_fields": {
                "meetings": {
                    "name": "meetings",
                    "type": "link",
                    "relationship": "contacts_activities_meetings"
                }
            }
        }))
        .unwrap();
        let names: Vec<_> = fields.all_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"meetings"));
        assert!(fields.link_fields[0].is_link());
    }

    #[test]
    fn field_defaults_tolerate_sparse_shapes() {
        let field: Field = serde_json::from_value(json!({"name": "status"})).unwrap();
        assert_eq!(field.field_type, "");
        assert_eq!(field.relationship, "");
        assert!(!field.is_link());
    }
}
