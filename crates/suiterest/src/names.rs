//! Module name to storage table name mapping.
//!
//! A naming heuristic, not a guarantee: the server does not expose table
//! names, so callers must treat the result as a best-effort default.

/// Modules whose table name does not follow the pluralisation rule.
const TABLE_OVERRIDES: &[(&str, &str)] = &[("Projects", "Project")];

/// Returns the storage table name for a module.
///
/// Irregular modules come from the override table; otherwise the module name
/// is returned unchanged when it already ends in `s` and pluralised with a
/// trailing `s` when it does not.
#[must_use]
pub fn table_name(module: &str) -> String {
    if let Some((_, table)) = TABLE_OVERRIDES.iter().find(|(name, _)| *name == module) {
        return (*table).to_string();
    }
    if module.ends_with('s') {
        module.to_string()
    } else {
        format!("{module}s")
    }
}

/// Lowercase singular key of a module name, as used in query-string
/// parameters (`Contacts` -> `contact`).
pub(crate) fn singular_key(module: &str) -> String {
    module.strip_suffix('s').unwrap_or(module).to_lowercase()
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

    #[test]
    fn irregular_modules_use_the_override() {
        assert_eq!(table_name("Projects"), "Project");
    }

    #[test]
    fn plural_modules_pass_through() {
        assert_eq!(table_name("Accounts"), "Accounts");
        assert_eq!(table_name("Contacts"), "Contacts");
    }

    #[test]
    fn singular_modules_are_pluralised() {
        assert_eq!(table_name("Lead"), "Leads");
    }

    #[test]
    fn singular_key_strips_one_s_and_lowercases() {
        assert_eq!(singular_key("Contacts"), "contact");
        assert_eq!(singular_key("Leads"), "lead");
        // Only the final `s` is stripped.
        assert_eq!(singular_key("Access"), "acces");
    }
}
