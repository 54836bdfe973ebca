//! Best-effort resolution of many-to-many link fields.
//!
//! Link-field naming is server/schema-defined and not reliably predictable
//! across versions and customisations, so linking two records means trying a
//! ranked sequence of candidate field names until the server accepts one.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::id::RecordId;
use crate::metadata::MetadataCache;
use crate::session::Session;

/// Activity-like record kinds used to rank relationship-name candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkObjective {
    /// Meeting records.
    Meetings,
    /// Call records.
    Calls,
    /// Email records.
    Emails,
    /// Task records.
    Tasks,
}

impl LinkObjective {
    /// Derives the objective from a module name, when the module is
    /// activity-like.
    #[must_use]
    pub fn from_module(module: &str) -> Option<Self> {
        match module.to_lowercase().as_str() {
            "meetings" => Some(Self::Meetings),
            "calls" => Some(Self::Calls),
            "emails" => Some(Self::Emails),
            "tasks" => Some(Self::Tasks),
            _ => None,
        }
    }

    /// Lowercase substring looked for in relationship names.
    #[must_use]
    pub const fn needle(self) -> &'static str {
        match self {
            Self::Meetings => "meetings",
            Self::Calls => "calls",
            Self::Emails => "emails",
            Self::Tasks => "tasks",
        }
    }
}

/// Intent to create or remove one link between two records.
#[derive(Debug, Clone)]
pub struct LinkIntent {
    /// Module owning the link field.
    pub module_a: String,
    /// Record on the owning side.
    pub id_a: RecordId,
    /// Related module.
    pub module_b: String,
    /// Record on the related side.
    pub id_b: RecordId,
    /// Remove the link instead of creating it.
    pub delete: bool,
}

/// Outcome of one candidate attempt.
enum LinkAttempt {
    /// The server accepted the field name and created/removed the link.
    Linked,
    /// The field name was rejected (server no-op or call failure); try the
    /// next candidate.
    Rejected,
}

/// Resolves link intents by trying candidate field names in order.
///
/// Stateless beyond the metadata cache it consults.
#[derive(Debug)]
pub struct RelationshipResolver<'a> {
    session: &'a Session,
    metadata: &'a MetadataCache,
}

impl<'a> RelationshipResolver<'a> {
    /// Creates a resolver over an authenticated session and its cache.
    #[must_use]
    pub const fn new(session: &'a Session, metadata: &'a MetadataCache) -> Self {
        Self { session, metadata }
    }

    /// Resolves `intent`, returning true iff some candidate was accepted.
    ///
    /// Candidates, in order: the related module name as given, then
    /// `<module_b>_<module_a>`, then the owning module's activities-link
    /// fields for the objective implied by `module_b`. Rejected candidates
    /// have no observable side effect beyond the server's own no-op.
    ///
    /// Exhaustion is a normal outcome for callers (logged as a warning, not
    /// an error); callers that require the link must check the return value.
    pub async fn link(&self, intent: &LinkIntent) -> bool {
        let direct = intent.module_b.clone();
        let qualified = format!("{}_{}", intent.module_b, intent.module_a);
        for candidate in [direct, qualified] {
            if matches!(self.try_link(intent, &candidate).await, LinkAttempt::Linked) {
                return true;
            }
        }

        if let Some(objective) = LinkObjective::from_module(&intent.module_b) {
            match self
                .activities_link_fields(&intent.module_a, objective)
                .await
            {
                Ok(candidates) => {
                    for candidate in candidates {
                        if matches!(self.try_link(intent, &candidate).await, LinkAttempt::Linked)
                        {
                            return true;
                        }
                    }
                }
                Err(err) => {
                    warn!(module = %intent.module_a, %err, "could not enumerate activities links");
                }
            }
        }

        warn!(
            module_a = %intent.module_a,
            module_b = %intent.module_b,
            "no link field accepted, relationship not resolved"
        );
        false
    }

    /// Attempts `intent` through one candidate field name.
    async fn try_link(&self, intent: &LinkIntent, link_field_name: &str) -> LinkAttempt {
        match self
            .session
            .set_relationship(
                &intent.module_a,
                &intent.id_a,
                link_field_name,
                &intent.id_b,
                intent.delete,
            )
            .await
        {
            Ok(result) if result.created != 0 => {
                info!(
                    module = %intent.module_a,
                    link_field_name,
                    "relationship accepted"
                );
                LinkAttempt::Linked
            }
            Ok(result) => {
                debug!(
                    module = %intent.module_a,
                    link_field_name,
                    failed = result.failed,
                    "link field rejected by server"
                );
                LinkAttempt::Rejected
            }
            Err(err) => {
                debug!(
                    module = %intent.module_a,
                    link_field_name,
                    %err,
                    "link attempt failed"
                );
                LinkAttempt::Rejected
            }
        }
    }

    /// Enumerates `module`'s link fields plausibly connecting it to
    /// `objective` records.
    ///
    /// Precision first: fields whose relationship name contains both
    /// `_activities_` and the objective. When nothing matches both, relax to
    /// the objective substring alone; relationship naming is not
    /// contractually fixed across server versions.
    ///
    /// # Errors
    ///
    /// Any error from fetching the module's field metadata.
    pub async fn activities_link_fields(
        &self,
        module: &str,
        objective: LinkObjective,
    ) -> Result<Vec<String>> {
        let fields = self.metadata.module_fields(self.session, module).await?;
        let needle = objective.needle();

        let links: Vec<(&str, String)> = fields
            .all_fields()
            .filter(|f| f.is_link())
            .map(|f| (f.name.as_str(), f.relationship.to_lowercase()))
            .collect();

        let strict: Vec<String> = links
            .iter()
            .filter(|(_, rel)| rel.contains("_activities_") && rel.contains(needle))
            .map(|(name, _)| (*name).to_string())
            .collect();
        if !strict.is_empty() {
            return Ok(strict);
        }

        Ok(links
            .iter()
            .filter(|(_, rel)| rel.contains(needle))
            .map(|(name, _)| (*name).to_string())
            .collect())
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

    #[test]
    fn objective_from_module() {
        assert_eq!(LinkObjective::from_module("Meetings"), Some(LinkObjective::Meetings));
        assert_eq!(LinkObjective::from_module("calls"), Some(LinkObjective::Calls));
        assert_eq!(LinkObjective::from_module("Emails"), Some(LinkObjective::Emails));
        assert_eq!(LinkObjective::from_module("Tasks"), Some(LinkObjective::Tasks));
        assert_eq!(LinkObjective::from_module("Accounts"), None);
    }

    #[test]
    fn objective_needles_are_lowercase() {
        for objective in [
            LinkObjective::Meetings,
            LinkObjective::Calls,
            LinkObjective::Emails,
            LinkObjective::Tasks,
        ] {
            let needle = objective.needle();
            assert_eq!(needle, needle.to_lowercase());
        }
    }
}
