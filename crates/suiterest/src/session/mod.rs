//! Authenticated conversations with the server.
//!
//! A [`Session`] owns one authenticated conversation: it logs in (hashed
//! password first, plaintext fallback, or the LDAP-encrypted variant when a
//! shared key is configured), holds the issued token, and signs every RPC
//! call with it. A session is bound to one server target; point at a
//! different base URL by building a new session, never by mutating one.

mod ldap;
pub(crate) mod wire;

pub use wire::{Entry, EntryList, NameValue, SetRelationshipResult};

use md5::{Digest, Md5};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::id::RecordId;
use crate::names;
use crate::transport::RestClient;
use wire::{
    GetEntryListRequest, GetRelationshipsRequest, LoginRequest, LoginResponse, SessionOnly,
    SetEntryRequest, SetEntryResponse, SetRelationshipRequest, UserAuth,
};

/// Meeting invitation response sent through the accept/decline entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptStatus {
    /// Accept the invitation.
    Accept,
    /// Decline the invitation.
    Decline,
    /// Tentatively accept.
    Tentative,
}

impl AcceptStatus {
    /// Wire form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Tentative => "tentative",
        }
    }
}

/// Parameters for a `get_entry_list` call.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    /// Module to query.
    pub module: String,
    /// SQL-ish server-side query fragment (empty for all records).
    pub query: String,
    /// Order-by clause (empty for server default).
    pub order_by: String,
    /// Pagination offset.
    pub offset: u32,
    /// Fields to return (empty for all).
    pub select_fields: Vec<String>,
    /// Page size cap (0 for server default).
    pub max_results: u32,
    /// Include soft-deleted records.
    pub deleted: bool,
}

/// Parameters for a `get_relationships` call.
#[derive(Debug, Clone, Default)]
pub struct RelationshipQuery {
    /// Owning module.
    pub module: String,
    /// Owning record id.
    pub id: RecordId,
    /// Link field to traverse.
    pub link_field_name: String,
    /// Query fragment applied to the related module.
    pub related_module_query: String,
    /// Fields of the related records to return.
    pub related_fields: Vec<String>,
    /// Include soft-deleted links.
    pub deleted: bool,
}

/// One authenticated conversation with a server.
///
/// The token is `Some` exactly when the last authentication attempt
/// succeeded. Not safe for concurrent sharing; use one session per worker.
#[derive(Debug)]
pub struct Session {
    transport: RestClient,
    config: ConnectionConfig,
    token: Option<String>,
    authenticating: bool,
}

impl Session {
    /// Creates an unauthenticated session for the configured target.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let transport = RestClient::new(config.base_url.clone(), config.timeout);
        Self {
            transport,
            config,
            token: None,
            authenticating: false,
        }
    }

    /// Returns the session token, when authenticated.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns true while a login attempt is in flight.
    #[must_use]
    pub const fn is_authenticating(&self) -> bool {
        self.authenticating
    }

    /// Returns true when the session holds a token.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The transport this session rides on.
    pub(crate) const fn transport(&self) -> &RestClient {
        &self.transport
    }

    /// The token, or an authentication error when none is held.
    pub(crate) fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Authentication("no active session".to_string()))
    }

    /// Authenticates against the server.
    ///
    /// With an LDAP key configured the LDAP variant is used exclusively.
    /// Otherwise the MD5-hashed password is tried first and, if the server
    /// rejects it, the plaintext password once more. Different server
    /// configurations expect different encodings; hashed-first keeps
    /// plaintext off the wire in the common case.
    ///
    /// Returns the polling interval the server advertises, when it does.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when every applicable attempt was rejected
    /// by the server; transport and protocol errors propagate unchanged. The
    /// token is left empty on any failure.
    pub async fn login(&mut self) -> Result<Option<u64>> {
        self.authenticating = true;
        self.token = None;
        let outcome = self.run_login().await;
        self.authenticating = false;
        match outcome {
            Ok(response) => {
                let interval = response.polling_interval();
                info!(user = %self.config.username, "login succeeded");
                self.token = Some(response.id);
                Ok(interval)
            }
            Err(err) => {
                warn!(user = %self.config.username, %err, "login failed");
                Err(err)
            }
        }
    }

    async fn run_login(&self) -> Result<LoginResponse> {
        if let Some(key) = &self.config.ldap_key {
            return self.login_ldap(key).await;
        }

        let hashed = hex::encode(Md5::digest(self.config.password.as_bytes()));
        match self.post_login(hashed, None).await {
            Ok(response) => Ok(response),
            Err(Error::Server { name, .. }) => {
                debug!(rejected_as = %name, "hashed login rejected, retrying plain");
                match self.post_login(self.config.password.clone(), None).await {
                    Ok(response) => Ok(response),
                    Err(Error::Server { description, .. }) => {
                        Err(Error::Authentication(description))
                    }
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn login_ldap(&self, key: &str) -> Result<LoginResponse> {
        let (password, encryption) = if key.trim().is_empty() {
            (self.config.password.clone(), "PLAIN")
        } else {
            (ldap::encrypt_password(key, &self.config.password), "true")
        };
        match self.post_login(password, Some(encryption)).await {
            Ok(response) => Ok(response),
            Err(Error::Server { description, .. }) => Err(Error::Authentication(description)),
            Err(other) => Err(other),
        }
    }

    async fn post_login(&self, password: String, encryption: Option<&str>) -> Result<LoginResponse> {
        let request = LoginRequest {
            user_auth: UserAuth {
                user_name: &self.config.username,
                password,
                encryption,
            },
            application_name: &self.config.application_name,
        };
        self.transport.call("login", &request).await
    }

    /// Logs out, clearing the token.
    ///
    /// The server is notified best-effort; a failed notification is logged
    /// and otherwise ignored, and the token is cleared regardless.
    pub async fn logout(&mut self) {
        if let Some(token) = self.token.take() {
            let request = SessionOnly { session: &token };
            if let Err(err) = self.transport.call::<Value>("logout", &request).await {
                warn!(%err, "logout notification failed");
            }
        }
    }

    /// Returns the server-side id of the authenticated user.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when unauthenticated; otherwise any
    /// transport, server, or protocol error from the call.
    pub async fn user_id(&self) -> Result<String> {
        let request = SessionOnly {
            session: self.require_token()?,
        };
        self.transport.call("get_user_id", &request).await
    }

    /// Runs a `get_entry_list` query.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when unauthenticated; otherwise any
    /// transport, server, or protocol error from the call.
    pub async fn get_entry_list(&self, query: &EntryQuery) -> Result<EntryList> {
        let request = GetEntryListRequest {
            session: self.require_token()?,
            module_name: &query.module,
            query: &query.query,
            order_by: &query.order_by,
            offset: query.offset,
            select_fields: &query.select_fields,
            max_results: query.max_results,
            deleted: u8::from(query.deleted),
        };
        self.transport.call("get_entry_list", &request).await
    }

    /// Creates or updates a record, returning its id.
    ///
    /// Include an `id` pair in `fields` to update an existing record.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when unauthenticated; [`Error::Format`]
    /// when the server returns an id that fails validation; otherwise any
    /// transport, server, or protocol error from the call.
    pub async fn set_entry(&self, module: &str, fields: &[NameValue]) -> Result<RecordId> {
        let request = SetEntryRequest {
            session: self.require_token()?,
            module_name: module,
            name_value_list: fields,
        };
        let response: SetEntryResponse = self.transport.call("set_entry", &request).await?;
        RecordId::get(&response.id)
    }

    /// Fetches records related through a link field.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when unauthenticated; otherwise any
    /// transport, server, or protocol error from the call.
    pub async fn get_relationships(&self, query: &RelationshipQuery) -> Result<EntryList> {
        let request = GetRelationshipsRequest {
            session: self.require_token()?,
            module_name: &query.module,
            module_id: query.id.as_str(),
            link_field_name: &query.link_field_name,
            related_module_query: &query.related_module_query,
            related_fields: &query.related_fields,
            deleted: u8::from(query.deleted),
        };
        self.transport.call("get_relationships", &request).await
    }

    /// Creates or removes one many-to-many link through `link_field_name`.
    ///
    /// The field name is lowercased on the wire. Acceptance is signalled by
    /// the `created` counter of the result, which callers must check; the
    /// server no-ops (rather than erroring) on some rejected field names.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] when unauthenticated; otherwise any
    /// transport, server, or protocol error from the call.
    pub async fn set_relationship(
        &self,
        module: &str,
        module_id: &RecordId,
        link_field_name: &str,
        related_id: &RecordId,
        delete: bool,
    ) -> Result<SetRelationshipResult> {
        let request = SetRelationshipRequest {
            session: self.require_token()?,
            module_name: module,
            module_id: module_id.as_str(),
            link_field_name: link_field_name.to_lowercase(),
            related_ids: [related_id.as_str()],
            name_value_list: [],
            delete: u8::from(delete),
        };
        self.transport.call("set_relationship", &request).await
    }

    /// Sends a meeting accept/decline notification.
    ///
    /// Fire-and-forget GET against the bespoke entry point; returns true iff
    /// the server answered 200. Failure is tolerable and only logged.
    pub async fn send_accept_decline(
        &self,
        invitee_module: &str,
        invitee_id: &RecordId,
        meeting_id: &RecordId,
        status: AcceptStatus,
    ) -> bool {
        let path = format!(
            "index.php?entryPoint=acceptDecline&module=Meetings&{}_id={}&record={}&accept_status={}",
            names::singular_key(invitee_module),
            invitee_id,
            meeting_id,
            status.as_str(),
        );
        self.transport.send_get(&path).await
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
    use url::Url;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(
            Url::parse("https://crm.example.com/").unwrap(),
            "admin",
            "secret",
        )
    }

    #[test]
    fn new_session_is_unauthenticated() {
        let session = Session::new(config());
        assert!(!session.is_authenticated());
        assert!(!session.is_authenticating());
        assert!(session.token().is_none());
        assert!(session.require_token().is_err());
    }

    #[tokio::test]
    async fn calls_require_a_token() {
        let session = Session::new(config());
        let err = session.user_id().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn accept_status_wire_form() {
        assert_eq!(AcceptStatus::Accept.as_str(), "accept");
        assert_eq!(AcceptStatus::Decline.as_str(), "decline");
        assert_eq!(AcceptStatus::Tentative.as_str(), "tentative");
    }
}
