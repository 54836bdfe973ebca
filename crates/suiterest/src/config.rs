//! Connection configuration types.

use std::time::Duration;

use url::Url;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Application name reported to the server during login.
const DEFAULT_APPLICATION_NAME: &str = "suiterest";

/// CRM connection configuration.
///
/// One configuration describes one server target. Changing the base URL or
/// the credentials means building a new configuration (and a new
/// [`Session`](crate::session::Session)); a session token must never be
/// reused across base URLs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server base URL (e.g. `https://crm.example.com/`).
    pub base_url: Url,
    /// Login username.
    pub username: String,
    /// Login password (plaintext; hashed or encrypted on the wire per the
    /// negotiated login variant).
    pub password: String,
    /// Shared LDAP key. When set, login uses the LDAP-encrypted variant.
    pub ldap_key: Option<String>,
    /// Application name sent with login requests.
    pub application_name: String,
    /// Per-request timeout. Requests past this abort with a transport error.
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a configuration with default timeout and application name.
    #[must_use]
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            ldap_key: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(base_url: Url) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(base_url)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    base_url: Url,
    username: String,
    password: String,
    ldap_key: Option<String>,
    application_name: String,
    timeout: Duration,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder for the given server base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            username: String::new(),
            password: String::new(),
            ldap_key: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the shared LDAP key, switching login to the LDAP variant.
    #[must_use]
    pub fn ldap_key(mut self, key: impl Into<String>) -> Self {
        self.ldap_key = Some(key.into());
        self
    }

    /// Sets the application name reported during login.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            base_url: self.base_url,
            username: self.username,
            password: self.password,
            ldap_key: self.ldap_key,
            application_name: self.application_name,
            timeout: self.timeout,
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

    fn base() -> Url {
        Url::parse("https://crm.example.com/").unwrap()
    }

    #[test]
    fn test_config_new_defaults() {
        let config = ConnectionConfig::new(base(), "admin", "secret");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "secret");
        assert!(config.ldap_key.is_none());
        assert_eq!(config.application_name, "suiterest");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = ConnectionConfig::builder(base())
            .credentials("admin", "secret")
            .ldap_key("shared")
            .application_name("outlook-addin")
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.username, "admin");
        assert_eq!(config.ldap_key.as_deref(), Some("shared"));
        assert_eq!(config.application_name, "outlook-addin");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
