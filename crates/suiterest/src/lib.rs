//! # suiterest
//!
//! Client library for the SuiteCRM REST v4.1 endpoint.
//!
//! ## Features
//!
//! - **Sessions**: hashed-password login with plaintext fallback, the
//!   LDAP-encrypted login variant, and best-effort logout
//! - **Transport**: the `rest.php` form envelope, error-before-payload
//!   response triage, HTML-entity unescaping
//! - **Metadata**: lazily cached module and field shapes per session
//! - **Relationships**: ranked link-field candidates for servers with
//!   undiscoverable relationship naming
//!
//! ## Quick Start
//!
//! ```ignore
//! use suiterest::{ConnectionConfig, EntryQuery, Session};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder(Url::parse("https://crm.example.com/")?)
//!         .credentials("admin", "secret")
//!         .build();
//!
//!     let mut session = Session::new(config);
//!     session.login().await?;
//!
//!     let contacts = session
//!         .get_entry_list(&EntryQuery {
//!             module: "Contacts".to_string(),
//!             query: "contacts.last_name = 'Smith'".to_string(),
//!             ..EntryQuery::default()
//!         })
//!         .await?;
//!     println!("{} matching contacts", contacts.result_count);
//!
//!     session.logout().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Linking records
//!
//! Link-field names are schema-defined and not reliably predictable, so
//! linking goes through a resolver that tries candidates in order:
//!
//! ```ignore
//! use suiterest::{LinkIntent, MetadataCache, RecordId, RelationshipResolver};
//!
//! let metadata = MetadataCache::new();
//! let resolver = RelationshipResolver::new(&session, &metadata);
//! let linked = resolver
//!     .link(&LinkIntent {
//!         module_a: "Contacts".to_string(),
//!         id_a: RecordId::get(contact_id)?,
//!         module_b: "Meetings".to_string(),
//!         id_b: RecordId::get(meeting_id)?,
//!         delete: false,
//!     })
//!     .await;
//! // Linking is best-effort; check the return value when it matters.
//! ```
//!
//! ## Concurrency
//!
//! The library suspends only at the HTTP boundary and spawns no tasks. A
//! [`Session`] is single-owner; run one session per concurrent worker. The
//! metadata cache and the record-id intern table are internally locked.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;
pub mod metadata;
pub mod names;
pub mod relationship;
pub mod session;
pub mod transport;

pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use error::{Error, Result};
pub use id::RecordId;
pub use metadata::{Field, MetadataCache, Module, ModuleFields};
pub use relationship::{LinkIntent, LinkObjective, RelationshipResolver};
pub use session::{
    AcceptStatus, Entry, EntryList, EntryQuery, NameValue, RelationshipQuery, Session,
    SetRelationshipResult,
};
pub use transport::RestClient;
