//! Integration tests for the client.
//!
//! These run against a mock HTTP server standing in for the CRM endpoint;
//! expectations on the mocks double as call-count assertions (caching,
//! fallback ordering).

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use suiterest::{
    AcceptStatus, ConnectionConfig, EntryQuery, Error, LinkIntent, MetadataCache, NameValue,
    RecordId, RelationshipResolver, Session,
};

const REST_PATH: &str = "/service/v4_1/rest.php";

/// MD5 of the test password `secret`, as sent by the hashed login attempt.
const HASHED_SECRET: &str = "5ebe2294ecd0e0f08eab7690d2a6ee69";

const VALID_ID: &str = "11111111-2222-3333-4444-555555555555";
const OTHER_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

fn config_for(server: &MockServer) -> ConnectionConfig {
    ConnectionConfig::builder(Url::parse(&server.uri()).unwrap())
        .credentials("admin", "secret")
        .timeout(Duration::from_secs(5))
        .build()
}

/// Mounts a login mock accepting the hashed attempt and returns an
/// authenticated session.
async fn logged_in(server: &MockServer) -> Session {
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-1",
            "name_value_list": {}
        })))
        .mount(server)
        .await;

    let mut session = Session::new(config_for(server));
    session.login().await.unwrap();
    session
}

#[tokio::test]
async fn login_failure_reports_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 10, "name": "Invalid Login", "description": "denied"
        })))
        // Hashed attempt, then the plain retry.
        .expect(2)
        .mount(&server)
        .await;

    let mut session = Session::new(config_for(&server));
    let err = session.login().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref d) if d == "denied"));
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
}

#[tokio::test]
async fn login_falls_back_to_plain_exactly_once() {
    let server = MockServer::start().await;

    // The hashed attempt carries the MD5 hex instead of the password.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains(HASHED_SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 10, "name": "Invalid Login", "description": "hash not accepted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The plain retry carries the password verbatim.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("%22secret%22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-plain",
            "name_value_list": {"polling_interval": {"name": "polling_interval", "value": "60"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(config_for(&server));
    let interval = session.login().await.unwrap();
    assert_eq!(interval, Some(60));
    assert_eq!(session.token(), Some("sess-plain"));
}

#[tokio::test]
async fn ldap_login_sends_the_encrypted_password() {
    let server = MockServer::start().await;

    // 3DES-CBC("secret") under the key derived from "k", as lowercase hex,
    // with the encryption marker set. The plaintext never goes on the wire.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=login"))
        .and(body_string_contains("79b7701eaa849659"))
        .and(body_string_contains("%22encryption%22%3A%22true%22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-ldap",
            "name_value_list": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectionConfig::builder(Url::parse(&server.uri()).unwrap())
        .credentials("admin", "secret")
        .ldap_key("k")
        .timeout(Duration::from_secs(5))
        .build();
    let mut session = Session::new(config);
    session.login().await.unwrap();
    assert_eq!(session.token(), Some("sess-ldap"));
}

#[tokio::test]
async fn ldap_login_with_blank_key_sends_the_plain_marker() {
    let server = MockServer::start().await;

    // A configured-but-blank key means the password goes verbatim with the
    // PLAIN marker, still through the LDAP variant.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=login"))
        .and(body_string_contains("%22secret%22"))
        .and(body_string_contains("%22encryption%22%3A%22PLAIN%22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess-plain-ldap",
            "name_value_list": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectionConfig::builder(Url::parse(&server.uri()).unwrap())
        .credentials("admin", "secret")
        .ldap_key("  ")
        .timeout(Duration::from_secs(5))
        .build();
    let mut session = Session::new(config);
    session.login().await.unwrap();
    assert_eq!(session.token(), Some("sess-plain-ldap"));
}

#[tokio::test]
async fn ldap_login_rejection_is_an_authentication_error() {
    let server = MockServer::start().await;

    // expect(1): the LDAP variant has no hashed/plain fallback to retry with.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 10, "name": "Invalid Login", "description": "ldap denied"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectionConfig::builder(Url::parse(&server.uri()).unwrap())
        .credentials("admin", "secret")
        .ldap_key("k")
        .timeout(Duration::from_secs(5))
        .build();
    let mut session = Session::new(config);
    let err = session.login().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(ref d) if d == "ldap denied"));
    assert!(session.token().is_none());
}

#[tokio::test]
async fn logout_clears_token_even_when_notification_fails() {
    let server = MockServer::start().await;
    let mut session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    session.logout().await;
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn modules_are_fetched_once_per_session() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_available_modules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modules": [
                {"module_key": "Accounts", "module_label": "Accounts"},
                {"module_key": "Contacts", "module_label": "Contacts"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = MetadataCache::new();
    let first = metadata.modules(&session).await.unwrap();
    let second = metadata.modules(&session).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second[1].module_key, "Contacts");
    // expect(1) on the mock asserts the second call never hit the network.
}

#[tokio::test]
async fn email_related_modules_skip_broken_metadata() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_available_modules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "modules": [
                {"module_key": "Contacts", "module_label": "Contacts"},
                {"module_key": "Broken", "module_label": "Broken"},
                {"module_key": "Tasks", "module_label": "Tasks"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .and(body_string_contains("Contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "module_name": "Contacts",
            "module_fields": {"email_home": {"name": "email_home", "type": "email"}},
            "link_fields": []
        })))
        .mount(&server)
        .await;

    // Metadata fetch for this module fails server-side.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .and(body_string_contains("Broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 20, "name": "Module Does Not Exist", "description": "no metadata"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .and(body_string_contains("Tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "module_name": "Tasks",
            "module_fields": {"name": {"name": "name", "type": "name"}},
            "link_fields": []
        })))
        .mount(&server)
        .await;

    let metadata = MetadataCache::new();
    let related = metadata.modules_with_email_fields(&session).await.unwrap();
    let keys: Vec<_> = related.iter().map(|m| m.module_key.as_str()).collect();
    assert_eq!(keys, vec!["Contacts"]);
}

#[tokio::test]
async fn searchable_fields_filter_types_and_custom_suffix() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "module_name": "Contacts",
            "module_fields": {
                "last_name": {"name": "last_name", "type": "varchar"},
                "phone_work": {"name": "phone_work", "type": "phone"},
                "birthdate": {"name": "birthdate", "type": "date"},
                "custom_field_c": {"name": "custom_field_c", "type": "varchar"},
                "weird": {"name": "weird", "type": "hologram"}
            },
            "link_fields": []
        })))
        .mount(&server)
        .await;

    let metadata = MetadataCache::new();
    let mut fields = metadata
        .char_searchable_fields(&session, "Contacts")
        .await
        .unwrap();
    fields.sort();
    assert_eq!(fields, vec!["last_name", "phone_work"]);
}

#[tokio::test]
async fn resolver_tries_candidates_in_order_until_accepted() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    // Third-tier candidates come from the module's link fields.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "module_name": "Contacts",
            "module_fields": {},
            "link_fields": {
                "activity_meetings": {
                    "name": "activity_meetings",
                    "type": "link",
                    "relationship": "contacts_activities_meetings"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Only the metadata-derived field name is accepted. Mounted first so it
    // wins over the catch-all below.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=set_relationship"))
        .and(body_string_contains("activity_meetings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1, "failed": 0, "deleted": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    // `meetings` and `meetings_contacts` are both rejected as no-ops.
    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=set_relationship"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 0, "failed": 1, "deleted": 0
        })))
        .expect(2)
        .mount(&server)
        .await;

    let metadata = MetadataCache::new();
    let resolver = RelationshipResolver::new(&session, &metadata);
    let linked = resolver
        .link(&LinkIntent {
            module_a: "Contacts".to_string(),
            id_a: RecordId::get(VALID_ID).unwrap(),
            module_b: "Meetings".to_string(),
            id_b: RecordId::get(OTHER_ID).unwrap(),
            delete: false,
        })
        .await;
    assert!(linked);
}

#[tokio::test]
async fn resolver_reports_exhaustion_as_false() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_module_fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "module_name": "Contacts",
            "module_fields": {},
            "link_fields": {}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=set_relationship"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 0, "failed": 1, "deleted": 0
        })))
        .expect(2)
        .mount(&server)
        .await;

    let metadata = MetadataCache::new();
    let resolver = RelationshipResolver::new(&session, &metadata);
    let linked = resolver
        .link(&LinkIntent {
            module_a: "Contacts".to_string(),
            id_a: RecordId::get(VALID_ID).unwrap(),
            module_b: "Meetings".to_string(),
            id_b: RecordId::get(OTHER_ID).unwrap(),
            delete: false,
        })
        .await;
    assert!(!linked);
}

#[tokio::test]
async fn set_entry_round_trips_the_record_id() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=set_entry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": VALID_ID,
            "entry_list": []
        })))
        .mount(&server)
        .await;

    let id = session
        .set_entry("Contacts", &[NameValue::new("last_name", "Smith")])
        .await
        .unwrap();
    assert_eq!(id.to_string(), VALID_ID);
    assert!(id.same_instance(&RecordId::get(VALID_ID).unwrap()));
}

#[tokio::test]
async fn entry_list_decodes_escaped_content() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_entry_list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result_count": 1,
            "total_count": 1,
            "entry_list": [{
                "id": VALID_ID,
                "module_name": "Accounts",
                "name_value_list": {
                    "name": {"name": "name", "value": "Smith &amp; Jones"}
                }
            }]
        })))
        .mount(&server)
        .await;

    let list = session
        .get_entry_list(&EntryQuery {
            module: "Accounts".to_string(),
            ..EntryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(list.result_count, 1);
    assert_eq!(list.entry_list[0].value("name"), Some("Smith & Jones"));
}

#[tokio::test]
async fn accept_decline_hits_the_entry_point() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("entryPoint", "acceptDecline"))
        .and(query_param("module", "Meetings"))
        .and(query_param("contact_id", VALID_ID))
        .and(query_param("record", OTHER_ID))
        .and(query_param("accept_status", "accept"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sent = session
        .send_accept_decline(
            "Contacts",
            &RecordId::get(VALID_ID).unwrap(),
            &RecordId::get(OTHER_ID).unwrap(),
            AcceptStatus::Accept,
        )
        .await;
    assert!(sent);
}

#[tokio::test]
async fn user_id_requires_and_uses_the_token() {
    let server = MockServer::start().await;
    let session = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path(REST_PATH))
        .and(body_string_contains("method=get_user_id"))
        .and(body_string_contains("sess-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"user-7\""))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(session.user_id().await.unwrap(), "user-7");
}
