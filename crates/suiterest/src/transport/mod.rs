//! HTTP transport for the REST v4.1 endpoint.
//!
//! Turns a method name plus a payload struct into a form-encoded POST, and
//! turns the response body into either a typed result or an error. The
//! server uses one channel for success and failure, so every body is probed
//! for the error envelope before payload decoding.

mod envelope;
mod escape;

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use envelope::ErrorEnvelope;

/// Path of the RPC endpoint, relative to the server base URL.
const REST_PATH: &str = "service/v4_1/rest.php";

/// Form content type; the charset is part of the server contract.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Client for the REST v4.1 RPC endpoint.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
}

impl RestClient {
    /// Creates a client for the given server base URL.
    #[must_use]
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url,
            timeout,
        }
    }

    /// Returns the server base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issues one RPC call and decodes the response as `T`.
    ///
    /// The payload is serialized to JSON (non-ASCII escaped to `\uXXXX`) and
    /// posted as `method=<m>&input_type=JSON&response_type=JSON&rest_data=<json>`.
    /// Response strings are HTML-unescaped before decoding.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] for request-level failures (DNS, refused, timeout).
    /// - [`Error::Transport`] for a non-200 status.
    /// - [`Error::Server`] when the body carries the server's error envelope.
    /// - [`Error::Protocol`] when the body is not JSON or not a `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &impl Serialize,
    ) -> Result<T> {
        let value = self.call_value(method, payload).await?;
        serde_json::from_value(value.clone()).map_err(|err| {
            warn!(method, %err, "response did not match the expected shape");
            Error::protocol_error(&value.to_string())
        })
    }

    /// Issues one RPC call and returns the decoded, unescaped body.
    ///
    /// # Errors
    ///
    /// Same as [`RestClient::call`], minus the payload-shape decoding step.
    pub async fn call_value(&self, method: &str, payload: &impl Serialize) -> Result<Value> {
        let rest_data = escape::escape_non_ascii(&serde_json::to_string(payload)?);
        let endpoint = self.base_url.join(REST_PATH)?;

        debug!(method, "posting RPC call");
        let response = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .form(&[
                ("method", method),
                ("input_type", "JSON"),
                ("response_type", "JSON"),
                ("rest_data", rest_data.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                warn!(method, timeout = ?self.timeout, rest_data, %err, "request failed");
                Error::Http(err)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(method, %status, "non-200 response");
            return Err(Error::Transport {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body).map_err(|err| {
            warn!(method, %err, "response body is not JSON");
            Error::protocol_error(&body)
        })?;
        let value = escape::unescape_value(value);

        // Error probe must precede payload decoding: a loosely-typed payload
        // can spuriously absorb the error shape.
        if let Some(envelope) = ErrorEnvelope::probe(&value) {
            debug!(method, name = envelope.name(), "server reported an error");
            return Err(envelope.into_error());
        }
        Ok(value)
    }

    /// Fire-and-forget GET to `<base>/<path>`.
    ///
    /// Returns true iff the server answered 200. Used for low-value
    /// notifications where failure is tolerable; request errors are logged
    /// at warn and reported as `false`.
    pub async fn send_get(&self, path: &str) -> bool {
        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(err) => {
                warn!(path, %err, "unjoinable notification path");
                return false;
            }
        };
        match self.http.get(url).timeout(self.timeout).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                warn!(path, %err, "notification GET failed");
                false
            }
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
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RestClient {
        let base = Url::parse(&server.uri()).unwrap();
        RestClient::new(base, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn call_builds_the_wire_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/service/v4_1/rest.php"))
            .and(body_string_contains("method=get_user_id"))
            .and(body_string_contains("input_type=JSON"))
            .and(body_string_contains("response_type=JSON"))
            .and(body_string_contains("rest_data="))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"user-1\""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let user: String = client
            .call("get_user_id", &json!({"session": "abc"}))
            .await
            .unwrap();
        assert_eq!(user, "user-1");
    }

    #[tokio::test]
    async fn error_envelope_wins_over_string_payload() {
        // A naive decode into String would spuriously fail here instead of
        // reporting the server's own error; the probe must run first.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "number": 10, "name": "Invalid Login", "description": "denied"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<String> = client.call("login", &json!({})).await;
        match result.unwrap_err() {
            Error::Server { code, name, .. } => {
                assert_eq!(code, 10);
                assert_eq!(name, "Invalid Login");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<Value> = client.call("login", &json!({})).await;
        match result.unwrap_err() {
            Error::Transport { status, .. } => assert_eq!(status, 503),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>fatal</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Result<Value> = client.call("login", &json!({})).await;
        match result.unwrap_err() {
            Error::Protocol { snippet } => assert!(snippet.contains("<html>")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_strings_are_html_unescaped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"account":"Smith &amp; Jones"}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let value: Value = client.call("get_entry", &json!({})).await.unwrap();
        assert_eq!(value["account"], "Smith & Jones");
    }

    #[tokio::test]
    async fn send_get_reflects_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.php"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.send_get("index.php").await);
        assert!(!client.send_get("missing.php").await);
    }
}
