//! Error types for CRM REST operations.

/// Result type alias for CRM REST operations.
pub type Result<T> = std::result::Result<T, Error>;

/// CRM REST error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A string failed record-id validation.
    #[error("Invalid record id: {0:?}")]
    Format(String),

    /// The server answered with a non-200 HTTP status.
    #[error("HTTP {status} from server: {reason}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, if known.
        reason: String,
    },

    /// Request-level failure (DNS, refused connection, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server's own envelope reported an application-level error.
    #[error("Server error {code} ({name}): {description}")]
    Server {
        /// Server-assigned numeric error code.
        code: i64,
        /// Short error name (e.g. `Invalid Login`).
        name: String,
        /// Human-readable description.
        description: String,
    },

    /// The response body could not be decoded as the expected shape.
    #[error("Unparseable response body: {snippet}")]
    Protocol {
        /// Bounded snippet of the offending body, for diagnostics.
        snippet: String,
    },

    /// Every configured login attempt failed; no session token was issued.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates a server error from the parsed envelope fields.
    #[must_use]
    pub fn server_error(
        code: i64,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::Server {
            code,
            name: name.into(),
            description: description.into(),
        }
    }

    /// Creates a protocol error carrying a bounded snippet of `body`.
    #[must_use]
    pub fn protocol_error(body: &str) -> Self {
        const SNIPPET_LEN: usize = 200;
        let snippet = if body.len() > SNIPPET_LEN {
            let mut end = SNIPPET_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &body[..end])
        } else {
            body.to_string()
        };
        Self::Protocol { snippet }
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
    fn protocol_error_truncates_long_bodies() {
        let body = "x".repeat(500);
        let err = Error::protocol_error(&body);
        match err {
            Error::Protocol { snippet } => {
                assert!(snippet.len() < 500);
                assert!(snippet.ends_with('…'));
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn protocol_error_keeps_short_bodies() {
        let err = Error::protocol_error("<html>oops</html>");
        match err {
            Error::Protocol { snippet } => assert_eq!(snippet, "<html>oops</html>"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn protocol_error_respects_char_boundaries() {
        // Multi-byte character straddling the cut point must not panic.
        let body = format!("{}é{}", "a".repeat(199), "b".repeat(100));
        let err = Error::protocol_error(&body);
        match err {
            Error::Protocol { snippet } => assert!(snippet.ends_with('…')),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn server_error_display() {
        let err = Error::server_error(10, "Invalid Login", "bad credentials");
        assert_eq!(
            err.to_string(),
            "Server error 10 (Invalid Login): bad credentials"
        );
    }
}
