use std::fmt;

use axum::http::HeaderMap;
use uuid::Uuid;

/// Header carrying the correlation ID from the client to the server.
pub const HEADER: &str = "X-Client-Uuid";

/// Joins a client-side timing line with the server-side timing record of
/// the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reads the header verbatim. Missing, empty or non-ASCII values yield `None`.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self(v.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
