use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `opsview-api` crate.
///
/// Covers every failure mode of the client: session login, HTTP transport,
/// remote status codes, response parsing, and request validation.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No `auth_tkt` session cookie after a login attempt.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request exceeded the configured timeout.
    #[error("Request timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    /// TLS setup or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote ──────────────────────────────────────────────────────
    /// The server answered with a non-2xx status.
    #[error("Remote request failed (HTTP {status}): {body}")]
    RemoteRequest { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body is neither well-formed XML nor well-formed JSON.
    #[error("Parse error: {message}")]
    Parse { message: String, body: String },

    /// Response parsed, but the expected element is missing.
    #[error("Schema error: no <{expected}> element in response")]
    Schema { expected: String },

    // ── Requests ────────────────────────────────────────────────────
    /// A mutating call omitted required fields.
    #[error("Missing required attributes: {}", missing.join(", "))]
    MissingAttribute { missing: Vec<String> },

    /// A lookup by name matched nothing.
    #[error("Not found: {what}")]
    NotFound { what: String },
}

impl Error {
    /// Returns `true` if the session could not be established.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::RemoteRequest { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// The client itself never retries; callers may.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::RemoteRequest { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::RemoteRequest { status: 404, .. }
        )
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRequest { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
