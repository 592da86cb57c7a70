use thiserror::Error;

/// Top-level error type for the `loadout-api` crate.
///
/// Covers every failure mode across the external surfaces: host REST and
/// native calls, the host event WebSocket, the remote content API, and
/// host discovery via the lockfile. `loadout-core` maps these into
/// domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Host rejected the lockfile credentials, or the content API key.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Host ────────────────────────────────────────────────────────
    /// Non-success response from the host process.
    #[error("Host error (HTTP {status}): {message}")]
    Host { status: u16, message: String },

    /// The host lockfile is missing or malformed.
    #[error("Invalid lockfile {path}: {reason}")]
    Lockfile { path: String, reason: String },

    // ── Content API ─────────────────────────────────────────────────
    /// Non-success response from the remote content API.
    #[error("Content API error (HTTP {status}): {message}")]
    ContentApi { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Host { status, .. } | Self::ContentApi { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Build a [`Error::Deserialization`] with a short body preview in the message.
pub(crate) fn deserialization(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: format!("{err} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Host {
            status: 503,
            message: "busy".into(),
        };
        assert!(err.is_transient());

        let err = Error::ContentApi {
            status: 404,
            message: "missing".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn deserialization_preview_is_truncated() {
        let body = "x".repeat(500);
        let parse_err = serde_json::from_str::<serde_json::Value>(&body).unwrap_err();
        let Error::Deserialization { message, body: kept } = deserialization(&parse_err, &body)
        else {
            panic!("expected a deserialization error");
        };
        assert_eq!(kept.len(), 500);
        assert!(message.len() < 300);
    }
}
