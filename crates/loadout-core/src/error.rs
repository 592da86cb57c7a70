// ── Core error types ──
//
// Domain errors surfaced by loadout-core. Callers never see HTTP status
// codes or raw JSON failures; `From<loadout_api::Error>` translates the
// transport layer into the variants below.

use std::path::PathBuf;

use thiserror::Error;

use crate::update::UpdateStatus;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Host errors ──────────────────────────────────────────────────
    #[error("Host unavailable: {reason}")]
    HostUnavailable { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Native call `{call}` failed: {message}")]
    NativeCall { call: &'static str, message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Fetch failed: {message}")]
    Fetch {
        message: String,
        /// HTTP status code, when the failure came from a response.
        status: Option<u16>,
    },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("Catalog has not been loaded")]
    CatalogNotLoaded,

    // ── Storage errors ───────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] StorageError),

    // ── State machine errors ─────────────────────────────────────────
    #[error("Cannot {event} while update status is {from}")]
    InvalidTransition {
        from: UpdateStatus,
        event: &'static str,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap an api-layer failure from a named native call.
    pub(crate) fn native(call: &'static str, err: loadout_api::Error) -> Self {
        match CoreError::from(err) {
            e @ (CoreError::HostUnavailable { .. } | CoreError::AuthenticationFailed { .. }) => e,
            other => CoreError::NativeCall {
                call,
                message: other.to_string(),
            },
        }
    }
}

/// Failure of a durable store on disk.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode store record: {0}")]
    Encode(#[source] serde_json::Error),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<loadout_api::Error> for CoreError {
    fn from(err: loadout_api::Error) -> Self {
        match err {
            loadout_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            loadout_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::HostUnavailable {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Fetch {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            loadout_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            loadout_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            loadout_api::Error::Tls(msg) => CoreError::HostUnavailable {
                reason: format!("TLS error: {msg}"),
            },
            loadout_api::Error::Host { status, message }
            | loadout_api::Error::ContentApi { status, message } => CoreError::Fetch {
                message,
                status: Some(status),
            },
            loadout_api::Error::Lockfile { path, reason } => CoreError::HostUnavailable {
                reason: format!("lockfile {path}: {reason}"),
            },
            loadout_api::Error::WebSocketConnect(reason) => CoreError::HostUnavailable { reason },
            loadout_api::Error::Deserialization { message, .. } => CoreError::Fetch {
                message: format!("unexpected response shape: {message}"),
                status: None,
            },
        }
    }
}
