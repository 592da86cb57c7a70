//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use loadout_config::ConfigError;
use loadout_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const STATE: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("League client is not reachable: {reason}")]
    #[diagnostic(
        code(loadout::host_unavailable),
        help(
            "Start the League client, or point loadout at it:\n\
             set host.lockfile (or host.url + host.password) in the config file.\n\
             Run: loadout config path"
        )
    )]
    HostUnavailable { reason: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(loadout::auth_failed),
        help(
            "The client rejected the lockfile credentials; it may have restarted.\n\
             For the content API, check the key with: loadout config set-key"
        )
    )]
    AuthFailed { message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(loadout::timeout),
        help("Increase host.timeout / content.timeout in the config file.")
    )]
    Timeout { seconds: u64 },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("Request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(loadout::request_failed))]
    RequestFailed { message: String, status: Option<u16> },

    #[error("Client call `{call}` failed: {message}")]
    #[diagnostic(
        code(loadout::native_call),
        help("The selection was stored and will be re-applied by: loadout selections replay")
    )]
    NativeCall { call: String, message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(loadout::not_found),
        help("Run: loadout {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("The catalog is not loaded")]
    #[diagnostic(code(loadout::no_catalog), help("Run: loadout catalog refresh"))]
    CatalogUnavailable,

    #[error("{message}")]
    #[diagnostic(code(loadout::invalid_state))]
    InvalidState { message: String },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Local storage failed: {message}")]
    #[diagnostic(
        code(loadout::storage),
        help("Check that storage.data_dir exists and is writable.")
    )]
    Storage { message: String },

    // ── Validation / Configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(loadout::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(loadout::config),
        help("Inspect the resolved configuration with: loadout config show")
    )]
    Config { message: String },

    #[error("Keyring error: {0}")]
    #[diagnostic(code(loadout::keyring))]
    Keyring(#[from] keyring::Error),

    #[error("Internal error: {message}")]
    #[diagnostic(code(loadout::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(loadout::json))]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization failed: {0}")]
    #[diagnostic(code(loadout::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::HostUnavailable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::CatalogUnavailable | Self::InvalidState { .. } => exit_code::STATE,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::HostUnavailable { reason } => CliError::HostUnavailable { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NativeCall { call, message } => CliError::NativeCall {
                call: call.into(),
                message,
            },

            CoreError::Fetch { message, status } => CliError::RequestFailed { message, status },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                resource_type: entity_type.into(),
                identifier,
                list_command: "catalog status".into(),
            },

            CoreError::CatalogNotLoaded => CliError::CatalogUnavailable,

            CoreError::Storage(e) => CliError::Storage {
                message: e.to_string(),
            },

            e @ CoreError::InvalidTransition { .. } => CliError::InvalidState {
                message: e.to_string(),
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::Internal { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
