// ── Runtime session configuration ──
//
// Describes where the host and the content API live, where durable
// stores go, and how long bound resources stay fresh. Core never reads
// config files: the CLI builds a `SessionConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use loadout_api::{ReconnectConfig, TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Default, since the host serves a self-signed cert.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn transport(&self, timeout: Duration) -> TransportConfig {
        let tls = match self {
            Self::SystemDefaults => TlsMode::System,
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig { tls, timeout }
    }

    pub(crate) fn accepts_invalid(&self) -> bool {
        matches!(self, Self::DangerAcceptInvalid)
    }
}

/// How to reach the host process.
#[derive(Debug, Clone, Default)]
pub enum HostSource {
    /// Read port and password from the host's lockfile at start.
    Lockfile(PathBuf),
    /// Explicit endpoint (tests, remote debugging).
    Direct { url: Url, password: SecretString },
    /// Run without a host: catalog, stores and update checks only.
    #[default]
    Disabled,
}

/// Per-resource freshness windows. `None` keeps a value fresh until it
/// is invalidated; events keep such resources current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessConfig {
    pub summoner: Option<Duration>,
    pub mastery: Option<Duration>,
    pub gameflow: Option<Duration>,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            summoner: None,
            mastery: Some(Duration::from_secs(300)),
            gameflow: None,
        }
    }
}

impl FreshnessConfig {
    /// Seconds-based constructor where `0` means "until invalidated".
    pub fn from_secs(summoner: u64, mastery: u64, gameflow: u64) -> Self {
        let window = |secs: u64| (secs > 0).then_some(Duration::from_secs(secs));
        Self {
            summoner: window(summoner),
            mastery: window(mastery),
            gameflow: window(gameflow),
        }
    }
}

/// Everything a [`Session`](crate::Session) needs to start.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: HostSource,
    pub host_tls: TlsVerification,
    pub host_timeout: Duration,
    /// Base URL of the remote content API.
    pub content_url: Url,
    pub content_api_key: Option<SecretString>,
    pub content_tls: TlsVerification,
    pub content_timeout: Duration,
    /// Directory holding the durable catalog and selection stores.
    pub data_dir: PathBuf,
    /// Version of the running application, compared by the update check.
    pub app_version: String,
    pub freshness: FreshnessConfig,
    pub reconnect: ReconnectConfig,
    /// Subscribe to the host event stream on start.
    pub events_enabled: bool,
}

impl SessionConfig {
    /// Defaults for everything except the two required locations.
    pub fn new(content_url: Url, data_dir: PathBuf) -> Self {
        Self {
            host: HostSource::Disabled,
            host_tls: TlsVerification::DangerAcceptInvalid,
            host_timeout: Duration::from_secs(10),
            content_url,
            content_api_key: None,
            content_tls: TlsVerification::SystemDefaults,
            content_timeout: Duration::from_secs(30),
            data_dir,
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            freshness: FreshnessConfig::default(),
            reconnect: ReconnectConfig::default(),
            events_enabled: true,
        }
    }
}
