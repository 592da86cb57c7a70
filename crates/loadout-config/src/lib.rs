//! Configuration for the loadout CLI.
//!
//! A single TOML file merged over built-in defaults and `LOADOUT_`
//! environment variables, content API key resolution (env + keyring +
//! plaintext), and translation to `loadout_core::SessionConfig`. Core
//! never reads configuration itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use loadout_core::{FreshnessConfig, HostSource, ReconnectConfig, SessionConfig, TlsVerification};

/// Keyring service holding loadout secrets.
pub const KEYRING_SERVICE: &str = "loadout";
/// Keyring entry for the content API key.
pub const KEYRING_CONTENT_KEY: &str = "content-api-key";
/// Environment variable consulted for the content API key when
/// `content.api_key_env` is not set.
pub const DEFAULT_CONTENT_KEY_ENV: &str = "LOADOUT_CONTENT_KEY";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub app: AppSection,
}

/// Where the host process lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostSection {
    /// Host lockfile (`name:pid:port:password:protocol`).
    pub lockfile: Option<PathBuf>,

    /// Explicit base URL; overrides the lockfile.
    pub url: Option<String>,

    /// Password for `url` (plaintext). Ignored with a lockfile.
    pub password: Option<String>,

    /// Accept the host's self-signed certificate.
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// Path to a custom CA certificate, used when `insecure` is off.
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_host_timeout")]
    pub timeout: u64,

    /// Follow the host's push-event stream.
    #[serde(default = "default_true")]
    pub events: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            lockfile: None,
            url: None,
            password: None,
            insecure: true,
            ca_cert: None,
            timeout: default_host_timeout(),
            events: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContentSection {
    #[serde(default = "default_content_url")]
    pub base_url: String,

    /// API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_content_timeout")]
    pub timeout: u64,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            base_url: default_content_url(),
            api_key: None,
            api_key_env: None,
            ca_cert: None,
            timeout: default_content_timeout(),
        }
    }
}

/// Freshness windows and event stream reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncSection {
    /// `0` keeps the value fresh until invalidated.
    #[serde(default)]
    pub summoner_fresh_secs: u64,
    #[serde(default = "default_mastery_fresh")]
    pub mastery_fresh_secs: u64,
    #[serde(default)]
    pub gameflow_fresh_secs: u64,
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
    /// Give up after this many attempts; unset retries forever.
    pub reconnect_max_retries: Option<u32>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            summoner_fresh_secs: 0,
            mastery_fresh_secs: default_mastery_fresh(),
            gameflow_fresh_secs: 0,
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_ms: default_reconnect_max(),
            reconnect_max_retries: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSection {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppSection {
    /// Local application version; defaults to the build version.
    pub version: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_host_timeout() -> u64 {
    10
}
fn default_content_url() -> String {
    "https://content.loadout.gg/api/".into()
}
fn default_content_timeout() -> u64 {
    30
}
fn default_mastery_fresh() -> u64 {
    300
}
fn default_reconnect_initial() -> u64 {
    1_000
}
fn default_reconnect_max() -> u64 {
    30_000
}

impl Config {
    /// Copy with every plaintext secret masked, for display.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        if cfg.host.password.is_some() {
            cfg.host.password = Some(REDACTED.into());
        }
        if cfg.content.api_key.is_some() {
            cfg.content.api_key = Some(REDACTED.into());
        }
        cfg
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("gg", "loadout", "loadout")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "loadout", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory for the durable stores.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "loadout"]),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LOADOUT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the content API key: env var, then keyring, then plaintext.
/// The key is optional; `None` means requests go out unauthenticated.
pub fn resolve_content_api_key(content: &ContentSection) -> Option<SecretString> {
    // 1. Configured (or default) env var
    let env_name = content
        .api_key_env
        .as_deref()
        .unwrap_or(DEFAULT_CONTENT_KEY_ENV);
    if let Ok(val) = std::env::var(env_name) {
        if !val.is_empty() {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_CONTENT_KEY) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    content.api_key.clone().map(SecretString::from)
}

fn host_tls(host: &HostSection) -> TlsVerification {
    if host.insecure {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = host.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

fn host_source(host: &HostSection) -> Result<HostSource, ConfigError> {
    if let Some(ref raw) = host.url {
        let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "host.url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        let password = host.password.clone().ok_or_else(|| ConfigError::Validation {
            field: "host.password".into(),
            reason: "required when host.url is set".into(),
        })?;
        return Ok(HostSource::Direct {
            url,
            password: SecretString::from(password),
        });
    }
    Ok(host
        .lockfile
        .clone()
        .map_or(HostSource::Disabled, HostSource::Lockfile))
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `SessionConfig` from a loaded Config.
pub fn to_session_config(cfg: &Config) -> Result<SessionConfig, ConfigError> {
    let content_url: url::Url =
        cfg.content
            .base_url
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "content.base_url".into(),
                reason: format!("invalid URL: {}", cfg.content.base_url),
            })?;

    if cfg.sync.reconnect_initial_ms > cfg.sync.reconnect_max_ms {
        return Err(ConfigError::Validation {
            field: "sync.reconnect_initial_ms".into(),
            reason: "must not exceed sync.reconnect_max_ms".into(),
        });
    }

    let data_dir = cfg
        .storage
        .data_dir
        .clone()
        .unwrap_or_else(default_data_dir);

    let mut session = SessionConfig::new(content_url, data_dir);
    session.host = host_source(&cfg.host)?;
    session.host_tls = host_tls(&cfg.host);
    session.host_timeout = Duration::from_secs(cfg.host.timeout);
    session.events_enabled = cfg.host.events;
    session.content_api_key = resolve_content_api_key(&cfg.content);
    session.content_tls = cfg
        .content
        .ca_cert
        .clone()
        .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa);
    session.content_timeout = Duration::from_secs(cfg.content.timeout);
    session.freshness = FreshnessConfig::from_secs(
        cfg.sync.summoner_fresh_secs,
        cfg.sync.mastery_fresh_secs,
        cfg.sync.gameflow_fresh_secs,
    );
    session.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(cfg.sync.reconnect_initial_ms),
        max_delay: Duration::from_millis(cfg.sync.reconnect_max_ms),
        max_retries: cfg.sync.reconnect_max_retries,
    };
    if let Some(ref version) = cfg.app.version {
        session.app_version.clone_from(version);
    }
    Ok(session)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    // Tests that read the environment run inside a `Jail` so they never
    // observe variables set by a concurrent test.

    #[test]
    fn missing_file_gives_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            assert!(cfg.host.insecure);
            assert_eq!(cfg.sync.mastery_fresh_secs, 300);
            Ok(())
        });
    }

    #[test]
    fn file_and_env_layers_merge() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [host]
                lockfile = "/games/lockfile"
                timeout = 4

                [sync]
                mastery_fresh_secs = 60
                "#,
            )?;
            jail.set_env("LOADOUT_HOST__TIMEOUT", "7");
            jail.set_env("LOADOUT_APP__VERSION", "2.0.0");

            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.host.lockfile, Some(PathBuf::from("/games/lockfile")));
            assert_eq!(cfg.host.timeout, 7);
            assert_eq!(cfg.sync.mastery_fresh_secs, 60);
            assert_eq!(cfg.app.version.as_deref(), Some("2.0.0"));
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.host.url = Some("https://127.0.0.1:2999".into());
        cfg.storage.data_dir = Some(dir.path().join("data"));
        save_config_to(&path, &cfg).unwrap();

        Jail::expect_with(|_jail| {
            let loaded = load_config_from(&path).map_err(|e| e.to_string())?;
            assert_eq!(loaded, cfg);
            Ok(())
        });
    }

    #[test]
    fn session_config_translation() {
        let mut cfg = Config::default();
        cfg.host.lockfile = Some("/games/lockfile".into());
        cfg.sync.summoner_fresh_secs = 15;
        cfg.sync.mastery_fresh_secs = 0;
        cfg.storage.data_dir = Some("/tmp/loadout".into());
        cfg.app.version = Some("1.2.0".into());

        let session = to_session_config(&cfg).unwrap();
        assert!(matches!(session.host, HostSource::Lockfile(ref p) if p == Path::new("/games/lockfile")));
        assert_eq!(session.host_tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(session.freshness.summoner, Some(Duration::from_secs(15)));
        assert_eq!(session.freshness.mastery, None);
        assert_eq!(session.data_dir, PathBuf::from("/tmp/loadout"));
        assert_eq!(session.app_version, "1.2.0");
        assert_eq!(session.reconnect.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn direct_host_requires_password() {
        let mut cfg = Config::default();
        cfg.host.url = Some("https://127.0.0.1:2999".into());
        assert!(matches!(
            to_session_config(&cfg),
            Err(ConfigError::Validation { ref field, .. }) if field == "host.password"
        ));

        cfg.host.password = Some("hunter2".into());
        let session = to_session_config(&cfg).unwrap();
        match session.host {
            HostSource::Direct { url, password } => {
                assert_eq!(url.port(), Some(2999));
                assert_eq!(password.expose_secret(), "hunter2");
            }
            other => panic!("expected direct host, got {other:?}"),
        }
    }

    #[test]
    fn invalid_urls_and_backoff_are_rejected() {
        let mut cfg = Config::default();
        cfg.content.base_url = "not a url".into();
        assert!(matches!(to_session_config(&cfg), Err(ConfigError::Validation { .. })));

        let mut cfg = Config::default();
        cfg.sync.reconnect_initial_ms = 60_000;
        assert!(matches!(to_session_config(&cfg), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn api_key_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("CUSTOM_CONTENT_KEY", "from-env");
            let content = ContentSection {
                api_key: Some("from-file".into()),
                api_key_env: Some("CUSTOM_CONTENT_KEY".into()),
                ..ContentSection::default()
            };
            let key = resolve_content_api_key(&content).unwrap();
            assert_eq!(key.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn redacted_masks_secrets() {
        let mut cfg = Config::default();
        cfg.content.api_key = Some("secret".into());
        let shown = cfg.redacted();
        assert_eq!(shown.content.api_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.host.password, None);
    }
}
