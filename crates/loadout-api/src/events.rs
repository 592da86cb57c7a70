//! Host push-event stream with auto-reconnect.
//!
//! Connects to the host's WebSocket endpoint, subscribes to the JSON-API
//! event feed, and streams parsed [`HostEvent`]s through a
//! [`tokio::sync::broadcast`] channel. Reconnection uses exponential
//! backoff with jitter. After a reconnect the host may replay current
//! state, so consumers must tolerate duplicate events.
//!
//! # Example
//!
//! ```rust,ignore
//! use loadout_api::events::{HostEventStream, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let stream = HostEventStream::connect(ws_url, &password, ReconnectConfig::default(), cancel.clone(), true)?;
//! let mut rx = stream.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{} {:?}", event.topic, event.event_type);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::host::basic_auth_header;

// ── Constants ────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// WAMP opcode for "subscribe".
const WAMP_SUBSCRIBE: u8 = 5;
/// WAMP opcode for "event".
const WAMP_EVENT: u8 = 8;
/// Catch-all feed carrying every JSON-API resource change.
const JSON_API_FEED: &str = "OnJsonApiEvent";

// ── HostEvent ────────────────────────────────────────────────────────

/// What happened to the resource at `uri`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

/// A parsed push event from the host.
///
/// `topic` is the resource URI flattened into the host's topic naming,
/// e.g. `/lol-summoner/v1/current-summoner` becomes
/// `lol-summoner_v1_current-summoner`. `data` is left untyped: each
/// consumer validates it against its own schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    pub topic: String,
    pub event_type: EventType,
    pub uri: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl HostEvent {
    /// Build an event for `topic` (used by tests and local injection).
    pub fn new(topic: impl Into<String>, event_type: EventType, data: serde_json::Value) -> Self {
        let topic = topic.into();
        let uri = format!("/{}", topic.replace('_', "/"));
        Self {
            topic,
            event_type,
            uri,
            data,
        }
    }
}

/// Flatten a resource URI into a topic name.
pub fn topic_for_uri(uri: &str) -> String {
    uri.trim_start_matches('/').replace('/', "_")
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── HostEventStream ──────────────────────────────────────────────────

/// Handle to a running host event stream.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct HostEventStream {
    event_rx: broadcast::Receiver<Arc<HostEvent>>,
    cancel: CancellationToken,
}

impl HostEventStream {
    /// Spawn the connection loop against `ws_url` and return immediately.
    ///
    /// `insecure` accepts the host's self-signed certificate.
    pub fn connect(
        ws_url: Url,
        password: &SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        insecure: bool,
    ) -> Result<Self, Error> {
        let auth = basic_auth_header(password)?
            .to_str()
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?
            .to_owned();
        let connector = if insecure {
            Some(Connector::Rustls(Arc::new(insecure_tls_config()?)))
        } else {
            None
        };

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let conn = Connection {
                url: ws_url,
                auth,
                connector,
            };
            ws_loop(conn, event_tx, reconnect, task_cancel).await;
        });

        Ok(Self { event_rx, cancel })
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HostEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

struct Connection {
    url: Url,
    auth: String,
    connector: Option<Connector>,
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(
    conn: Connection,
    event_tx: broadcast::Sender<Arc<HostEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&conn, &event_tx, &cancel) => {
                match result {
                    Ok(()) => {
                        tracing::info!("host WebSocket disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "host WebSocket error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "host WebSocket reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!("host WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

async fn connect_and_read(
    conn: &Connection,
    event_tx: &broadcast::Sender<Arc<HostEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %conn.url, "connecting to host WebSocket");

    let uri: tungstenite::http::Uri = conn
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri).with_header("Authorization", conn.auth.clone());

    let (ws_stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
        request,
        None,
        false,
        conn.connector.clone(),
    )
    .await
    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();

    let subscribe = format!("[{WAMP_SUBSCRIBE}, \"{JSON_API_FEED}\"]");
    write
        .send(tungstenite::Message::Text(subscribe.into()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("host WebSocket connected and subscribed");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "host WebSocket closed");
                        } else {
                            tracing::info!("host WebSocket closed (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("host WebSocket stream ended");
                        return Ok(());
                    }
                    // Ping/Pong/Binary/Frame: tungstenite answers pings itself.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Payload of a JSON-API event frame.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonApiPayload {
    uri: String,
    event_type: EventType,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a `[8, "<feed>", {uri, eventType, data}]` frame.
///
/// Returns `None` for non-event frames and anything malformed.
fn parse_frame(text: &str) -> Option<HostEvent> {
    let (opcode, feed, payload): (u8, String, JsonApiPayload) = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparsable host frame");
            return None;
        }
    };
    if opcode != WAMP_EVENT {
        return None;
    }

    // Per-topic subscriptions name the topic in the feed; the catch-all
    // feed only carries it in the URI.
    let topic = feed
        .strip_prefix(JSON_API_FEED)
        .and_then(|rest| rest.strip_prefix('_'))
        .map_or_else(|| topic_for_uri(&payload.uri), str::to_owned);

    Some(HostEvent {
        topic,
        event_type: payload.event_type,
        uri: payload.uri,
        data: payload.data,
    })
}

fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<HostEvent>>) {
    if let Some(event) = parse_frame(text) {
        tracing::trace!(topic = %event.topic, "host event");
        // No receivers right now is fine.
        let _ = event_tx.send(Arc::new(event));
    }
}

// ── TLS ──────────────────────────────────────────────────────────────

/// Accepts any server certificate. Only used for the loopback host.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

fn insecure_tls_config() -> Result<rustls::ClientConfig, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }))
        .with_no_client_auth();
    Ok(config)
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(16)).unwrap_or(16);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };
        // Jitter factor is at most 1.25.
        assert!(calculate_backoff(10, &config) <= Duration::from_millis(12_500));
        assert!(calculate_backoff(1_000, &config) <= Duration::from_millis(12_500));
    }

    #[test]
    fn backoff_grows_from_first_attempt() {
        let config = ReconnectConfig::default();
        assert!(calculate_backoff(2, &config) > calculate_backoff(0, &config));
    }

    #[test]
    fn topic_is_flattened_uri() {
        assert_eq!(
            topic_for_uri("/lol-summoner/v1/current-summoner"),
            "lol-summoner_v1_current-summoner"
        );
    }

    #[test]
    fn parse_catch_all_feed_frame() {
        let raw = serde_json::json!([
            8,
            "OnJsonApiEvent",
            {
                "uri": "/lol-gameflow/v1/session",
                "eventType": "Update",
                "data": { "phase": "ChampSelect" }
            }
        ]);
        let event = parse_frame(&raw.to_string()).unwrap();
        assert_eq!(event.topic, "lol-gameflow_v1_session");
        assert_eq!(event.event_type, EventType::Update);
        assert_eq!(event.data["phase"], "ChampSelect");
    }

    #[test]
    fn parse_per_topic_feed_frame() {
        let raw = serde_json::json!([
            8,
            "OnJsonApiEvent_lol-summoner_v1_current-summoner",
            { "uri": "/lol-summoner/v1/current-summoner", "eventType": "Delete", "data": null }
        ]);
        let event = parse_frame(&raw.to_string()).unwrap();
        assert_eq!(event.topic, "lol-summoner_v1_current-summoner");
        assert_eq!(event.event_type, EventType::Delete);
    }

    #[test]
    fn non_event_and_malformed_frames_are_skipped() {
        let (tx, mut rx) = broadcast::channel::<Arc<HostEvent>>(16);

        parse_and_broadcast("not json at all", &tx);
        parse_and_broadcast(r#"[5, "OnJsonApiEvent"]"#, &tx);
        parse_and_broadcast(r#"[8, "OnJsonApiEvent", {"uri": "/x", "eventType": "Explode"}]"#, &tx);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn host_event_new_derives_uri() {
        let event = HostEvent::new(
            "lol-gameflow_v1_session",
            EventType::Create,
            serde_json::Value::Null,
        );
        assert_eq!(event.uri, "/lol-gameflow/v1/session");
    }
}
