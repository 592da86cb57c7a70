// Host process HTTP client
//
// The host exposes two surfaces on one loopback endpoint: read-only JSON
// resources (summoner, mastery, gameflow) that bindings fetch on a cache
// miss, and native actions (apply a selection, read the machine id,
// process control). Both use basic auth derived from the lockfile.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, deserialization, preview};
use crate::lockfile::{HOST_USERNAME, Lockfile};
use crate::transport::TransportConfig;

/// Process-level actions the host can perform on our behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessAction {
    ForceQuit,
    Restart,
    StartUpdate,
}

impl ProcessAction {
    fn path_segment(self) -> &'static str {
        match self {
            Self::ForceQuit => "force-quit",
            Self::Restart => "restart",
            Self::StartUpdate => "start-update",
        }
    }
}

/// Body of the native "apply selection" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySelectionRequest {
    pub entity_id: i64,
    pub choice_id: i64,
    pub sub_choice_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachineIdResponse {
    machine_id: String,
}

/// Host error bodies look like `{"errorCode": "...", "message": "..."}`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Raw HTTP client for the host process.
pub struct HostClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HostClient {
    /// Build a client for `base_url` authenticating as the host user.
    pub fn new(
        base_url: Url,
        password: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, basic_auth_header(password)?);
        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, base_url })
    }

    /// Build a client from a parsed lockfile.
    pub fn from_lockfile(lockfile: &Lockfile, transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(lockfile.base_url()?, &lockfile.password, transport)
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The host base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Resources ────────────────────────────────────────────────────

    /// GET a JSON resource. A 404 means "nothing there right now"
    /// (e.g. no summoner logged in) and maps to `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::checked_body(resp).await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| deserialization(&e, &body))
    }

    // ── Native calls ─────────────────────────────────────────────────

    /// Apply a catalog-entity selection natively.
    pub async fn apply_selection(&self, request: &ApplySelectionRequest) -> Result<(), Error> {
        let url = self.url("native/v1/apply-selection")?;
        debug!(entity_id = request.entity_id, "POST {}", url);

        let resp = self.http.post(url).json(request).send().await?;
        Self::checked_body(resp).await.map(drop)
    }

    /// Fetch the stable hardware/machine identifier.
    pub async fn machine_id(&self) -> Result<String, Error> {
        let url = self.url("native/v1/machine-id")?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let body = Self::checked_body(resp).await?;
        let parsed: MachineIdResponse =
            serde_json::from_str(&body).map_err(|e| deserialization(&e, &body))?;
        Ok(parsed.machine_id)
    }

    /// Trigger a process-level action (quit, restart, start update).
    pub async fn process_action(&self, action: ProcessAction) -> Result<(), Error> {
        let url = self.url(&format!("native/v1/process/{}", action.path_segment()))?;
        debug!(?action, "POST {}", url);

        let resp = self.http.post(url).send().await?;
        Self::checked_body(resp).await.map(drop)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Map non-success statuses to [`Error`], returning the body text otherwise.
    async fn checked_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "host rejected lockfile credentials".into(),
            });
        }

        let body = resp.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<HostErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error_code))
            .unwrap_or_else(|| preview(&body));
        Err(Error::Host {
            status: status.as_u16(),
            message,
        })
    }
}

/// `Authorization: Basic base64(riot:password)`, marked sensitive.
pub fn basic_auth_header(password: &SecretString) -> Result<HeaderValue, Error> {
    let token = STANDARD.encode(format!("{HOST_USERNAME}:{}", password.expose_secret()));
    let mut value =
        HeaderValue::from_str(&format!("Basic {token}")).map_err(|e| Error::Authentication {
            message: format!("invalid auth header value: {e}"),
        })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_host_user() {
        let header = basic_auth_header(&SecretString::from("pw".to_owned())).unwrap();
        // base64("riot:pw")
        assert_eq!(header.to_str().unwrap(), "Basic cmlvdDpwdw==");
        assert!(header.is_sensitive());
    }

    #[test]
    fn apply_selection_body_is_camel_case() {
        let body = serde_json::to_value(ApplySelectionRequest {
            entity_id: 7,
            choice_id: 7003,
            sub_choice_id: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "entityId": 7, "choiceId": 7003, "subChoiceId": null })
        );
    }
}
