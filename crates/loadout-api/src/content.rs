// Remote content API client
//
// Serves the champion/skin catalog snapshot and version metadata. Every
// response carries a `version` string; the catalog cache and the update
// checker compare it verbatim against what they already hold.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, deserialization, preview};
use crate::transport::TransportConfig;

// ── Wire types ───────────────────────────────────────────────────────

/// `{ "version": "..." }` as returned by the version endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    /// Download location for application updates, when advertised.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Full catalog snapshot, replaced atomically as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub version: String,
    #[serde(default)]
    pub champions: Vec<ChampionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChampionEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub skins: Vec<SkinEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub chromas: Vec<ChromaEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromaEntry {
    pub id: i64,
    pub name: String,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the remote content API.
pub struct ContentClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ContentClient {
    /// Build a client rooted at `base_url`, sending `X-API-KEY` when a key is given.
    pub fn new(
        base_url: Url,
        api_key: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value =
                HeaderValue::from_str(key.expose_secret()).map_err(|e| Error::Authentication {
                    message: format!("invalid API key header value: {e}"),
                })?;
            value.set_sensitive(true);
            headers.insert("X-API-KEY", value);
        }
        let http = transport.build_client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        // `Url::join` drops the last path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Currently advertised catalog version.
    pub async fn catalog_version(&self) -> Result<String, Error> {
        let info: VersionInfo = self.get("catalog/version").await?;
        Ok(info.version)
    }

    /// Full catalog snapshot.
    pub async fn catalog(&self) -> Result<CatalogSnapshot, Error> {
        self.get("catalog").await
    }

    /// Latest published application version.
    pub async fn latest_app_version(&self) -> Result<VersionInfo, Error> {
        self.get("app/latest").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("content API rejected credentials (HTTP {status})"),
            });
        }

        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::ContentApi {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| deserialization(&e, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ContentClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://content.example.com/api").unwrap(),
        );
        assert_eq!(client.base_url().as_str(), "https://content.example.com/api/");
        assert_eq!(
            client.base_url().join("catalog/version").unwrap().as_str(),
            "https://content.example.com/api/catalog/version"
        );
    }

    #[test]
    fn catalog_tolerates_missing_collections() {
        let snap: CatalogSnapshot = serde_json::from_value(serde_json::json!({
            "version": "14.3.1",
            "champions": [{ "id": 1, "name": "Annie" }]
        }))
        .unwrap();
        assert_eq!(snap.champions.len(), 1);
        assert!(snap.champions[0].skins.is_empty());
    }
}
