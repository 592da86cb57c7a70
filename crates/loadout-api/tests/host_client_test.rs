#![allow(clippy::unwrap_used)]
// Integration tests for `HostClient` and `ContentClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loadout_api::{
    ApplySelectionRequest, ContentClient, Error, HostClient, ProcessAction, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn host() -> (MockServer, HostClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = HostClient::new(
        base_url,
        &"s3cr3t".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

async fn content() -> (MockServer, ContentClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = ContentClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

// ── Host resources ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_json_sends_basic_auth() {
    let (server, client) = host().await;

    Mock::given(method("GET"))
        .and(path("/lol-summoner/v1/current-summoner"))
        // base64("riot:s3cr3t")
        .and(header("Authorization", "Basic cmlvdDpzM2NyM3Q="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summonerId": 42,
            "gameName": "Annie Bot"
        })))
        .mount(&server)
        .await;

    let value: serde_json::Value = client
        .get_json("/lol-summoner/v1/current-summoner")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value["summonerId"], 42);
}

#[tokio::test]
async fn test_get_json_not_found_is_none() {
    let (server, client) = host().await;

    Mock::given(method("GET"))
        .and(path("/lol-summoner/v1/current-summoner"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let value: Option<serde_json::Value> = client
        .get_json("lol-summoner/v1/current-summoner")
        .await
        .unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn test_host_error_body_is_surfaced() {
    let (server, client) = host().await;

    Mock::given(method("GET"))
        .and(path("/lol-gameflow/v1/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errorCode": "RPC_ERROR",
            "message": "gameflow unavailable"
        })))
        .mount(&server)
        .await;

    let result = client
        .get_json::<serde_json::Value>("lol-gameflow/v1/session")
        .await;
    match result {
        Err(Error::Host { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "gameflow unavailable");
        }
        other => panic!("expected Host error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (server, client) = host().await;

    Mock::given(method("GET"))
        .and(path("/native/v1/machine-id"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.machine_id().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Native calls ────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_selection_posts_body() {
    let (server, client) = host().await;

    Mock::given(method("POST"))
        .and(path("/native/v1/apply-selection"))
        .and(body_json(json!({ "entityId": 7, "choiceId": 9, "subChoiceId": 2 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .apply_selection(&ApplySelectionRequest {
            entity_id: 7,
            choice_id: 9,
            sub_choice_id: Some(2),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_machine_id() {
    let (server, client) = host().await;

    Mock::given(method("GET"))
        .and(path("/native/v1/machine-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "machineId": "HW-1234" })))
        .mount(&server)
        .await;

    assert_eq!(client.machine_id().await.unwrap(), "HW-1234");
}

#[tokio::test]
async fn test_process_action_paths() {
    let (server, client) = host().await;

    for segment in ["force-quit", "restart", "start-update"] {
        Mock::given(method("POST"))
            .and(path(format!("/native/v1/process/{segment}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
    }

    client.process_action(ProcessAction::ForceQuit).await.unwrap();
    client.process_action(ProcessAction::Restart).await.unwrap();
    client.process_action(ProcessAction::StartUpdate).await.unwrap();
}

// ── Content API ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_catalog_version_and_snapshot() {
    let (server, client) = content().await;

    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "14.3.1" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "14.3.1",
            "champions": [{
                "id": 1,
                "name": "Annie",
                "skins": [{
                    "id": 1001,
                    "name": "Goth Annie",
                    "chromas": [{ "id": 1101, "name": "Ruby" }]
                }]
            }]
        })))
        .mount(&server)
        .await;

    assert_eq!(client.catalog_version().await.unwrap(), "14.3.1");

    let snap = client.catalog().await.unwrap();
    assert_eq!(snap.version, "14.3.1");
    assert_eq!(snap.champions[0].skins[0].chromas[0].id, 1101);
}

#[tokio::test]
async fn test_latest_app_version() {
    let (server, client) = content().await;

    Mock::given(method("GET"))
        .and(path("/api/app/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "1.3.0",
            "url": "https://downloads.example.com/loadout-1.3.0"
        })))
        .mount(&server)
        .await;

    let info = client.latest_app_version().await.unwrap();
    assert_eq!(info.version, "1.3.0");
    assert!(info.url.is_some());
    assert!(info.notes.is_none());
}

#[tokio::test]
async fn test_content_api_error_status() {
    let (server, client) = content().await;

    Mock::given(method("GET"))
        .and(path("/api/catalog"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.catalog().await.unwrap_err();
    assert!(err.is_transient());
    assert!(
        matches!(err, Error::ContentApi { status: 503, ref message } if message == "maintenance"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_content_malformed_body() {
    let (server, client) = content().await;

    Mock::given(method("GET"))
        .and(path("/api/catalog/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.catalog_version().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_content_api_key_header() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ContentClient::new(
        base_url,
        Some(&"content-key".to_string().into()),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/catalog/version"))
        .and(header("X-API-KEY", "content-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "1" })))
        .mount(&server)
        .await;

    assert_eq!(client.catalog_version().await.unwrap(), "1");
}
