//! Integration tests for the resource client.
//!
//! These tests verify that the ResourceClient correctly:
//! - Refuses to fetch without a session token, issuing zero requests
//! - Sends the documented auth header and query parameters
//! - Validates snapshot ids before building a URL
//! - Clears cached credentials after a failed fetch so the next cycle
//!   re-authenticates

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use camfeed_core::auth::{CredentialProvider, CredentialStore, TokenExchanger};
use camfeed_core::config::{ApiConfig, Endpoints};
use camfeed_core::model::{AccessToken, SessionToken};
use camfeed_core::resource::{FetchError, ResourceClient};
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server_uri: &str) -> ApiConfig {
    ApiConfig::new(
        "test-api-key",
        "test-client-id",
        "test-refresh-token",
        "camera-1",
    )
    .with_endpoints(Endpoints {
        oauth_token_url: Url::parse(&format!("{server_uri}/oauth/token")).unwrap(),
        session_token_url: Url::parse(&format!("{server_uri}/issue_jwt")).unwrap(),
        api_base_url: Url::parse(server_uri).unwrap(),
    })
}

/// Credential provider with a fixed session token and a reset counter.
struct StaticProvider {
    session: Option<&'static str>,
    resets: AtomicUsize,
}

impl StaticProvider {
    fn with_session(session: &'static str) -> Arc<Self> {
        Arc::new(Self {
            session: Some(session),
            resets: AtomicUsize::new(0),
        })
    }

    fn without_session() -> Arc<Self> {
        Arc::new(Self {
            session: None,
            resets: AtomicUsize::new(0),
        })
    }

    fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn access_token(&self) -> Option<AccessToken> {
        self.session.map(AccessToken::new)
    }

    async fn session_token(&self) -> Option<SessionToken> {
        self.session.map(SessionToken::new)
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_fetch_events_without_session_issues_no_requests() {
    let server = MockServer::start().await;
    let provider = StaticProvider::without_session();
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let result = client.fetch_events(None, None).await;

    assert!(matches!(result, Err(FetchError::CredentialMissing)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_snapshot_without_session_issues_no_requests() {
    let server = MockServer::start().await;
    let provider = StaticProvider::without_session();
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let result = client.fetch_latest_snapshot().await;

    assert!(matches!(result, Err(FetchError::CredentialMissing)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_events_parses_vendor_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cuepoint/camera-1/2"))
        .and(header("authorization", "Basic jwt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "evt-1", "types": ["motion"]},
            {"id": "evt-2", "types": ["sound"]},
        ])))
        .mount(&server)
        .await;

    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let events = client.fetch_events(None, None).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1].field("id").and_then(|v| v.as_str()),
        Some("evt-2")
    );
}

#[tokio::test]
async fn test_fetch_events_time_bounds_become_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cuepoint/camera-1/2"))
        .and(query_param("start_time", "100"))
        .and(query_param("end_time", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let events = client.fetch_events(Some(100.0), Some(200.0)).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_fetch_latest_snapshot_returns_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_image"))
        .and(query_param("uuid", "camera-1"))
        .and(header("authorization", "Basic jwt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .mount(&server)
        .await;

    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let image = client.fetch_latest_snapshot().await.unwrap();
    assert_eq!(image.as_ref(), b"jpeg-bytes");
}

#[tokio::test]
async fn test_fetch_snapshot_by_id_sends_crop_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/event_snapshot/camera-1/evt-42"))
        .and(query_param("crop_type", "timeline"))
        .and(query_param("width", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"crop".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider);

    let image = client.fetch_snapshot_by_id("evt-42").await.unwrap();
    assert_eq!(image.as_ref(), b"crop");
}

#[tokio::test]
async fn test_invalid_snapshot_id_issues_no_requests() {
    let server = MockServer::start().await;
    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider.clone());

    let result = client.fetch_snapshot_by_id("../../etc/passwd").await;

    assert!(matches!(result, Err(FetchError::InvalidId { .. })));
    assert!(server.received_requests().await.unwrap().is_empty());
    // Validation failures are not fetch failures; no reset is triggered.
    assert_eq!(provider.reset_count(), 0);
}

#[tokio::test]
async fn test_failed_fetch_triggers_credential_reset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cuepoint/camera-1/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = StaticProvider::with_session("jwt-1");
    let client = ResourceClient::new(test_config(&server.uri()), provider.clone());

    let result = client.fetch_events(None, None).await;

    assert!(matches!(result, Err(FetchError::Status { .. })));
    assert_eq!(provider.reset_count(), 1);
}

#[tokio::test]
async fn test_fetch_failure_then_fresh_exchanges_on_next_call() {
    let server = MockServer::start().await;

    // Both token exchanges happen twice: once before the failing fetch and
    // once after the reset it triggers.
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-1",
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/issue_jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jwt": "jwt-1",
        })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cuepoint/camera-1/2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cuepoint/camera-1/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "evt-1"},
        ])))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let store = Arc::new(CredentialStore::new(TokenExchanger::new(config.clone())));
    let client = ResourceClient::new(config, store);

    assert!(client.fetch_events(None, None).await.is_err());

    let events = client.fetch_events(None, None).await.unwrap();
    assert_eq!(events.len(), 1);
}
