//! Integration tests for the action nodes
//!
//! Runs executors through [`Nodes`] with a real token lifecycle manager (its
//! token endpoint scripted, its clock mocked) against wiremock storage.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use lakeflow_common::auth::{CallbackMode, OAuth2ClientConfig, TokenLifecycleManager, TokenRecord};
use lakeflow_common::testing::{MockTokenExchange, RecordingBrowser};
use lakeflow_common::time::{Clock, MockClock};
use lakeflow_domain::{Config, FlowMessage};
use lakeflow_infra::{AccessTokenProvider, NodeKind, Nodes};
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_MILLIS: u64 = 1_700_000_000_000;

struct Harness {
    manager: TokenLifecycleManager,
    exchange: MockTokenExchange,
    browser: RecordingBrowser,
    clock: MockClock,
}

fn harness(seed: Option<(&str, Option<&str>)>) -> Harness {
    let clock = MockClock::at_millis(START_MILLIS);
    let exchange = MockTokenExchange::with_clock(Arc::new(clock.clone()));
    let browser = RecordingBrowser::new();

    let config = OAuth2ClientConfig::new(
        "c1",
        "s3cret",
        "https://idp.example.com/authorize",
        "https://idp.example.com/token",
        "http://localhost:1880/oauth2/callback",
        "https://storage.azure.com/.default offline_access",
    );
    let mut builder = TokenLifecycleManager::builder(config)
        .exchange(Arc::new(exchange.clone()))
        .browser(Arc::new(browser.clone()))
        .clock(Arc::new(clock.clone()))
        .callback_mode(CallbackMode::Hosted)
        .authorization_timeout(Some(Duration::from_millis(200)));
    if let Some((access, refresh)) = seed {
        builder = builder.initial_record(TokenRecord {
            access_token: Some(access.to_string()),
            refresh_token: refresh.map(str::to_string),
            expires_in_secs: Some(3600),
            obtained_at_millis: Some(clock.millis_since_epoch()),
        });
    }

    Harness { manager: builder.build().unwrap(), exchange, browser, clock }
}

fn nodes(harness: &Harness) -> Nodes {
    let provider: Arc<dyn AccessTokenProvider> = Arc::new(harness.manager.clone());
    Nodes::from_config(&Config::default(), Some(provider)).unwrap()
}

/// Validates that a cached token is reused across node invocations.
///
/// Assertions:
/// - Both storage requests carry the seeded token.
/// - The token endpoint is never called.
#[tokio::test]
async fn test_cached_token_is_reused_across_nodes() {
    let storage = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer A1"))
        .and(header("x-ms-lease-action", "break"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&storage)
        .await;
    Mock::given(method("HEAD"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&storage)
        .await;

    let harness = harness(Some(("A1", Some("R1"))));
    let nodes = nodes(&harness);
    let url = format!("{}/fs/a.csv", storage.uri());

    let lease = nodes
        .run(NodeKind::Lease, FlowMessage::new(json!({"url": url, "action": "break"})))
        .await;
    assert_eq!(lease.payload["statusCode"], 202);

    let props = nodes
        .run(NodeKind::Files, FlowMessage::new(json!({"url": url, "action": "getproperties"})))
        .await;
    assert_eq!(props.payload["status"], "Get Properties successful");
    assert_eq!(harness.exchange.calls(), 0);
}

/// Validates the refresh path once the cached token goes stale.
///
/// # Test Steps
/// 1. Seed a token valid for one hour and advance the clock past the margin
/// 2. Run a files node
///
/// Assertions:
/// - One refresh-token grant is made.
/// - Storage sees the refreshed token; no browser is opened.
#[tokio::test]
async fn test_stale_token_is_refreshed_before_request() {
    let storage = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A2"))
        .and(query_param("resource", "filesystem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"paths": []})))
        .expect(1)
        .mount(&storage)
        .await;

    let harness = harness(Some(("A1", Some("R1"))));
    harness.exchange.push_token("A2", Some("R2"), 3600);
    harness.clock.advance(Duration::from_secs(3600 - 30));

    let out = nodes(&harness)
        .run(
            NodeKind::Files,
            FlowMessage::new(json!({"url": format!("{}/fs", storage.uri()), "action": "list"})),
        )
        .await;

    assert_eq!(out.payload["status"], "Get List successful");
    assert_eq!(harness.exchange.grants(), vec!["refresh_token"]);
    assert!(harness.browser.urls().is_empty());
    assert_eq!(harness.manager.snapshot().refresh_token.as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_unanswered_authorization_fails_without_storage_request() {
    let storage = MockServer::start().await;
    Mock::given(method("PUT")).respond_with(ResponseTemplate::new(201)).expect(0).mount(&storage).await;

    let harness = harness(None);
    let mut source = NamedTempFile::new().unwrap();
    source.write_all(b"payload").unwrap();

    let out = nodes(&harness)
        .run(
            NodeKind::Automation,
            FlowMessage::new(json!({
                "url": format!("{}/fs/out.bin", storage.uri()),
                "filePath": source.path().to_str().unwrap()
            })),
        )
        .await;

    let error = out.payload["error"].as_str().unwrap();
    assert!(error.starts_with("Authorization unavailable"), "{error}");
    assert_eq!(harness.browser.urls().len(), 1);
    assert!(!harness.manager.is_authorizing());
}

#[tokio::test]
async fn test_storage_rejection_becomes_error_payload() {
    let storage = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"error": {"code": "AuthorizationPermissionMismatch"}})),
        )
        .expect(1)
        .mount(&storage)
        .await;

    let harness = harness(Some(("A1", None)));
    let out = nodes(&harness)
        .run(
            NodeKind::Tables,
            FlowMessage::new(json!({
                "url": format!("{}/tables", storage.uri()),
                "action": "upload",
                "tableName": "sales",
                "filePath": "Files/sales.parquet"
            })),
        )
        .await;

    assert_eq!(
        out.payload,
        json!({
            "error": r#"Request failed with status 403: {"error":{"code":"AuthorizationPermissionMismatch"}}"#
        })
    );
}
