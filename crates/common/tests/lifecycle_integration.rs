//! Integration tests for the token lifecycle
//!
//! Drives complete standalone authorization flows: a real loopback callback
//! listener, a wiremock token endpoint and a recording browser.

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lakeflow_common::auth::{
    AuthError, CallbackMode, OAuth2ClientConfig, TokenExchanger, TokenLifecycleManager,
};
use lakeflow_common::testing::{poll_until, RecordingBrowser};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn standalone_manager(
    token_server: &MockServer,
    port: u16,
    browser: &RecordingBrowser,
) -> TokenLifecycleManager {
    let config = OAuth2ClientConfig::new(
        "c1",
        "s3cret",
        format!("{}/authorize", token_server.uri()),
        format!("{}/token", token_server.uri()),
        format!("http://localhost:{port}/oauth2/callback"),
        "read write",
    );
    let exchanger = TokenExchanger::new(Arc::new(config.clone())).unwrap();
    TokenLifecycleManager::builder(config)
        .exchange(Arc::new(exchanger))
        .browser(Arc::new(browser.clone()))
        .callback_mode(CallbackMode::Standalone)
        .build()
        .unwrap()
}

fn spawn_callers(
    manager: &TokenLifecycleManager,
    count: usize,
) -> Vec<tokio::task::JoinHandle<Result<String, AuthError>>> {
    (0..count)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_token().await })
        })
        .collect()
}

async fn listener_stopped(manager: &TokenLifecycleManager) -> bool {
    poll_until(Duration::from_secs(5), Duration::from_millis(10), || async {
        manager.callback_server_addr().await.is_none()
    })
    .await
}

/// Validates a complete standalone authorization flow with concurrent
/// callers.
///
/// # Test Steps
/// 1. Three callers request a token with an empty store
/// 2. The browser is opened once; the test plays the provider redirect
/// 3. The token endpoint is hit once with the authorization code
///
/// Assertions:
/// - The redirect answers 200 and every caller receives the token.
/// - The callback listener is stopped after the flow completes.
#[tokio::test(flavor = "multi_thread")]
async fn test_standalone_flow_end_to_end() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A",
            "refresh_token": "R",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&token_server)
        .await;

    let port = free_port();
    let browser = RecordingBrowser::new();
    let manager = standalone_manager(&token_server, port, &browser);

    let callers = spawn_callers(&manager, 3);
    assert!(browser.wait_for_launches(1).await);
    assert!(manager.callback_server_addr().await.is_some());

    let response = reqwest::get(format!(
        "http://127.0.0.1:{port}/oauth2/callback?code=abc&session_state=xyz"
    ))
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.text().await.unwrap().contains("Authorization successful"));

    for outcome in join_all(callers).await {
        assert_eq!(outcome.unwrap(), Ok("A".to_string()));
    }
    assert_eq!(browser.urls().len(), 1);
    assert!(browser.urls()[0].contains(&format!(
        "redirect_uri=http%3A%2F%2Flocalhost%3A{port}%2Foauth2%2Fcallback"
    )));

    assert!(listener_stopped(&manager).await);
    assert_eq!(manager.get_valid_token().await, Ok("A".to_string()));
}

/// Validates that a redirect without a code fails every waiter.
///
/// Assertions:
/// - The redirect answers 400.
/// - Callers fail with `AuthUnavailable` and the token endpoint is not hit.
#[tokio::test(flavor = "multi_thread")]
async fn test_standalone_missing_code_fails_waiters() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&token_server)
        .await;

    let port = free_port();
    let browser = RecordingBrowser::new();
    let manager = standalone_manager(&token_server, port, &browser);

    let callers = spawn_callers(&manager, 2);
    assert!(browser.wait_for_launches(1).await);

    let response =
        reqwest::get(format!("http://127.0.0.1:{port}/oauth2/callback")).await.unwrap();
    assert_eq!(response.status().as_u16(), 400);

    for outcome in join_all(callers).await {
        match outcome.unwrap() {
            Err(AuthError::AuthUnavailable(message)) => {
                assert!(message.contains("authorization code not found"));
            }
            other => panic!("expected AuthUnavailable, got {other:?}"),
        }
    }
    assert!(listener_stopped(&manager).await);
}

/// Validates the rejection of a second redirect while the first is being
/// exchanged.
///
/// Assertions:
/// - Exactly one of the two redirects answers 200, the other 409.
/// - The token endpoint sees one exchange.
#[tokio::test(flavor = "multi_thread")]
async fn test_duplicate_redirect_is_rejected() {
    let token_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "A", "expires_in": 3600}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&token_server)
        .await;

    let port = free_port();
    let browser = RecordingBrowser::new();
    let manager = standalone_manager(&token_server, port, &browser);

    let callers = spawn_callers(&manager, 1);
    assert!(browser.wait_for_launches(1).await);

    let url = format!("http://127.0.0.1:{port}/oauth2/callback?code=abc");
    let first = tokio::spawn(reqwest::get(url.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = reqwest::get(url).await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(second.status().as_u16(), 409);
    for outcome in join_all(callers).await {
        assert_eq!(outcome.unwrap(), Ok("A".to_string()));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_occupied_port_fails_flow() {
    let token_server = MockServer::start().await;
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let browser = RecordingBrowser::new();
    let manager = standalone_manager(&token_server, port, &browser);

    let err = manager.get_valid_token().await.unwrap_err();
    match err {
        AuthError::AuthUnavailable(message) => assert!(message.contains("failed to bind")),
        other => panic!("expected AuthUnavailable, got {other:?}"),
    }
    assert!(browser.urls().is_empty());
    assert!(!manager.is_authorizing());
    drop(occupied);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_fails_pending_and_stops_listener() {
    let token_server = MockServer::start().await;
    let port = free_port();
    let browser = RecordingBrowser::new();
    let manager = standalone_manager(&token_server, port, &browser);

    let callers = spawn_callers(&manager, 1);
    assert!(browser.wait_for_launches(1).await);

    manager.shutdown().await;
    for outcome in join_all(callers).await {
        assert!(matches!(outcome.unwrap(), Err(AuthError::AuthUnavailable(_))));
    }
    assert!(manager.callback_server_addr().await.is_none());
    assert!(reqwest::get(format!("http://127.0.0.1:{port}/oauth2/callback")).await.is_err());
}
