//! Token endpoint client
//!
//! Posts form-encoded authorization-code and refresh-token grants and turns
//! the JSON response into a [`TokenRecord`]. The client secret travels only in
//! the request body and is never logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::error::AuthError;
use super::traits::TokenExchange;
use super::types::{GrantRequest, OAuth2ClientConfig, TokenRecord, TokenResponse};
use crate::time::{Clock, SystemClock};

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token endpoint client for one OAuth2 configuration
#[derive(Clone)]
pub struct TokenExchanger {
    config: Arc<OAuth2ClientConfig>,
    client: Client,
    clock: Arc<dyn Clock>,
}

impl TokenExchanger {
    /// Create an exchanger with its own HTTP client and the system clock.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfiguration` if the HTTP client cannot be
    /// built.
    pub fn new(config: Arc<OAuth2ClientConfig>) -> Result<Self, AuthError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an exchanger that stamps records with `clock`.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfiguration` if the HTTP client cannot be
    /// built.
    pub fn with_clock(
        config: Arc<OAuth2ClientConfig>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(TOKEN_REQUEST_TIMEOUT).build().map_err(|err| {
            AuthError::InvalidConfiguration(format!("failed to build HTTP client: {err}"))
        })?;
        Ok(Self::with_client(config, client, clock))
    }

    /// Create an exchanger from an existing client and clock.
    #[must_use]
    pub fn with_client(
        config: Arc<OAuth2ClientConfig>,
        client: Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, client, clock }
    }

    fn form_params(&self, grant: &GrantRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![("grant_type", grant.grant_type().to_string())];

        match grant {
            GrantRequest::AuthorizationCode { code } => {
                params.push(("code", code.clone()));
                params.push(("redirect_uri", self.config.redirect_uri.clone()));
            }
            GrantRequest::RefreshToken { refresh_token } => {
                params.push(("refresh_token", refresh_token.clone()));
            }
        }

        params.push(("client_id", self.config.client_id.clone()));
        params.push(("client_secret", self.config.client_secret.clone()));
        params.push(("scope", self.config.scope_string()));
        params
    }

    /// Exchange a grant at the token endpoint.
    ///
    /// # Errors
    /// Returns `AuthError::TokenExchangeFailed` with the HTTP status and body
    /// when the endpoint answers non-2xx or without an access token, and with
    /// a transport description when no response arrives.
    #[tracing::instrument(
        skip(self, grant),
        fields(grant_type = grant.grant_type(), token_endpoint = %self.config.token_endpoint)
    )]
    pub async fn exchange(&self, grant: GrantRequest) -> Result<TokenRecord, AuthError> {
        let params = self.form_params(&grant);

        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "token endpoint unreachable");
                AuthError::TokenExchangeFailed { status: None, body: err.to_string() }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| AuthError::TokenExchangeFailed {
            status: Some(status.as_u16()),
            body: format!("failed to read response body: {err}"),
        })?;

        if !status.is_success() {
            warn!(%status, "token endpoint rejected the grant");
            return Err(AuthError::TokenExchangeFailed { status: Some(status.as_u16()), body });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            AuthError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: format!("invalid token response ({err}): {body}"),
            }
        })?;

        if parsed.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(AuthError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body: "token response did not contain an access_token".to_string(),
            });
        }

        let record = TokenRecord::from_response(parsed, self.clock.millis_since_epoch());
        debug!(
            expires_in_secs = ?record.expires_in_secs,
            has_refresh_token = record.refresh_token.is_some(),
            "token exchange succeeded"
        );
        Ok(record)
    }
}

#[async_trait]
impl TokenExchange for TokenExchanger {
    async fn exchange(&self, grant: GrantRequest) -> Result<TokenRecord, AuthError> {
        Self::exchange(self, grant).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::exchanger.
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::time::MockClock;

    fn exchanger_for(server: &MockServer, clock: MockClock) -> TokenExchanger {
        let config = OAuth2ClientConfig::new(
            "c1",
            "s3cret",
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
            "http://localhost:1880/oauth2/callback",
            "read write",
        );
        TokenExchanger::with_client(Arc::new(config), Client::new(), Arc::new(clock))
    }

    /// Validates the authorization code grant request and response mapping.
    ///
    /// Assertions:
    /// - The form body carries every authorization_code parameter.
    /// - The record holds the returned tokens and the clock's time.
    #[tokio::test]
    async fn test_authorization_code_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A1880%2Foauth2%2Fcallback",
            ))
            .and(body_string_contains("client_id=c1"))
            .and(body_string_contains("client_secret=s3cret"))
            .and(body_string_contains("scope=read+write"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A",
                "refresh_token": "R",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let exchanger = exchanger_for(&server, MockClock::at_millis(42_000));
        let record = exchanger
            .exchange(GrantRequest::AuthorizationCode { code: "abc".into() })
            .await
            .unwrap();

        assert_eq!(record.access_token.as_deref(), Some("A"));
        assert_eq!(record.refresh_token.as_deref(), Some("R"));
        assert_eq!(record.expires_in_secs, Some(3600));
        assert_eq!(record.obtained_at_millis, Some(42_000));
    }

    /// Validates the refresh grant omits code and redirect URI.
    ///
    /// Assertions:
    /// - The body carries `grant_type=refresh_token` and the refresh token.
    /// - The body does not carry `redirect_uri`.
    #[tokio::test]
    async fn test_refresh_exchange_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=R"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "B", "expires_in": 60})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let exchanger = exchanger_for(&server, MockClock::at_millis(0));
        let record = exchanger
            .exchange(GrantRequest::RefreshToken { refresh_token: "R".into() })
            .await
            .unwrap();
        assert_eq!(record.access_token.as_deref(), Some("B"));

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(!body.contains("redirect_uri"));
        assert!(!body.contains("code="));
    }

    #[tokio::test]
    async fn test_non_success_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let err = exchanger_for(&server, MockClock::new())
            .exchange(GrantRequest::RefreshToken { refresh_token: "stale".into() })
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::TokenExchangeFailed {
            status: Some(400),
            body: r#"{"error":"invalid_grant"}"#.into()
        });
    }

    #[tokio::test]
    async fn test_success_without_access_token_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = exchanger_for(&server, MockClock::new())
            .exchange(GrantRequest::AuthorizationCode { code: "abc".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailed { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = OAuth2ClientConfig::new(
            "c1",
            "s3cret",
            "https://idp/auth",
            format!("http://{addr}/token"),
            "http://localhost:1880/cb",
            "",
        );
        let exchanger = TokenExchanger::new(Arc::new(config)).unwrap();
        let err = exchanger
            .exchange(GrantRequest::AuthorizationCode { code: "abc".into() })
            .await
            .unwrap_err();

        match err {
            AuthError::TokenExchangeFailed { status, body } => {
                assert_eq!(status, None);
                assert!(!body.contains("s3cret"));
            }
            other => panic!("expected exchange failure, got {other:?}"),
        }
    }
}
