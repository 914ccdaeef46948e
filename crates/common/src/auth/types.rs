//! OAuth 2.0 types and structures
//!
//! Token records, token endpoint responses, client configuration and the
//! parsed shape of an authorization redirect.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use super::error::AuthError;

/// Seconds before expiry at which a cached access token stops being handed
/// out. Fixed so a token never expires mid-flight of a slow downstream call.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// Cached token state for one OAuth2 client configuration
///
/// Every field is optional: an empty record means nothing has been obtained
/// yet. The record is always replaced whole, never patched.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in_secs: Option<i64>,
    pub obtained_at_millis: Option<i64>,
}

impl TokenRecord {
    /// Build a record from a successful token endpoint response.
    #[must_use]
    pub fn from_response(response: TokenResponse, obtained_at_millis: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in_secs: response.expires_in,
            obtained_at_millis: Some(obtained_at_millis),
        }
    }

    /// Keep `previous` as the refresh token when the provider did not rotate
    /// it.
    #[must_use]
    pub fn or_refresh_token(mut self, previous: Option<String>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous;
        }
        self
    }

    /// Access token, if it is still usable at `now_millis`.
    ///
    /// Usable means `now - obtained_at < expires_in - SAFETY_MARGIN_SECS`. A
    /// record missing its expiry or issuance time is never usable.
    #[must_use]
    pub fn usable_token(&self, now_millis: i64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let expires_in = self.expires_in_secs?;
        let obtained_at = self.obtained_at_millis?;

        let age_millis = now_millis.saturating_sub(obtained_at);
        let budget_millis = expires_in.saturating_sub(SAFETY_MARGIN_SECS).saturating_mul(1000);
        (age_millis < budget_millis).then_some(token)
    }

    /// Absolute expiry of the access token.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = self
            .obtained_at_millis?
            .checked_add(self.expires_in_secs?.checked_mul(1000)?)?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in_secs", &self.expires_in_secs)
            .field("obtained_at_millis", &self.obtained_at_millis)
            .finish()
    }
}

/// Token endpoint response body
///
/// `access_token` is required for success but decoded as optional so a
/// malformed 2xx body can be reported with its content.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "seconds_from_number_or_text")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

// Some identity providers send `expires_in` as a JSON string.
fn seconds_from_number_or_text<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(n)) => Ok(Some(n)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid expires_in '{text}'"))),
    }
}

/// Error object returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Grant presented to the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum GrantRequest {
    AuthorizationCode { code: String },
    RefreshToken { refresh_token: String },
}

impl GrantRequest {
    /// Value of the `grant_type` form field.
    #[must_use]
    pub const fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }
}

impl fmt::Debug for GrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantRequest({})", self.grant_type())
    }
}

/// Where the authorization redirect is received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallbackMode {
    /// The embedding host serves [`callback_router`](super::TokenLifecycleManager::callback_router).
    Hosted,
    /// An ephemeral listener is bound to the redirect URI's port per flow.
    #[default]
    Standalone,
}

/// OAuth2 authorization-code client configuration
///
/// Immutable once built. Scopes keep their first-seen order without
/// duplicates.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuth2ClientConfig {
    /// Create a configuration from a space-separated scope string.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: &str,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            redirect_uri: redirect_uri.into(),
            scopes: parse_scopes(scopes),
        }
    }

    /// Scopes joined by a single space.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Parse the redirect URI into the address and path the callback is
    /// served on.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfiguration` when the URI does not parse
    /// or has no host or port.
    pub fn redirect_target(&self) -> Result<RedirectTarget, AuthError> {
        let url = Url::parse(&self.redirect_uri).map_err(|err| {
            AuthError::InvalidConfiguration(format!(
                "redirect URI '{}' is not a valid URL: {err}",
                self.redirect_uri
            ))
        })?;

        let host = url.host_str().filter(|host| !host.is_empty()).ok_or_else(|| {
            AuthError::InvalidConfiguration(format!(
                "redirect URI '{}' has no host",
                self.redirect_uri
            ))
        })?;
        let port = url.port_or_known_default().ok_or_else(|| {
            AuthError::InvalidConfiguration(format!(
                "redirect URI '{}' has no port",
                self.redirect_uri
            ))
        })?;

        let path = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok(RedirectTarget { host: host.to_string(), port, path })
    }
}

impl fmt::Debug for OAuth2ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Split a space-separated scope list, dropping duplicates.
#[must_use]
pub fn parse_scopes(raw: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in raw.split_whitespace() {
        if !scopes.iter().any(|existing| existing == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}

/// Socket address and route derived from the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RedirectTarget {
    /// Address for the standalone listener. `localhost` binds the IPv4
    /// loopback.
    #[must_use]
    pub fn bind_address(&self) -> String {
        let host = match self.host.as_str() {
            "localhost" => "127.0.0.1",
            other => other.trim_start_matches('[').trim_end_matches(']'),
        };
        if host.contains(':') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Authorization redirect as received by the callback route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub raw_query: HashMap<String, String>,
}

impl AuthorizationCallback {
    /// Interpret the redirect query.
    ///
    /// # Errors
    /// Returns `AuthError::AuthorizationCallback` when the provider reported
    /// an error or no code is present.
    pub fn from_query(raw_query: HashMap<String, String>) -> Result<Self, AuthError> {
        if let Some(error) = raw_query.get("error") {
            let provider = ProviderError {
                error: error.clone(),
                error_description: raw_query.get("error_description").cloned(),
            };
            return Err(AuthError::AuthorizationCallback(format!(
                "identity provider returned an error: {provider}"
            )));
        }

        match raw_query.get("code").filter(|code| !code.is_empty()) {
            Some(code) => Ok(Self { code: code.clone(), raw_query }),
            None => Err(AuthError::AuthorizationCallback(
                "authorization code not found in callback".to_string(),
            )),
        }
    }
}
