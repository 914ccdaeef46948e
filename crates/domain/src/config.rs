//! Configuration structures
//!
//! The configuration mirrors what a flow editor would store per node: one
//! OAuth2 client block shared by every action node, plus per-node defaults
//! that individual flow messages may override.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_UPLOAD_CHUNK_BYTES,
};
use crate::impl_keyword_conversions;
use crate::types::{AutomationParams, FileParams, LeaseParams, TableParams};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth2 client credentials. Action nodes refuse to run without it.
    pub oauth2: Option<OAuth2Settings>,
    pub auth: AuthSettings,
    pub http: HttpSettings,
    pub server: ServerSettings,
    pub nodes: NodeSettings,
}

/// OAuth2 authorization-code client settings as entered by the user
///
/// Field names follow the flow editor (`auth_url`, `token_url`), and scopes
/// are a single space-separated string.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Settings {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl fmt::Debug for OAuth2Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Settings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Where the authorization redirect is received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackMode {
    /// The embedding host serves the callback route on its own HTTP server.
    Hosted,
    /// A dedicated listener is bound to the redirect URI's port on demand.
    #[default]
    Standalone,
}

impl_keyword_conversions!(CallbackMode {
    Hosted => "hosted",
    Standalone => "standalone",
});

/// Token lifecycle behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub callback_mode: CallbackMode,
    /// Give up on a launched browser flow after this many seconds. Unset
    /// means wait for the callback indefinitely.
    pub authorization_timeout_secs: Option<u64>,
    /// Open the authorization URL in the default browser. When disabled the
    /// URL is only logged.
    pub open_browser: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            callback_mode: CallbackMode::default(),
            authorization_timeout_secs: None,
            open_browser: true,
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    /// Slice size for chunked append uploads.
    pub upload_chunk_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: None,
            upload_chunk_bytes: DEFAULT_UPLOAD_CHUNK_BYTES,
        }
    }
}

/// Host server settings used by hosted callback mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: DEFAULT_BIND_ADDRESS.to_string() }
    }
}

/// Per-node defaults, overridden field by field by message payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub lease: LeaseParams,
    pub files: FileParams,
    pub tables: TableParams,
    pub automation: AutomationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert!(config.oauth2.is_none());
        assert_eq!(config.auth.callback_mode, CallbackMode::Standalone);
        assert!(config.auth.open_browser);
        assert_eq!(config.auth.authorization_timeout_secs, None);
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.server.bind, "127.0.0.1:1880");
    }

    #[test]
    fn parses_toml_with_oauth_and_node_defaults() {
        let raw = r#"
            [oauth2]
            client_id = "c1"
            client_secret = "s3cret"
            auth_url = "https://idp/auth"
            token_url = "https://idp/token"
            redirect_uri = "http://localhost:1880/oauth2/callback"
            scopes = "read write"

            [auth]
            callback_mode = "hosted"
            authorization_timeout_secs = 120

            [nodes.lease]
            url = "https://acct.dfs.core.windows.net/fs/file.txt"
            leaseduration = 60
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        let oauth = config.oauth2.unwrap();
        assert_eq!(oauth.client_id, "c1");
        assert_eq!(oauth.scopes, "read write");
        assert_eq!(config.auth.callback_mode, CallbackMode::Hosted);
        assert_eq!(config.auth.authorization_timeout_secs, Some(120));
        assert_eq!(config.nodes.lease.lease_duration, Some(60));
    }

    #[test]
    fn debug_output_redacts_client_secret() {
        let settings = OAuth2Settings {
            client_secret: "very-secret".into(),
            ..OAuth2Settings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn callback_mode_parses_case_insensitively() {
        assert_eq!("Hosted".parse::<CallbackMode>().unwrap(), CallbackMode::Hosted);
        assert_eq!(CallbackMode::Standalone.to_string(), "standalone");
    }
}
