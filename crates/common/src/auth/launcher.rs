//! Authorization flow launcher
//!
//! Builds the provider authorization URL and hands it to the user's browser.
//! Opening the browser is best effort: the URL is always logged so the user
//! can navigate manually when no browser starts.

use std::sync::Arc;

use tracing::{info, warn};

use super::traits::BrowserLauncher;
use super::types::OAuth2ClientConfig;

/// Build the authorization-code request URL.
///
/// ```
/// use lakeflow_common::auth::{authorization_url, OAuth2ClientConfig};
///
/// let config = OAuth2ClientConfig::new(
///     "c1",
///     "secret",
///     "https://idp/auth",
///     "https://idp/token",
///     "http://localhost:1880/oauth2/callback",
///     "read write",
/// );
/// assert_eq!(
///     authorization_url(&config),
///     "https://idp/auth?response_type=code&client_id=c1\
///      &redirect_uri=http%3A%2F%2Flocalhost%3A1880%2Foauth2%2Fcallback\
///      &scope=read%20write&response_mode=query"
/// );
/// ```
#[must_use]
pub fn authorization_url(config: &OAuth2ClientConfig) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&response_mode=query",
        config.authorization_endpoint,
        config.client_id,
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope_string()),
    )
}

/// Opens URLs with the platform's default browser
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        webbrowser::open(url)
    }
}

/// Browser launcher that only logs, for headless hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}

/// Starts the user-facing part of an authorization flow
#[derive(Clone)]
pub struct AuthorizationFlowLauncher {
    browser: Arc<dyn BrowserLauncher>,
}

impl AuthorizationFlowLauncher {
    #[must_use]
    pub fn new(browser: Arc<dyn BrowserLauncher>) -> Self {
        Self { browser }
    }

    /// Log the authorization URL and open it without waiting for the browser.
    pub fn launch(&self, config: &OAuth2ClientConfig) {
        let url = authorization_url(config);
        info!(url = %url, "authorization required; open this URL to sign in");

        let browser = Arc::clone(&self.browser);
        tokio::task::spawn_blocking(move || {
            if let Err(err) = browser.open(&url) {
                warn!(error = %err, "could not open a browser; navigate to the URL manually");
            }
        });
    }
}

impl Default for AuthorizationFlowLauncher {
    fn default() -> Self {
        Self::new(Arc::new(SystemBrowser))
    }
}
