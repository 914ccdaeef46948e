//! OAuth2 section to token lifecycle manager

use std::sync::Arc;
use std::time::Duration;

use lakeflow_common::auth::{self, NoBrowser, OAuth2ClientConfig, TokenLifecycleManager};
use lakeflow_domain::{CallbackMode, Config, LakeflowError, OAuth2Settings, Result};

use crate::errors::InfraError;

/// Validate the OAuth2 section and build the client configuration.
///
/// # Errors
/// Returns `LakeflowError::Config` naming the first empty required field.
pub fn client_config(settings: &OAuth2Settings) -> Result<OAuth2ClientConfig> {
    let required = [
        ("client_id", &settings.client_id),
        ("client_secret", &settings.client_secret),
        ("auth_url", &settings.auth_url),
        ("token_url", &settings.token_url),
        ("redirect_uri", &settings.redirect_uri),
    ];
    if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(LakeflowError::Config(format!("oauth2.{name} is required")));
    }

    Ok(OAuth2ClientConfig::new(
        settings.client_id.trim(),
        settings.client_secret.as_str(),
        settings.auth_url.trim(),
        settings.token_url.trim(),
        settings.redirect_uri.trim(),
        &settings.scopes,
    ))
}

#[must_use]
pub const fn callback_mode(mode: CallbackMode) -> auth::CallbackMode {
    match mode {
        CallbackMode::Hosted => auth::CallbackMode::Hosted,
        CallbackMode::Standalone => auth::CallbackMode::Standalone,
    }
}

/// Build the token lifecycle manager described by `config`.
///
/// Returns `Ok(None)` when no OAuth2 section is configured; action nodes then
/// refuse to run.
///
/// # Errors
/// Returns `LakeflowError::Config` for an incomplete OAuth2 section or a
/// redirect URI the manager cannot listen on.
pub fn token_manager(config: &Config) -> Result<Option<TokenLifecycleManager>> {
    let Some(settings) = &config.oauth2 else {
        tracing::warn!("no OAuth2 configuration; action nodes will not run");
        return Ok(None);
    };

    let mut builder = TokenLifecycleManager::builder(client_config(settings)?)
        .callback_mode(callback_mode(config.auth.callback_mode))
        .authorization_timeout(config.auth.authorization_timeout_secs.map(Duration::from_secs));
    if !config.auth.open_browser {
        builder = builder.browser(Arc::new(NoBrowser));
    }

    let manager = builder.build().map_err(|err| LakeflowError::from(InfraError::from(err)))?;
    tracing::info!(mode = ?config.auth.callback_mode, "token lifecycle manager ready");
    Ok(Some(manager))
}
