//! Error type for the OAuth2 token lifecycle

use thiserror::Error;

/// Failures raised while obtaining or refreshing an access token
///
/// Cloneable so one outcome can be handed to every waiter of a shared
/// authorization flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No OAuth2 configuration is attached to the requesting node.
    #[error("Missing OAuth2 configuration")]
    MissingConfiguration,

    /// The redirect carried no code, or the provider reported an error.
    #[error("Authorization callback error: {0}")]
    AuthorizationCallback(String),

    /// Token endpoint answered non-2xx, answered garbage, or was unreachable.
    #[error("Token exchange failed ({}): {body}", status_label(.status))]
    TokenExchangeFailed { status: Option<u16>, body: String },

    /// No token could be obtained by any path.
    #[error("Authorization unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Invalid OAuth2 configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Callback server error: {0}")]
    CallbackServer(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |code| format!("status {code}"))
}

impl AuthError {
    /// Wrap a flow failure as the error `get_valid_token` reports.
    #[must_use]
    pub fn unavailable(cause: &Self) -> Self {
        match cause {
            Self::AuthUnavailable(_) => cause.clone(),
            other => Self::AuthUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_failure_renders_status_or_transport() {
        let http = AuthError::TokenExchangeFailed {
            status: Some(400),
            body: r#"{"error":"invalid_grant"}"#.into(),
        };
        assert_eq!(http.to_string(), r#"Token exchange failed (status 400): {"error":"invalid_grant"}"#);

        let transport =
            AuthError::TokenExchangeFailed { status: None, body: "connection refused".into() };
        assert_eq!(transport.to_string(), "Token exchange failed (no response): connection refused");
    }

    #[test]
    fn unavailable_wraps_once() {
        let cause = AuthError::AuthorizationCallback("authorization code not found".into());
        let wrapped = AuthError::unavailable(&cause);
        assert_eq!(
            wrapped.to_string(),
            "Authorization unavailable: Authorization callback error: authorization code not found"
        );
        assert_eq!(AuthError::unavailable(&wrapped), wrapped);
    }
}
