//! Traits for token exchange and browser launch
//!
//! These traits abstract the two external side effects of the token
//! lifecycle (the token endpoint and the user's browser) so the lifecycle
//! manager can be driven by mocks in tests.

use async_trait::async_trait;

use super::error::AuthError;
use super::types::{GrantRequest, TokenRecord};

/// Trait for token endpoint operations
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange an authorization code or refresh token for a new record
    ///
    /// The returned record is stamped with the time the response arrived.
    ///
    /// # Errors
    /// Returns `AuthError::TokenExchangeFailed` on non-2xx responses,
    /// malformed bodies or transport failures.
    async fn exchange(&self, grant: GrantRequest) -> Result<TokenRecord, AuthError>;
}

/// Trait for opening the authorization URL
pub trait BrowserLauncher: Send + Sync {
    /// Open `url` in the user's browser.
    ///
    /// # Errors
    /// Returns the launcher's I/O error when no browser could be started.
    fn open(&self, url: &str) -> std::io::Result<()>;
}
