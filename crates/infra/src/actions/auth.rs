//! Access token seam between action nodes and the token lifecycle

use async_trait::async_trait;
use lakeflow_common::auth::{AuthError, TokenLifecycleManager};

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Get a valid access token
    ///
    /// This method should handle token refresh if needed.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Signal that the requests made with the last token have finished.
    fn request_completed(&self) {}
}

#[async_trait]
impl AccessTokenProvider for TokenLifecycleManager {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.get_valid_token().await
    }

    fn request_completed(&self) {
        TokenLifecycleManager::request_completed(self);
    }
}
