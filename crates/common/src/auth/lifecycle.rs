//! Token lifecycle manager
//!
//! Hands out a valid access token for one OAuth2 client configuration,
//! escalating from the cached token to a refresh grant to a browser-driven
//! authorization-code flow:
//!
//! 1. A usable cached token is returned without suspending.
//! 2. Otherwise the caller takes the refresh gate, re-checks the store, and
//!    either joins an authorization already in progress or tries the refresh
//!    token.
//! 3. If refresh is impossible or fails, one authorization flow is started and
//!    every concurrent caller waits on its outcome.
//!
//! ```no_run
//! use lakeflow_common::auth::{OAuth2ClientConfig, TokenLifecycleManager};
//!
//! # async fn demo() -> Result<(), lakeflow_common::auth::AuthError> {
//! let config = OAuth2ClientConfig::new(
//!     "client",
//!     "secret",
//!     "https://login.example.com/authorize",
//!     "https://login.example.com/token",
//!     "http://localhost:1880/oauth2/callback",
//!     "https://storage.azure.com/user_impersonation offline_access",
//! );
//! let manager = TokenLifecycleManager::builder(config).build()?;
//! let token = manager.get_valid_token().await?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::callback::{self, CallbackServer};
use super::error::AuthError;
use super::exchanger::TokenExchanger;
use super::launcher::{AuthorizationFlowLauncher, SystemBrowser};
use super::notify::{AuthOutcome, CompletionCell, CompletionWaiter};
use super::store::TokenStore;
use super::traits::{BrowserLauncher, TokenExchange};
use super::types::{CallbackMode, GrantRequest, OAuth2ClientConfig, TokenRecord};
use crate::time::{Clock, SystemClock};

/// The single authorization flow currently awaiting its redirect
pub(super) struct PendingAuthorization {
    id: u64,
    cell: CompletionCell,
    claimed: AtomicBool,
}

impl PendingAuthorization {
    fn new(id: u64) -> Self {
        Self { id, cell: CompletionCell::new(), claimed: AtomicBool::new(false) }
    }

    pub(super) const fn id(&self) -> u64 {
        self.id
    }

    /// Take exclusive ownership of resolving this flow.
    pub(super) fn try_claim(&self) -> bool {
        self.claimed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }
}

struct Shared {
    config: Arc<OAuth2ClientConfig>,
    store: TokenStore,
    exchange: Arc<dyn TokenExchange>,
    launcher: AuthorizationFlowLauncher,
    clock: Arc<dyn Clock>,
    mode: CallbackMode,
    authorization_timeout: Option<Duration>,
    refresh_gate: tokio::sync::Mutex<()>,
    pending: parking_lot::Mutex<Option<Arc<PendingAuthorization>>>,
    next_flow_id: AtomicU64,
    standalone: tokio::sync::Mutex<Option<CallbackServer>>,
}

/// Shared handle to the token state of one OAuth2 configuration
///
/// Cloning is cheap; all clones share the store, the refresh gate and the
/// pending authorization.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    shared: Arc<Shared>,
}

/// Non-owning handle held by callback routes
#[derive(Clone)]
pub(crate) struct WeakManager {
    shared: Weak<Shared>,
}

impl WeakManager {
    pub(crate) fn upgrade(&self) -> Option<TokenLifecycleManager> {
        self.shared.upgrade().map(|shared| TokenLifecycleManager { shared })
    }
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("config", &self.shared.config)
            .field("mode", &self.shared.mode)
            .field("authorizing", &self.is_authorizing())
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    /// Start building a manager for `config`.
    #[must_use]
    pub fn builder(config: OAuth2ClientConfig) -> TokenLifecycleManagerBuilder {
        TokenLifecycleManagerBuilder::new(config)
    }

    /// Return an access token that stays valid for at least the safety
    /// margin, obtaining a new one if necessary.
    ///
    /// # Errors
    /// Returns `AuthError::AuthUnavailable` when neither the cache, a refresh
    /// grant nor browser authorization produced a token.
    #[tracing::instrument(skip(self), fields(client_id = %self.shared.config.client_id))]
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let waiter = {
            let _gate = self.shared.refresh_gate.lock().await;

            if let Some(token) = self.cached_token() {
                debug!("token renewed by a concurrent caller");
                return Ok(token);
            }

            if let Some(pending) = self.current_pending() {
                debug!(flow = pending.id, "joining authorization already in progress");
                pending.cell.subscribe()
            } else {
                if let Some(token) = self.try_refresh().await {
                    return Ok(token);
                }
                self.begin_authorization().await
            }
        };

        waiter.wait().await.map_err(|err| AuthError::unavailable(&err))
    }

    /// Current token record.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TokenRecord> {
        self.shared.store.read()
    }

    /// Whether the cached access token is usable right now.
    #[must_use]
    pub fn has_usable_token(&self) -> bool {
        self.cached_token().is_some()
    }

    /// Whether an authorization flow is awaiting its redirect.
    #[must_use]
    pub fn is_authorizing(&self) -> bool {
        self.shared.pending.lock().is_some()
    }

    #[must_use]
    pub fn config(&self) -> &OAuth2ClientConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn callback_mode(&self) -> CallbackMode {
        self.shared.mode
    }

    /// Forget all tokens. A pending authorization fails its waiters.
    pub fn reset(&self) {
        self.shared.store.clear();
        if let Some(pending) = self.current_pending() {
            self.complete(
                &pending,
                Err(AuthError::AuthUnavailable("token state was reset".to_string())),
            );
        }
        info!(client_id = %self.shared.config.client_id, "token state reset");
    }

    /// Called by consumers when they have finished with a token. In
    /// standalone mode an idle callback listener is stopped.
    pub fn request_completed(&self) {
        if self.shared.mode == CallbackMode::Standalone && !self.is_authorizing() {
            self.spawn_idle_shutdown();
        }
    }

    /// Route that receives authorization redirects, for hosts that serve
    /// their own HTTP endpoint.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfiguration` if the redirect URI cannot be
    /// parsed.
    pub fn callback_router(&self) -> Result<axum::Router, AuthError> {
        let target = self.shared.config.redirect_target()?;
        Ok(callback::router(&target.path, self.downgrade()))
    }

    /// Address of the standalone callback listener, while one is running.
    pub async fn callback_server_addr(&self) -> Option<SocketAddr> {
        self.shared
            .standalone
            .lock()
            .await
            .as_ref()
            .filter(|server| server.is_running())
            .map(CallbackServer::local_addr)
    }

    /// Fail any pending authorization and stop the callback listener.
    pub async fn shutdown(&self) {
        if let Some(pending) = self.current_pending() {
            self.complete(
                &pending,
                Err(AuthError::AuthUnavailable("token manager shut down".to_string())),
            );
        }
        if let Some(server) = self.shared.standalone.lock().await.take() {
            server.shutdown().await;
        }
    }

    pub(crate) fn downgrade(&self) -> WeakManager {
        WeakManager { shared: Arc::downgrade(&self.shared) }
    }

    pub(super) fn store(&self) -> &TokenStore {
        &self.shared.store
    }

    pub(super) fn token_exchange(&self) -> &dyn TokenExchange {
        self.shared.exchange.as_ref()
    }

    pub(super) fn current_pending(&self) -> Option<Arc<PendingAuthorization>> {
        self.shared.pending.lock().clone()
    }

    /// Resolve `pending` and clear it if it is still the current flow.
    /// Returns `false` if it had already been resolved.
    pub(super) fn complete(&self, pending: &Arc<PendingAuthorization>, outcome: AuthOutcome) -> bool {
        self.complete_with(pending, outcome, || {})
    }

    /// Like [`Self::complete`], running `commit` only if this resolution wins.
    pub(super) fn complete_with(
        &self,
        pending: &Arc<PendingAuthorization>,
        outcome: AuthOutcome,
        commit: impl FnOnce(),
    ) -> bool {
        {
            let mut slot = self.shared.pending.lock();
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, pending)) {
                *slot = None;
            }
        }

        let resolved = pending.cell.resolve_with(outcome, commit);
        if resolved && self.shared.mode == CallbackMode::Standalone {
            self.spawn_idle_shutdown();
        }
        resolved
    }

    fn cached_token(&self) -> Option<String> {
        let now = self.shared.clock.millis_since_epoch();
        self.shared.store.read().usable_token(now).map(str::to_string)
    }

    async fn try_refresh(&self) -> Option<String> {
        let refresh_token = self.shared.store.read().refresh_token.clone()?;

        match self
            .shared
            .exchange
            .exchange(GrantRequest::RefreshToken { refresh_token: refresh_token.clone() })
            .await
        {
            Ok(record) => {
                let record = record.or_refresh_token(Some(refresh_token));
                let Some(token) = record.access_token.clone() else {
                    warn!("refresh response carried no access token");
                    return None;
                };
                self.shared.store.write(record);
                info!("access token refreshed");
                Some(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; falling back to browser authorization");
                None
            }
        }
    }

    /// Register a new pending flow, make sure the redirect can be received,
    /// and send the user to the provider. Runs under the refresh gate.
    async fn begin_authorization(&self) -> CompletionWaiter {
        let id = self.shared.next_flow_id.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = Arc::new(PendingAuthorization::new(id));
        let waiter = pending.cell.subscribe();
        *self.shared.pending.lock() = Some(Arc::clone(&pending));
        info!(flow = id, mode = ?self.shared.mode, "starting browser authorization");

        if self.shared.mode == CallbackMode::Standalone {
            if let Err(err) = self.ensure_callback_server().await {
                error!(flow = id, error = %err, "callback listener unavailable");
                self.complete(&pending, Err(err));
                return waiter;
            }
        }

        self.shared.launcher.launch(&self.shared.config);

        if let Some(timeout) = self.shared.authorization_timeout {
            self.arm_timeout(&pending, timeout);
        }
        waiter
    }

    async fn ensure_callback_server(&self) -> Result<(), AuthError> {
        let mut slot = self.shared.standalone.lock().await;
        if slot.as_ref().is_some_and(CallbackServer::is_running) {
            return Ok(());
        }

        let target = self.shared.config.redirect_target()?;
        let app = callback::router(&target.path, self.downgrade());
        *slot = Some(CallbackServer::start(&target.bind_address(), app).await?);
        Ok(())
    }

    fn arm_timeout(&self, pending: &Arc<PendingAuthorization>, timeout: Duration) {
        let manager = self.downgrade();
        let pending = Arc::clone(pending);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if pending.try_claim() {
                warn!(flow = pending.id, timeout_secs = timeout.as_secs(), "authorization timed out");
                manager.complete(
                    &pending,
                    Err(AuthError::AuthorizationCallback(format!(
                        "no authorization callback received within {}s",
                        timeout.as_secs()
                    ))),
                );
            }
        });
    }

    /// Stop the standalone listener in the background once no flow needs it.
    fn spawn_idle_shutdown(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let manager = self.clone();
        runtime.spawn(async move {
            let mut slot = manager.shared.standalone.lock().await;
            if manager.is_authorizing() {
                return;
            }
            if let Some(server) = slot.take() {
                server.shutdown().await;
            }
        });
    }
}

/// Builder for [`TokenLifecycleManager`]
pub struct TokenLifecycleManagerBuilder {
    config: OAuth2ClientConfig,
    exchange: Option<Arc<dyn TokenExchange>>,
    browser: Option<Arc<dyn BrowserLauncher>>,
    clock: Option<Arc<dyn Clock>>,
    mode: CallbackMode,
    authorization_timeout: Option<Duration>,
    initial_record: Option<TokenRecord>,
}

impl TokenLifecycleManagerBuilder {
    fn new(config: OAuth2ClientConfig) -> Self {
        Self {
            config,
            exchange: None,
            browser: None,
            clock: None,
            mode: CallbackMode::default(),
            authorization_timeout: None,
            initial_record: None,
        }
    }

    /// Token endpoint client. Defaults to a [`TokenExchanger`].
    #[must_use]
    pub fn exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Browser used to open the authorization URL. Defaults to the system
    /// browser.
    #[must_use]
    pub fn browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = Some(browser);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub const fn callback_mode(mut self, mode: CallbackMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fail a pending authorization that receives no redirect in time.
    /// Unset means wait indefinitely.
    #[must_use]
    pub const fn authorization_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    /// Seed the store, e.g. with a record persisted by the host.
    #[must_use]
    pub fn initial_record(mut self, record: TokenRecord) -> Self {
        self.initial_record = Some(record);
        self
    }

    /// Validate the configuration and build the manager.
    ///
    /// # Errors
    /// Returns `AuthError::InvalidConfiguration` for empty identifiers or
    /// endpoints, or a redirect URI without host and port.
    pub fn build(self) -> Result<TokenLifecycleManager, AuthError> {
        let required = [
            ("client_id", &self.config.client_id),
            ("authorization endpoint", &self.config.authorization_endpoint),
            ("token endpoint", &self.config.token_endpoint),
            ("redirect URI", &self.config.redirect_uri),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AuthError::InvalidConfiguration(format!("{name} must not be empty")));
        }
        self.config.redirect_target()?;

        let config = Arc::new(self.config);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let exchange = match self.exchange {
            Some(exchange) => exchange,
            None => Arc::new(TokenExchanger::with_clock(Arc::clone(&config), Arc::clone(&clock))?),
        };
        let browser = self.browser.unwrap_or_else(|| Arc::new(SystemBrowser));

        Ok(TokenLifecycleManager {
            shared: Arc::new(Shared {
                config,
                store: self.initial_record.map_or_else(TokenStore::new, TokenStore::with_record),
                exchange,
                launcher: AuthorizationFlowLauncher::new(browser),
                clock,
                mode: self.mode,
                authorization_timeout: self.authorization_timeout,
                refresh_gate: tokio::sync::Mutex::new(()),
                pending: parking_lot::Mutex::new(None),
                next_flow_id: AtomicU64::new(0),
                standalone: tokio::sync::Mutex::new(None),
            }),
        })
    }
}
