//! OAuth 2.0 authorization-code token lifecycle
//!
//! Keeps one valid access token per client configuration, renewing it with a
//! refresh grant or, failing that, a browser-driven authorization flow whose
//! redirect is received on a loopback listener or a host-provided route.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐
//! │ TokenLifecycleManager │  cache -> refresh -> browser authorization
//! └──────────┬────────────┘
//!            │
//!            ├──► TokenStore                 (atomic-replace record)
//!            ├──► TokenExchange              (token endpoint grants)
//!            ├──► AuthorizationFlowLauncher  (authorization URL + browser)
//!            ├──► CompletionCell             (one outcome, many waiters)
//!            │
//!            └──► callback route / CallbackServer (redirect receiver)
//! ```
//!
//! # Callback Hosting
//!
//! - [`CallbackMode::Standalone`]: a listener is bound to the redirect URI's
//!   host and port when a flow starts and stopped once it completes.
//! - [`CallbackMode::Hosted`]: the embedding host mounts
//!   [`TokenLifecycleManager::callback_router`] on its own server.
//!
//! # Security
//!
//! The client secret and tokens never reach the logs: `Debug` output of
//! configuration, records and grants is redacted.

pub mod callback;
pub mod error;
pub mod exchanger;
pub mod launcher;
pub mod lifecycle;
pub mod notify;
pub mod store;
pub mod traits;
pub mod types;

pub use callback::{CallbackReply, CallbackServer};
pub use error::AuthError;
pub use exchanger::TokenExchanger;
pub use launcher::{authorization_url, AuthorizationFlowLauncher, NoBrowser, SystemBrowser};
pub use lifecycle::{TokenLifecycleManager, TokenLifecycleManagerBuilder};
pub use notify::{AuthOutcome, CompletionCell, CompletionWaiter};
pub use store::TokenStore;
pub use traits::{BrowserLauncher, TokenExchange};
pub use types::{
    parse_scopes, AuthorizationCallback, CallbackMode, GrantRequest, OAuth2ClientConfig,
    ProviderError, RedirectTarget, TokenRecord, TokenResponse, SAFETY_MARGIN_SECS,
};
