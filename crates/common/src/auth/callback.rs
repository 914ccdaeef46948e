//! Authorization redirect receiver
//!
//! One handler serves both hosting strategies: hosts merge
//! [`TokenLifecycleManager::callback_router`] into their own router, while
//! standalone mode binds a [`CallbackServer`] to the redirect URI's port for
//! the lifetime of a flow.
//!
//! Responses:
//! - `200` code exchanged and stored, waiters released with the token
//! - `400` provider error or missing code, waiters released with the failure
//! - `409` no authorization in progress (or already claimed), store untouched
//! - `500` code exchange failed, waiters released with the failure, or the
//!   flow was reset or timed out while the code was exchanged

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::AuthError;
use super::lifecycle::{TokenLifecycleManager, WeakManager};
use super::types::{AuthorizationCallback, GrantRequest};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// HTTP reply produced for one redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    pub status: StatusCode,
    pub page: String,
}

impl CallbackReply {
    fn success() -> Self {
        Self {
            status: StatusCode::OK,
            page: render_page(
                "Authorization successful",
                "You can close this window and return to your flow.",
            ),
        }
    }

    fn rejected(err: &AuthError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            page: render_page("Authorization failed", &err.to_string()),
        }
    }

    fn not_pending() -> Self {
        Self {
            status: StatusCode::CONFLICT,
            page: render_page(
                "No authorization in progress",
                "This sign-in link has already been used or was not requested. Start the flow again if you still need access.",
            ),
        }
    }

    fn exchange_failed(err: &AuthError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            page: render_page("Token exchange failed", &err.to_string()),
        }
    }

    fn manager_gone() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            page: render_page("Authorization unavailable", "The token manager has shut down."),
        }
    }
}

impl IntoResponse for CallbackReply {
    fn into_response(self) -> Response {
        (self.status, Html(self.page)).into_response()
    }
}

fn render_page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family: sans-serif; margin: 3em;\"><h1>{title}</h1><p>{}</p></body></html>",
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl TokenLifecycleManager {
    /// Process one authorization redirect.
    ///
    /// Failures of the pending flow are signalled before this returns, so
    /// waiters observe them no later than the browser sees the reply.
    #[tracing::instrument(skip(self, query), fields(client_id = %self.config().client_id))]
    pub async fn handle_callback(&self, query: HashMap<String, String>) -> CallbackReply {
        let pending = self.current_pending();

        let callback = match AuthorizationCallback::from_query(query) {
            Ok(callback) => callback,
            Err(err) => {
                warn!(error = %err, "authorization callback rejected");
                if let Some(pending) = pending.filter(|pending| pending.try_claim()) {
                    self.complete(&pending, Err(err.clone()));
                }
                return CallbackReply::rejected(&err);
            }
        };

        let Some(pending) = pending.filter(|pending| pending.try_claim()) else {
            warn!("authorization callback arrived with no flow awaiting it; ignored");
            return CallbackReply::not_pending();
        };

        let exchanged = self
            .token_exchange()
            .exchange(GrantRequest::AuthorizationCode { code: callback.code })
            .await
            .and_then(|record| {
                let token = record.access_token.clone().ok_or_else(|| {
                    AuthError::TokenExchangeFailed {
                        status: None,
                        body: "token response did not contain an access_token".to_string(),
                    }
                })?;
                Ok((record, token))
            });

        match exchanged {
            Ok((record, token)) => {
                let store = self.store();
                if self.complete_with(&pending, Ok(token), || store.write(record)) {
                    info!(flow = pending.id(), "authorization completed");
                    CallbackReply::success()
                } else {
                    warn!(flow = pending.id(), "authorization ended during code exchange; token discarded");
                    CallbackReply::exchange_failed(&AuthError::AuthUnavailable(
                        "authorization was cancelled before the token arrived".to_string(),
                    ))
                }
            }
            Err(err) => {
                error!(flow = pending.id(), error = %err, "authorization code exchange failed");
                self.complete(&pending, Err(err.clone()));
                CallbackReply::exchange_failed(&err)
            }
        }
    }
}

async fn receive_redirect(
    State(manager): State<WeakManager>,
    Query(query): Query<HashMap<String, String>>,
) -> CallbackReply {
    match manager.upgrade() {
        Some(manager) => manager.handle_callback(query).await,
        None => CallbackReply::manager_gone(),
    }
}

/// Router serving the redirect route at `path`.
pub(crate) fn router(path: &str, manager: WeakManager) -> Router {
    Router::new().route(path, get(receive_redirect)).with_state(manager)
}

/// Loopback HTTP server that receives authorization redirects
pub struct CallbackServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind `address` and serve `app` until shut down.
    ///
    /// # Errors
    /// Returns `AuthError::CallbackServer` if the address cannot be bound.
    pub async fn start(address: &str, app: Router) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(address).await.map_err(|err| {
            AuthError::CallbackServer(format!("failed to bind callback listener on {address}: {err}"))
        })?;

        let local_addr = listener.local_addr().map_err(|err| {
            AuthError::CallbackServer(format!("failed to determine callback address: {err}"))
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("OAuth callback server error: {}", err);
            }
        });

        info!(%local_addr, "callback listener started");
        Ok(Self { local_addr, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the serving task is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting connections and wait for in-flight replies.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(local_addr = %self.local_addr, "callback listener did not drain in time; aborting");
                handle.abort();
            }
        }
        info!(local_addr = %self.local_addr, "callback listener stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
