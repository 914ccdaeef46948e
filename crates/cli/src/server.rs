//! Host HTTP server
//!
//! Serves the action nodes at `POST /nodes/{kind}` and, in hosted callback
//! mode, the OAuth2 redirect route on the same listener.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lakeflow_common::auth::{CallbackMode, TokenLifecycleManager};
use lakeflow_domain::FlowMessage;
use lakeflow_infra::{NodeKind, Nodes};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Routes for the host server.
///
/// The callback route is merged only when `manager` hosts its callback here;
/// in standalone mode each authorization binds its own listener.
pub fn router(manager: Option<&TokenLifecycleManager>, nodes: Option<Arc<Nodes>>) -> Result<Router> {
    let mut app = Router::new().route("/health", get(health));

    if let Some(nodes) = nodes {
        app = app.merge(Router::new().route("/nodes/{kind}", post(run_node)).with_state(nodes));
    }

    if let Some(manager) = manager.filter(|m| m.callback_mode() == CallbackMode::Hosted) {
        app = app.merge(manager.callback_router()?);
    }

    Ok(app)
}

async fn health() -> &'static str {
    "ok"
}

async fn run_node(
    State(nodes): State<Arc<Nodes>>,
    Path(kind): Path<String>,
    Json(msg): Json<FlowMessage>,
) -> Response {
    let kind = match kind.parse::<NodeKind>() {
        Ok(kind) => kind,
        Err(message) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response();
        }
    };

    let fallback = msg.clone();
    match nodes.execute(kind, msg).await {
        Ok(out) => Json(out).into_response(),
        Err(err) => {
            error!(node = %kind, error = %err, "action failed");
            (StatusCode::BAD_GATEWAY, Json(err.into_message(fallback))).into_response()
        }
    }
}

/// Running host server
pub struct HostServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl HostServer {
    pub async fn start(bind: &str, app: Router) -> Result<Self> {
        let listener =
            TcpListener::bind(bind).await.with_context(|| format!("failed to bind {bind}"))?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        info!(%addr, "host server listening");
        Ok(Self { addr, shutdown: Some(tx), task })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run until `signal` resolves, then stop.
    pub async fn run_until(self, signal: impl Future<Output = ()>) {
        signal.await;
        self.stop().await;
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await {
            Ok(Ok(Ok(()))) => info!(addr = %self.addr, "host server stopped"),
            Ok(Ok(Err(err))) => error!(error = %err, "host server failed"),
            Ok(Err(err)) => error!(error = %err, "host server task panicked"),
            Err(_) => {
                warn!("host server did not stop in time; aborting");
                self.task.abort();
            }
        }
    }
}

impl Drop for HostServer {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}
