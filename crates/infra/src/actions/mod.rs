//! Storage action executors
//!
//! Each node turns one [`FlowMessage`] into one outgoing message: parameters
//! come from the payload (falling back to the node's configured defaults), a
//! bearer token comes from an [`AccessTokenProvider`], and the REST result
//! replaces the payload.
//!
//! | Node | Operations |
//! |------|------------|
//! | `lease` | acquire, break, renew, release, change |
//! | `files` | create, delete, read, getproperties, list, update |
//! | `tables` | read, upload |
//! | `automation` | upload one local file |

mod auth;
mod automation;
mod context;
mod error;
mod files;
mod lease;
mod tables;
mod upload;

use std::sync::Arc;

use lakeflow_common::auth::AuthError;
use lakeflow_domain::{impl_keyword_conversions, Config, FlowMessage};
use tracing::error;

pub use self::auth::AccessTokenProvider;
pub use self::automation::AutomationExecutor;
pub use self::context::ActionContext;
pub use self::error::ActionError;
pub use self::files::FilesExecutor;
pub use self::lease::LeaseExecutor;
pub use self::tables::TablesExecutor;
use crate::http::HttpClient;

/// The action node types a host can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Lease,
    Files,
    Tables,
    Automation,
}

impl_keyword_conversions!(NodeKind {
    Lease => "lease",
    Files => "files",
    Tables => "tables",
    Automation => "automation",
});

/// All four executors sharing one HTTP client and token source
pub struct Nodes {
    lease: LeaseExecutor,
    files: FilesExecutor,
    tables: TablesExecutor,
    automation: AutomationExecutor,
}

impl Nodes {
    /// Build every executor from configuration.
    ///
    /// # Errors
    /// `Auth(MissingConfiguration)` when no token provider is available (no
    /// OAuth2 block configured), or a setup error if the HTTP client cannot
    /// be built.
    pub fn from_config(
        config: &Config,
        provider: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Result<Self, ActionError> {
        let provider = provider.ok_or(ActionError::Auth(AuthError::MissingConfiguration))?;
        let http = HttpClient::from_settings(&config.http)?;
        let ctx = ActionContext::new(http, provider, config.http.upload_chunk_bytes);

        let defaults = &config.nodes;
        Ok(Self {
            lease: LeaseExecutor::new(ctx.clone(), defaults.lease.clone()),
            files: FilesExecutor::new(ctx.clone(), defaults.files.clone()),
            tables: TablesExecutor::new(ctx.clone(), defaults.tables.clone()),
            automation: AutomationExecutor::new(ctx, defaults.automation.clone()),
        })
    }

    /// Dispatch `msg` to the executor for `kind`.
    ///
    /// # Errors
    /// Whatever the executor reports.
    pub async fn execute(&self, kind: NodeKind, msg: FlowMessage) -> Result<FlowMessage, ActionError> {
        match kind {
            NodeKind::Lease => self.lease.execute(msg).await,
            NodeKind::Files => self.files.execute(msg).await,
            NodeKind::Tables => self.tables.execute(msg).await,
            NodeKind::Automation => self.automation.execute(msg).await,
        }
    }

    /// Like [`execute`](Self::execute), but failures become an
    /// `{ "error": ... }` payload on the same message, the way a flow sees
    /// them.
    pub async fn run(&self, kind: NodeKind, msg: FlowMessage) -> FlowMessage {
        let fallback = msg.clone();
        match self.execute(kind, msg).await {
            Ok(out) => out,
            Err(err) => {
                error!(node = %kind, error = %err, "action failed");
                err.into_message(fallback)
            }
        }
    }
}
