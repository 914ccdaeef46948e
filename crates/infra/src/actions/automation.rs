//! Data automation upload executor
//!
//! Uploads one local file to a storage path, replacing whatever was there.

use lakeflow_domain::{AutomationParams, FlowMessage};
use serde_json::json;
use tracing::{error, info};

use super::context::{target_url, ActionContext};
use super::error::ActionError;
use super::upload::{append_file, create_file, flush, LocalSource};

pub struct AutomationExecutor {
    ctx: ActionContext,
    defaults: AutomationParams,
}

impl AutomationExecutor {
    #[must_use]
    pub fn new(ctx: ActionContext, defaults: AutomationParams) -> Self {
        Self { ctx, defaults }
    }

    /// Create the path, stream the file into it and flush.
    ///
    /// # Errors
    /// `InvalidInput` unless both URL and file path are given; `Setup` when
    /// the source cannot be opened, before any request; otherwise the token
    /// or request failure.
    #[tracing::instrument(skip(self, msg), fields(node = "automation"))]
    pub async fn execute(&self, msg: FlowMessage) -> Result<FlowMessage, ActionError> {
        let params = msg
            .params::<AutomationParams>()
            .map_err(|err| ActionError::invalid(err.to_string()))?
            .or(&self.defaults);

        let (Some(raw_url), Some(file_path)) = (
            params.url.as_deref().filter(|url| !url.trim().is_empty()),
            params.file_path.as_deref().filter(|path| !path.trim().is_empty()),
        ) else {
            return Err(ActionError::invalid("Both URL and File Path are required"));
        };
        let url = target_url(Some(raw_url))?;
        let source = LocalSource::open(file_path).await?;

        let token = self.ctx.token().await?;
        let outcome = async {
            create_file(&self.ctx, &url, &token).await?;
            let bytes = append_file(&self.ctx, &url, &token, source, 0).await?;
            let response = flush(&self.ctx, &url, &token, bytes).await?;
            Ok::<_, ActionError>((response.status().as_u16(), bytes))
        }
        .await;
        self.ctx.completed();

        let (status, bytes) =
            outcome.inspect_err(|err| error!(error = %err, "automation upload failed"))?;
        info!(bytes, "uploaded file");
        Ok(msg.with_payload(json!({
            "status": "Upload successful",
            "statusCode": status,
            "bytes": bytes,
        })))
    }
}
