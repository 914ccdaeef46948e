//! Path and filesystem executor
//!
//! Create, delete, read and inspect single paths, list a filesystem page by
//! page, and stream a local file into a path by append or overwrite.

use lakeflow_domain::constants::{CONTINUATION_HEADER, DEFAULT_LIST_MAX_RESULTS};
use lakeflow_domain::{FileAction, FileParams, FlowMessage};
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{error, info};
use url::Url;

use super::context::{body_value, header_map, target_url, ActionContext};
use super::error::ActionError;
use super::upload::{append_file, create_file, flush, remote_length, LocalSource};

pub struct FilesExecutor {
    ctx: ActionContext,
    defaults: FileParams,
}

impl FilesExecutor {
    #[must_use]
    pub fn new(ctx: ActionContext, defaults: FileParams) -> Self {
        Self { ctx, defaults }
    }

    /// Run one file operation.
    ///
    /// # Errors
    /// `InvalidInput` for a missing URL, action or upload source; otherwise
    /// the token or request failure.
    #[tracing::instrument(skip(self, msg), fields(node = "files"))]
    pub async fn execute(&self, msg: FlowMessage) -> Result<FlowMessage, ActionError> {
        let params = msg.params::<FileParams>().map_err(|err| ActionError::invalid(err.to_string()))?;
        let params = params.or(&self.defaults);

        let url = target_url(params.url.as_deref())?;
        let action = params
            .action
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .ok_or_else(|| ActionError::invalid("Action is required"))?
            .parse::<FileAction>()
            .map_err(ActionError::InvalidInput)?;
        let source = if action == FileAction::Update {
            match params.file_path.as_deref().filter(|path| !path.is_empty()) {
                Some(path) => Some(LocalSource::open(path).await?),
                None => return Err(ActionError::invalid("File path is required")),
            }
        } else {
            None
        };

        let token = self.ctx.token().await?;
        let outcome = self.dispatch(action, &url, &token, &params, source, msg).await;
        self.ctx.completed();

        outcome.inspect_err(|err| error!(%action, error = %err, "file request failed"))
    }

    async fn dispatch(
        &self,
        action: FileAction,
        url: &Url,
        token: &str,
        params: &FileParams,
        source: Option<LocalSource>,
        msg: FlowMessage,
    ) -> Result<FlowMessage, ActionError> {
        match action {
            FileAction::Create => {
                let response = create_file(&self.ctx, url, token).await?;
                let status = response.status().as_u16();
                let data = body_value(response).await?;
                Ok(msg.with_payload(json!({ "statusCode": status, "data": data })))
            }
            FileAction::Delete => {
                let response = self
                    .ctx
                    .send(
                        self.ctx
                            .request(Method::DELETE, url, token)
                            .header(CONTENT_LENGTH, 0)
                            .body(Vec::new()),
                    )
                    .await?;
                let status = response.status().as_u16();
                let data = body_value(response).await?;
                Ok(msg.with_payload(json!({ "statusCode": status, "data": data })))
            }
            FileAction::Read => {
                let response = self.ctx.send(self.ctx.request(Method::GET, url, token)).await?;
                let status = response.status().as_u16();
                let headers = header_map(response.headers());
                let data = body_value(response).await?;
                Ok(msg.with_payload(json!({
                    "status": "Get File successful",
                    "statusCode": status,
                    "data": data,
                    "headers": Value::Object(headers),
                })))
            }
            FileAction::GetProperties => {
                let response = self.ctx.send(self.ctx.request(Method::HEAD, url, token)).await?;
                Ok(msg.with_payload(json!({
                    "status": "Get Properties successful",
                    "statusCode": response.status().as_u16(),
                    "headers": Value::Object(header_map(response.headers())),
                })))
            }
            FileAction::List => self.list(url, token, params, msg).await,
            FileAction::Update => {
                let source =
                    source.ok_or_else(|| ActionError::invalid("File path is required"))?;
                if params.overwrite.unwrap_or(false) {
                    self.overwrite(url, token, source).await?;
                    Ok(msg.with_payload(json!({ "status": "Overwrite successful" })))
                } else {
                    self.append(url, token, source).await?;
                    Ok(msg.with_payload(json!({ "status": "Append successful" })))
                }
            }
        }
    }

    /// One page of the filesystem listing. The continuation for the next page
    /// travels back in the message headers.
    async fn list(
        &self,
        url: &Url,
        token: &str,
        params: &FileParams,
        mut msg: FlowMessage,
    ) -> Result<FlowMessage, ActionError> {
        let max_results = params.max_results.unwrap_or(DEFAULT_LIST_MAX_RESULTS);
        let recursive = params.recursive.unwrap_or(false);
        let continuation = msg
            .header_str(CONTINUATION_HEADER)
            .map(str::to_string)
            .or_else(|| params.continuation.clone().filter(|token| !token.is_empty()));

        let mut query = vec![
            ("recursive", recursive.to_string()),
            ("resource", "filesystem".to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(continuation) = continuation {
            query.push(("continuation", continuation));
        }

        let response = self
            .ctx
            .send(
                self.ctx
                    .request(Method::GET, url, token)
                    .query(&query)
                    .header(ACCEPT, "application/json"),
            )
            .await?;
        let headers = header_map(response.headers());
        let next = headers.get(CONTINUATION_HEADER).cloned().unwrap_or(Value::Null);
        let data = body_value(response).await?;

        let count = data.get("paths").and_then(Value::as_array).map_or(0, Vec::len);
        info!(count, more = !next.is_null(), "listed filesystem page");

        msg.headers.retain(|key, _| !key.eq_ignore_ascii_case(CONTINUATION_HEADER));
        msg.headers.insert(CONTINUATION_HEADER.to_string(), next);
        Ok(msg.with_payload(json!({
            "status": "Get List successful",
            "data": data,
            "headers": Value::Object(headers),
            "requestedMaxResults": max_results,
        })))
    }

    async fn overwrite(&self, url: &Url, token: &str, source: LocalSource) -> Result<(), ActionError> {
        create_file(&self.ctx, url, token).await?;
        let sent = append_file(&self.ctx, url, token, source, 0).await?;
        flush(&self.ctx, url, token, sent).await?;
        info!(bytes = sent, "overwrote remote file");
        Ok(())
    }

    async fn append(&self, url: &Url, token: &str, source: LocalSource) -> Result<(), ActionError> {
        let start = remote_length(&self.ctx, url, token).await?;
        let sent = append_file(&self.ctx, url, token, source, start).await?;
        flush(&self.ctx, url, token, start + sent).await?;
        info!(start, bytes = sent, "appended to remote file");
        Ok(())
    }
}
