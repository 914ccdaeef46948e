//! Lakehouse tables executor
//!
//! Pages through the table listing and starts bulk loads of storage files
//! into a named table.

use lakeflow_domain::constants::DEFAULT_TABLE_MAX_RESULTS;
use lakeflow_domain::{FlowMessage, TableAction, TableParams};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{error, info};
use url::Url;

use super::context::{body_value, target_url, ActionContext};
use super::error::ActionError;

const DEFAULT_PATH_TYPE: &str = "file";
const DEFAULT_LOAD_MODE: &str = "append";
const DEFAULT_FORMAT: &str = "parquet";
const DEFAULT_CSV_DELIMITER: &str = ",";

pub struct TablesExecutor {
    ctx: ActionContext,
    defaults: TableParams,
}

impl TablesExecutor {
    #[must_use]
    pub fn new(ctx: ActionContext, defaults: TableParams) -> Self {
        Self { ctx, defaults }
    }

    /// Run one table operation.
    ///
    /// # Errors
    /// `InvalidInput` for a missing URL, action or table name; otherwise the
    /// token or request failure.
    #[tracing::instrument(skip(self, msg), fields(node = "tables"))]
    pub async fn execute(&self, msg: FlowMessage) -> Result<FlowMessage, ActionError> {
        let params = msg
            .params::<TableParams>()
            .map_err(|err| ActionError::invalid(err.to_string()))?
            .or(&self.defaults);

        let url = target_url(params.url.as_deref())?;
        let action = params
            .action
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .ok_or_else(|| ActionError::invalid("Action is required"))?
            .parse::<TableAction>()
            .map_err(ActionError::InvalidInput)?;

        let load = match action {
            TableAction::Upload => Some(load_request(&url, &params)?),
            TableAction::Read => None,
        };

        let token = self.ctx.token().await?;
        let outcome = match load {
            Some((target, body)) => self.upload(&target, &token, &body).await,
            None => self.read(&url, &token, &params).await,
        };
        self.ctx.completed();

        let payload = outcome.inspect_err(|err| error!(%action, error = %err, "table request failed"))?;
        Ok(msg.with_payload(payload))
    }

    async fn read(&self, url: &Url, token: &str, params: &TableParams) -> Result<Value, ActionError> {
        let max_results = params.max_results.unwrap_or(DEFAULT_TABLE_MAX_RESULTS);
        let mut query = vec![("maxResults", max_results.to_string())];
        if let Some(continuation) = params.continuation_token.as_deref().filter(|token| !token.is_empty()) {
            query.push(("continuationToken", continuation.to_string()));
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
        let body = body_value(response).await?;
        let field = |name: &str| body.get(name).cloned().unwrap_or(Value::Null);
        info!(more = !field("continuationToken").is_null(), "listed tables page");

        Ok(json!({
            "status": "Get Tables successful",
            "data": field("data"),
            "continuationToken": field("continuationToken"),
            "continuationUri": field("continuationUri"),
            "requestedMaxResults": max_results,
        }))
    }

    async fn upload(&self, target: &Url, token: &str, body: &Value) -> Result<Value, ActionError> {
        let response =
            self.ctx.send(self.ctx.request(Method::POST, target, token).json(body)).await?;
        let status = response.status().as_u16();
        info!(status, "table load accepted");
        Ok(json!({ "statusCode": status, "body": body_value(response).await? }))
    }
}

/// Target URL and JSON body of a table load.
fn load_request(url: &Url, params: &TableParams) -> Result<(Url, Value), ActionError> {
    let table = params
        .table_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ActionError::invalid("Table name is required"))?;
    let target = format!("{}/{table}/load", url.as_str().trim_end_matches('/'));
    let target = Url::parse(&target).map_err(|err| ActionError::Setup(format!("invalid URL '{target}': {err}")))?;

    let format = params.format.as_deref().filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FORMAT);
    let mut format_options = Map::new();
    format_options.insert("format".into(), Value::String(capitalize(format)));
    if format.eq_ignore_ascii_case("csv") {
        let delimiter = params.delimiter.as_deref().filter(|d| !d.is_empty()).unwrap_or(DEFAULT_CSV_DELIMITER);
        format_options.insert("delimiter".into(), Value::String(delimiter.to_string()));
        format_options.insert("header".into(), Value::Bool(params.header.unwrap_or(false)));
    }

    let path_type = params.path_type.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PATH_TYPE);
    let body = json!({
        "relativePath": params.relative_path,
        "pathType": capitalize(path_type),
        "mode": params.mode.as_deref().filter(|m| !m.is_empty()).unwrap_or(DEFAULT_LOAD_MODE),
        "formatOptions": Value::Object(format_options),
    });
    Ok((target, body))
}

/// Upper-case the first character, leaving the rest as given.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    //! Unit tests for actions::tables.
    use std::sync::Arc;

    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::actions::auth::test_support::StaticTokenProvider;
    use crate::http::HttpClient;

    fn executor(provider: &StaticTokenProvider, defaults: TableParams) -> TablesExecutor {
        let ctx = ActionContext::new(HttpClient::new().unwrap(), Arc::new(provider.clone()), 1024);
        TablesExecutor::new(ctx, defaults)
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("csv"), "Csv");
        assert_eq!(capitalize("Folder"), "Folder");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_read_returns_page_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ws/lh/tables"))
            .and(query_param("maxResults", "5"))
            .and(query_param_is_missing("continuationToken"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"name": "sales"}],
                "continuationToken": "c2",
                "continuationUri": "https://api/ws/lh/tables?continuationToken=c2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = StaticTokenProvider::with_token("T");
        let msg = FlowMessage::new(json!({"url": format!("{}/ws/lh/tables", server.uri()), "action": "read"}));
        let out = executor(&provider, TableParams::default()).execute(msg).await.unwrap();

        assert_eq!(out.payload["status"], "Get Tables successful");
        assert_eq!(out.payload["data"][0]["name"], "sales");
        assert_eq!(out.payload["continuationToken"], "c2");
        assert_eq!(out.payload["requestedMaxResults"], 5);
        assert_eq!(provider.completed(), 1);
    }

    #[tokio::test]
    async fn test_read_sends_continuation_encoded_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("maxResults", "2"))
            .and(query_param("continuationToken", "a+b/c="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = StaticTokenProvider::with_token("T");
        let msg = FlowMessage::new(json!({
            "url": format!("{}/tables", server.uri()),
            "action": "read",
            "maxResultsUploadData": 2,
            "continuationToken": "a+b/c="
        }));
        let out = executor(&provider, TableParams::default()).execute(msg).await.unwrap();
        assert_eq!(out.payload["continuationUri"], Value::Null);
    }

    /// Validates the CSV load request.
    ///
    /// Assertions:
    /// - POST goes to `{url}/{tableName}/load`.
    /// - Format and path type are capitalized; CSV adds delimiter and header.
    #[tokio::test]
    async fn test_upload_csv_load_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ws/lh/tables/sales/load"))
            .and(body_json(json!({
                "relativePath": "Files/sales.csv",
                "pathType": "File",
                "mode": "overwrite",
                "formatOptions": {"format": "Csv", "delimiter": ";", "header": true}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let defaults = TableParams { delimiter: Some(";".into()), ..TableParams::default() };
        let provider = StaticTokenProvider::with_token("T");
        let msg = FlowMessage::new(json!({
            "url": format!("{}/ws/lh/tables/", server.uri()),
            "action": "upload",
            "tableName": "sales",
            "filePath": "Files/sales.csv",
            "modeType": "overwrite",
            "formatType": "csv",
            "headerRow": true
        }));
        let out = executor(&provider, defaults).execute(msg).await.unwrap();
        assert_eq!(out.payload, json!({"statusCode": 202, "body": null}));
    }

    #[tokio::test]
    async fn test_upload_defaults_to_parquet_append() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "relativePath": "Files/day",
                "pathType": "Folder",
                "mode": "append",
                "formatOptions": {"format": "Parquet"}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let provider = StaticTokenProvider::with_token("T");
        let msg = FlowMessage::new(json!({
            "url": format!("{}/tables", server.uri()),
            "action": "upload",
            "tableName": "events",
            "filePath": "Files/day",
            "pathType": "folder"
        }));
        executor(&provider, TableParams::default()).execute(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_requires_table_name() {
        let provider = StaticTokenProvider::with_token("T");
        let msg = FlowMessage::new(json!({"url": "https://api/tables", "action": "upload"}));

        let err = executor(&provider, TableParams::default()).execute(msg).await.unwrap_err();
        assert_eq!(err.to_string(), "Table name is required");
        assert_eq!(provider.issued(), 0);
    }
}
