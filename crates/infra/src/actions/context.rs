//! Shared plumbing for action executors

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use super::auth::AccessTokenProvider;
use super::error::ActionError;
use crate::http::HttpClient;

/// What every executor needs: an HTTP client, a token source and the upload
/// slice size.
#[derive(Clone)]
pub struct ActionContext {
    http: HttpClient,
    tokens: Arc<dyn AccessTokenProvider>,
    upload_chunk_bytes: usize,
}

impl ActionContext {
    #[must_use]
    pub fn new(
        http: HttpClient,
        tokens: Arc<dyn AccessTokenProvider>,
        upload_chunk_bytes: usize,
    ) -> Self {
        Self { http, tokens, upload_chunk_bytes: upload_chunk_bytes.max(1) }
    }

    pub(crate) const fn upload_chunk_bytes(&self) -> usize {
        self.upload_chunk_bytes
    }

    pub(crate) async fn token(&self) -> Result<String, ActionError> {
        Ok(self.tokens.access_token().await?)
    }

    pub(crate) fn completed(&self) {
        self.tokens.request_completed();
    }

    /// Authorized request against `url`.
    pub(crate) fn request(&self, method: Method, url: &Url, token: &str) -> RequestBuilder {
        self.http.request(method, url.clone()).bearer_auth(token)
    }

    /// Send and require a 2xx status.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, ActionError> {
        let response = self.http.send(builder).await?;
        ensure_success(response).await
    }
}

/// Parse the target URL, treating a missing or blank value as invalid input.
pub(crate) fn target_url(raw: Option<&str>) -> Result<Url, ActionError> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty());
    let raw = raw.ok_or_else(|| ActionError::invalid("URL is required"))?;
    Url::parse(raw).map_err(|err| ActionError::Setup(format!("invalid URL '{raw}': {err}")))
}

async fn ensure_success(response: Response) -> Result<Response, ActionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    warn!(%status, "storage request rejected");
    Err(ActionError::Status { status: status.as_u16(), body: render_error_body(&text) })
}

/// Error bodies are rendered as JSON text: parsed documents compactly,
/// anything else as a quoted string.
fn render_error_body(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .unwrap_or_else(|_| Value::String(text.to_string()))
        .to_string()
}

/// Read the body as JSON, falling back to text; an empty body is `null`.
pub(crate) async fn body_value(response: Response) -> Result<Value, ActionError> {
    let text = response
        .text()
        .await
        .map_err(|err| ActionError::NoResponse { detail: format!("failed to read body: {err}") })?;
    Ok(parse_body(text))
}

pub(crate) fn parse_body(text: String) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Response headers as a JSON object keyed by lowercase name.
pub(crate) fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value
                .to_str()
                .map_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned(), str::to_string);
            (name.as_str().to_string(), Value::String(value))
        })
        .collect()
}
