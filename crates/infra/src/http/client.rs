use std::time::Duration;

use lakeflow_domain::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use lakeflow_domain::{HttpSettings, LakeflowError};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with timeout and user agent, shared by the action nodes.
///
/// Each request is attempted once; failures surface to the flow as they
/// happen.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, LakeflowError> {
        Self::builder().build()
    }

    /// Build a client from the `[http]` configuration section.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, LakeflowError> {
        let mut builder = Self::builder().timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(agent) = &settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// Any HTTP status is returned as a response; only transport and request
    /// construction failures are errors.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, LakeflowError> {
        let request = builder.build().map_err(|err| {
            let infra: InfraError = err.into();
            LakeflowError::from(infra)
        })?;

        let method = request.method().clone();
        let url = redacted_url(request.url());
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                let infra: InfraError = err.into();
                Err(LakeflowError::from(infra))
            }
        }
    }
}

/// Drop query strings from logged URLs; SAS-style credentials travel there.
fn redacted_url(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    if url.query().is_some() {
        url.set_query(Some("redacted"));
    }
    url.to_string()
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, LakeflowError> {
        let agent = self
            .user_agent
            .unwrap_or_else(|| concat!("lakeflow/", env!("CARGO_PKG_VERSION")).to_string());
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(agent)
            .build().map_err(|err| {
            let infra: InfraError = err.into();
            LakeflowError::from(infra)
        })?;

        Ok(HttpClient { client })
    }
}
