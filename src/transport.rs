use crate::config::ShimConfig;
use crate::envelope::Row;
use crate::error::ShimError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Request body of the query route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<JsonValue>,
}

/// Success body of the query route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(rename = "rowCount", default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub command: Option<String>,
}

impl QueryResponse {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            row_count: Some(rows.len() as u64),
            rows,
            command: None,
        }
    }
}

/// Failure body of the query route. Any other field the backend adds,
/// including an echo of the request, is dropped during decoding.
#[derive(Debug, Default, Deserialize)]
struct BackendFailure {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// One request, one response. Implementations own whatever connection pool
/// they need; the executor never holds a connection across calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse, ShimError>;

    async fn health(&self) -> Result<(), ShimError>;
}

/// JSON-over-HTTP transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    bearer_token: Option<String>,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &ShimConfig) -> Result<Self, ShimError> {
        config.validate()?;
        let endpoint =
            reqwest::Url::parse(config.endpoint.trim()).map_err(|e| ShimError::InvalidConfig {
                message: format!("endpoint is not a valid URL: {e}"),
            })?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ShimError::InvalidConfig {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint,
            bearer_token: config.bearer_token.clone(),
            timeout_ms: u64::try_from(config.request_timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &QueryRequest) -> Result<QueryResponse, ShimError> {
        let response = self
            .authorize(self.client.post(self.endpoint.clone()).json(request))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout_ms))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| map_reqwest_error(e, self.timeout_ms))?;
        if !status.is_success() {
            return Err(backend_failure(status, &body));
        }
        serde_json::from_slice(&body)
            .map_err(|e| ShimError::Decode(format!("malformed query response: {e}")))
    }

    async fn health(&self) -> Result<(), ShimError> {
        let response = self
            .authorize(self.client.get(self.endpoint.clone()))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout_ms))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(|e| map_reqwest_error(e, self.timeout_ms))?;
        Err(backend_failure(status, &body))
    }
}

fn backend_failure(status: reqwest::StatusCode, body: &[u8]) -> ShimError {
    let failure: BackendFailure = serde_json::from_slice(body).unwrap_or_default();
    let message = failure
        .details
        .or(failure.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ShimError::backend(status.as_u16(), message)
}

fn map_reqwest_error(err: reqwest::Error, timeout_ms: u64) -> ShimError {
    if err.is_timeout() {
        return ShimError::Timeout { timeout_ms };
    }
    // Drop the URL so credentials in it never reach an envelope.
    ShimError::Transport {
        message: err.without_url().to_string(),
    }
}
