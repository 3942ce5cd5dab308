//! REST client for the hosted store
//!
//! Speaks the PostgREST dialect exposed under `/rest/v1/<table>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::TodoStore;
use crate::config::Config;
use crate::error::StoreError;
use crate::models::{NewTodo, Todo, TodoId, TodoPatch};

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 10;

/// Error body sent by the service on non-success responses
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Store backed by the service's REST interface
#[derive(Debug, Clone)]
pub struct RestStore {
    http: Client,
    /// Fully qualified table endpoint
    endpoint: Url,
}

impl RestStore {
    /// Create a client for `table` on the service at `base_url`
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, api_key, table, Duration::from_secs(REQUEST_TIMEOUT))
    }

    /// Like `new`, giving up on any request that takes longer than `timeout`
    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = table_endpoint(base_url, table)?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| StoreError::InvalidConfig("API key is not a valid header".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| StoreError::InvalidConfig("API key is not a valid header".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, endpoint })
    }

    /// Create a client from configured credentials
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let (url, key) = config
            .credentials()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        Self::new(url, key, &config.table)
    }

    /// The table endpoint requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TodoStore for RestStore {
    async fn list(&self) -> Result<Vec<Todo>, StoreError> {
        debug!("GET {}", self.endpoint);
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("select", "*"), ("order", "id.desc")])
            .send()
            .await?;

        decode(response).await
    }

    async fn insert(&self, todo: NewTodo) -> Result<Todo, StoreError> {
        debug!("POST {} body={:?}", self.endpoint, todo.body);
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Prefer", "return=representation")
            .json(&todo)
            .send()
            .await?;

        let mut rows: Vec<Todo> = decode(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NoRows("insert"));
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, id: TodoId, patch: TodoPatch) -> Result<Todo, StoreError> {
        debug!("PATCH {} id={} finished={}", self.endpoint, id, patch.finished);
        let response = self
            .http
            .patch(self.endpoint.clone())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        let mut rows: Vec<Todo> = decode(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(rows.remove(0))
    }
}

/// Build `<base>/rest/v1/<table>`
fn table_endpoint(base_url: &str, table: &str) -> Result<Url, StoreError> {
    let base = base_url.trim_end_matches('/');
    let url = Url::parse(&format!("{}/rest/v1/{}", base, table))
        .map_err(|e| StoreError::InvalidConfig(format!("bad store URL '{}': {}", base_url, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StoreError::InvalidConfig(format!(
            "store URL must be http or https, got '{}'",
            other
        ))),
    }
}

/// Check the status and decode the JSON body
async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body: ApiErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        let message = body
            .message
            .unwrap_or_else(|| String::from_utf8_lossy(&bytes).trim().to_string());
        warn!("Store returned {}: {}", status, message);
        return Err(StoreError::Api {
            status: status.as_u16(),
            message,
            code: body.code,
            details: body.details,
            hint: body.hint,
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}
