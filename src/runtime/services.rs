/// External services called by action dispatchers
///
/// The inference service decides Decision nodes; the relay service performs
/// on-chain actions on the workflow's behalf. Both are plain JSON-over-HTTP
/// endpoints and are abstracted behind traits so tests can record calls.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Body sent to the inference service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    Transfer,
    Mint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayParams {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

/// Body sent to the relay service: `{action, params: {to, amount?}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRequest {
    pub action: RelayAction,
    pub params: RelayParams,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RelayResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn decide(&self, request: &InferenceRequest) -> Result<InferenceResponse, ServiceError>;
}

#[async_trait]
pub trait RelayService: Send + Sync {
    async fn submit(&self, request: &RelayRequest) -> Result<RelayResponse, ServiceError>;
}

/// Inference service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpInferenceService {
    client: reqwest::Client,
    url: String,
}

impl HttpInferenceService {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl InferenceService for HttpInferenceService {
    async fn decide(&self, request: &InferenceRequest) -> Result<InferenceResponse, ServiceError> {
        post_json(&self.client, &self.url, request).await
    }
}

/// Relay service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpRelayService {
    client: reqwest::Client,
    url: String,
}

impl HttpRelayService {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl RelayService for HttpRelayService {
    async fn submit(&self, request: &RelayRequest) -> Result<RelayResponse, ServiceError> {
        post_json(&self.client, &self.url, request).await
    }
}

/// POST a JSON body and parse the JSON reply whatever the status code
///
/// Both services report failures in the body (`success: false`), often with
/// a 4xx/5xx status, so the body is authoritative when it parses.
async fn post_json<B, R>(client: &reqwest::Client, url: &str, body: &B) -> Result<R, ServiceError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    tracing::debug!("🌐 POST {}", url);
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|_| {
        tracing::warn!("⚠️ Non-JSON response from {} (status {})", url, status);
        ServiceError::UnexpectedResponse {
            status: status.as_u16(),
            body: text.chars().take(200).collect(),
        }
    })
}
