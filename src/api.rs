use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_documents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub stats: Stats,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_used: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_sources: Option<usize>,
}

#[derive(Serialize)]
struct KnowledgeRequest<'a> {
    text: &'a str,
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeReply {
    pub message: String,
    #[serde(default)]
    pub stats: Option<Stats>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// The three calls the chat surface depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn health(&self) -> Result<HealthReport, ApiError>;
    async fn chat(&self, message: &str) -> Result<ChatReply, ApiError>;
    async fn clear_history(&self) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        let url = self.url("stats");
        tracing::debug!(%url, "fetching stats");

        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    pub async fn add_knowledge(
        &self,
        text: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<KnowledgeReply, ApiError> {
        let url = self.url("add-knowledge");
        tracing::debug!(%url, chars = text.chars().count(), "adding knowledge");

        let request = KnowledgeRequest { text, metadata };
        let response = self.client.post(&url).json(&request).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn health(&self) -> Result<HealthReport, ApiError> {
        let url = self.url("health");
        tracing::debug!(%url, "probing health");

        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        let url = self.url("chat");
        tracing::debug!(%url, chars = message.chars().count(), "sending chat message");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        let url = self.url("clear-history");
        tracing::debug!(%url, "clearing history");

        let response = self.client.post(&url).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `ApiError::Status`, keeping the server's
/// `{"error": ...}` text when there is one.
async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.error);

    Err(ApiError::Status { status, message })
}
