//! Ollama API Provider
//!
//! Implements the InferenceProvider trait for Ollama's `/api/generate`
//! endpoint (non-streaming) and exposes the `/api/tags` model listing.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{GenerateOptions, GenerateRequest, GenerateResponse, InferenceProvider, ProviderError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ollama API Provider
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    /// Create a provider for an explicit server URL.
    ///
    /// No overall request timeout is set here; callers bound each request.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Absolute URL for an API path such as `/api/tags`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// List locally available models (`GET /api/tags`)
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.fetch_tags(None).await
    }

    /// Check that the server answers, returning how many models it reports.
    pub async fn check_connection(&self, timeout: Duration) -> Result<usize, ProviderError> {
        self.fetch_tags(Some(timeout)).await.map(|models| models.len())
    }

    async fn fetch_tags(&self, timeout: Option<Duration>) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut request = self
            .client
            .get(self.endpoint("/api/tags"))
            .header("accept", "application/json");
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let body = success_body(response).await?;

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("invalid model list: {e}")))?;
        Ok(tags.models)
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a GenerateOptions>,
}

/// Ollama generate response; only `response` is required
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: Option<String>,
    model: Option<String>,
    done_reason: Option<String>,
}

/// Ollama model listing
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

/// A model available on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

async fn success_body(response: Response) -> Result<String, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read body>".to_string());
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let ollama_req = OllamaGenerateRequest {
            prompt: &req.prompt,
            model: &req.model,
            stream: false,
            num_ctx: req.num_ctx,
            options: req.options.as_ref(),
        };

        let response = self
            .client
            .post(self.endpoint("/api/generate"))
            .header("content-type", "application/json")
            .json(&ollama_req)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let body = success_body(response).await?;

        let ollama_resp: OllamaGenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("response is not valid JSON: {e}")))?;
        let content = ollama_resp.response.ok_or_else(|| {
            ProviderError::Decode("response body has no `response` field".to_string())
        })?;

        Ok(GenerateResponse {
            content,
            model: ollama_resp.model,
            done_reason: ollama_resp.done_reason,
        })
    }
}
