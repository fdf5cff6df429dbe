//! Runtime abstractions for inference providers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod providers;

pub use providers::{ModelInfo, OllamaProvider};

/// Sampling options forwarded to the server untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

/// Non-streaming generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    /// Context window requested from the server
    pub num_ctx: Option<u32>,
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    /// Request with no `num_ctx` and default options.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            num_ctx: None,
            options: None,
        }
    }

    /// Set the context size sent as `num_ctx`.
    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = Some(num_ctx);
        self
    }

    /// Override sampling options.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Generated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
    pub model: Option<String>,
    pub done_reason: Option<String>,
}

impl GenerateResponse {
    /// Plain text response, mostly for stubs.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            done_reason: None,
        }
    }
}

/// Provider error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("mock provider has no queued response")]
    MockQueueEmpty,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP error! status: {status}, message: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("provider error: {0}")]
    Message(String),
}

impl ProviderError {
    /// The server answered, but not in the agreed shape. Retrying will not help.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Text generation backend
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

/// Scripted provider for tests: queued results first, then the fallback.
#[derive(Debug, Default)]
pub struct MockProvider {
    generate_queue: Mutex<VecDeque<Result<GenerateResponse, ProviderError>>>,
    fallback: Mutex<Option<Result<GenerateResponse, ProviderError>>>,
    latency: Mutex<Option<Duration>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    /// Empty mock; unqueued calls fail with [`ProviderError::MockQueueEmpty`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that answers every request with `content`.
    pub fn always(content: impl Into<String>) -> Self {
        let provider = Self::new();
        provider.set_fallback(Ok(GenerateResponse::text(content)));
        provider
    }

    /// Provider that fails every request with `error`.
    pub fn failing(error: ProviderError) -> Self {
        let provider = Self::new();
        provider.set_fallback(Err(error));
        provider
    }

    /// Queue a result for the next `generate` call.
    pub fn enqueue_generate(&self, result: Result<GenerateResponse, ProviderError>) {
        self.generate_queue
            .lock()
            .expect("mock generate queue poisoned")
            .push_back(result);
    }

    /// Result returned once the queue is empty.
    pub fn set_fallback(&self, result: Result<GenerateResponse, ProviderError>) {
        *self.fallback.lock().expect("mock fallback poisoned") = Some(result);
    }

    /// Delay every response, e.g. to trip a caller's timeout.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("mock latency poisoned") = Some(latency);
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().expect("mock requests poisoned").clone()
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("mock requests poisoned").len()
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.requests
            .lock()
            .expect("mock requests poisoned")
            .push(req);

        let latency = *self.latency.lock().expect("mock latency poisoned");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let queued = self
            .generate_queue
            .lock()
            .expect("mock generate queue poisoned")
            .pop_front();

        queued.unwrap_or_else(|| {
            self.fallback
                .lock()
                .expect("mock fallback poisoned")
                .clone()
                .unwrap_or(Err(ProviderError::MockQueueEmpty))
        })
    }
}
