//! Error types for the summarization pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use spacellama_context::ContextError;
use spacellama_runtime::ProviderError;
use thiserror::Error;

/// Summarization error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {message} ({hint})")]
    InvalidConfiguration { message: String, hint: String },

    #[error("request failed: {0}")]
    TransientRequest(String),

    #[error("malformed response from inference server: {0}")]
    MalformedResponse(String),

    #[error("chunk summarization failed after {attempts} attempts: {message}")]
    ChunkSummarization { attempts: usize, message: String },

    #[error("summarization with model {model} at {endpoint} failed: {message}")]
    SummarizationFailed {
        endpoint: String,
        model: String,
        message: String,
    },
}

impl SummarizeError {
    /// Configuration error with a hint for the user.
    pub fn invalid_configuration(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Retried locally by the chunk summarizer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRequest(_))
    }

    /// Context for the caller; falls back to `endpoint`/`model` when the
    /// error does not carry its own.
    pub fn details(&self, endpoint: Option<&str>, model: Option<&str>) -> ErrorDetails {
        match self {
            Self::SummarizationFailed {
                endpoint,
                model,
                message,
            } => ErrorDetails {
                endpoint: Some(endpoint.clone()),
                model: Some(model.clone()),
                message: message.clone(),
            },
            other => ErrorDetails {
                endpoint: endpoint.map(str::to_string),
                model: model.map(str::to_string),
                message: other.to_string(),
            },
        }
    }
}

impl From<ProviderError> for SummarizeError {
    fn from(err: ProviderError) -> Self {
        if err.is_malformed() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::TransientRequest(err.to_string())
        }
    }
}

impl From<ContextError> for SummarizeError {
    fn from(err: ContextError) -> Self {
        Self::invalid_configuration(
            err.to_string(),
            "raise tokenLimit or shorten the system prompt",
        )
    }
}

/// Diagnostic context attached to a failed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub message: String,
}

/// Errors loading a settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("settings file {0} must contain a JSON object")]
    NotAnObject(PathBuf),
}

/// Result type for summarization operations
pub type SummarizeResult<T> = Result<T, SummarizeError>;
