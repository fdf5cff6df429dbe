//! SpaceLlama Summarizer - recursive chunk-and-summarize pipeline
//!
//! This crate provides:
//! - Settings resolution and endpoint validation
//! - Per-chunk summarization with retry, backoff and timeouts
//! - The recursive driver that re-summarizes until one chunk remains
//! - A host-facing facade and request router with diagnostics
//! - Optional fact checking and summary post-processing

pub mod background;
pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod facade;
pub mod fact_check;
pub mod host;
pub mod postprocess;
pub mod prompt;
pub mod retry;

pub use background::Background;
pub use chunk::ChunkSummarizer;
pub use config::{Settings, SummarizerConfig};
pub use diagnostics::{DiagnosticEntry, Diagnostics, DiagnosticsSink, LogBuffer};
pub use driver::{RecursiveSummarizer, SummarizationResult, MAX_RECURSION_DEPTH};
pub use error::{SettingsError, SummarizeError, SummarizeResult};
pub use facade::{
    OllamaFactory, ProviderFactory, SummarizeResponse, Summarizer, SummaryFailure, SummaryOutcome,
};
pub use fact_check::{FactCheck, FactChecker};
pub use host::{HostEnvironment, HostRequest, HostResponse, StaticHost};
pub use retry::RetryConfig;

/// Prelude for common imports
pub mod prelude {
    pub use crate::background::Background;
    pub use crate::config::{keys, Settings, SummarizerConfig};
    pub use crate::error::{SummarizeError, SummarizeResult};
    pub use crate::facade::{OllamaFactory, SummarizeResponse, Summarizer};
    pub use crate::host::{HostEnvironment, HostRequest, HostResponse};
}
