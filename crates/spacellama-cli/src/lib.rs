//! SpaceLlama CLI - terminal client for the summarization pipeline

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use spacellama_context::suggested_token_limit;
use spacellama_runtime::{GenerateRequest, InferenceProvider, ModelInfo, OllamaProvider, ProviderError};
use spacellama_summarizer::config::keys;
use spacellama_summarizer::postprocess::{split_thoughts, SummaryStats};
use spacellama_summarizer::prompt::{chunk_prompt, DEFAULT_SYSTEM_PROMPT};
use spacellama_summarizer::{
    Background, HostEnvironment, HostRequest, HostResponse, OllamaFactory, Settings,
    SettingsError, SummarizeError, SummarizeResponse, SummarizerConfig, SummaryFailure,
    SummaryOutcome,
};
use thiserror::Error;
use tracing::{debug, info};

/// Fixed document sent by `test-summarization`.
pub const TEST_DOCUMENT: &str = "This is a test document for the SpaceLlama extension. It contains sample text to verify that the Ollama API integration is working correctly.";
/// Instruction paired with [`TEST_DOCUMENT`].
pub const TEST_PROMPT: &str = "Summarize this test document in one sentence.";
const TEST_NUM_CTX: u32 = 2_048;
const TEST_TIMEOUT_SECS: u64 = 30;

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "spacellama",
    version,
    about = "Summarize text with a local Ollama server",
    long_about = "Summarize documents of any length with a local Ollama server. Long input is split into chunks that fit the model's context and summarized recursively."
)]
pub struct Cli {
    #[arg(long, global = true, help = "Ollama server URL")]
    pub endpoint: Option<String>,
    #[arg(long, global = true, help = "Model name, e.g. llama3.1:8b")]
    pub model: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Context size in tokens (clamped to 1024-128000)"
    )]
    pub token_limit: Option<usize>,
    #[arg(long, global = true, env = "SPACELLAMA_SETTINGS", help = "JSON settings file")]
    pub settings: Option<PathBuf>,
    #[arg(long, global = true, help = "Verify the summary with a fact-checking model")]
    pub fact_check: bool,
    #[arg(long, global = true, help = "Report the estimated input token count")]
    pub report_token_count: bool,
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Summarize a text file or standard input")]
    Summarize {
        #[arg(default_value = "-", help = "Input file, or `-` for standard input")]
        input: String,
        #[arg(long, conflicts_with = "prompt_file", help = "System prompt")]
        prompt: Option<String>,
        #[arg(long, help = "Read the system prompt from a file")]
        prompt_file: Option<PathBuf>,
        #[arg(long, help = "Source URL of the content, used to detect video transcripts")]
        url: Option<String>,
        #[arg(long, help = "Print the raw JSON response")]
        json: bool,
        #[arg(long, help = "Show <think> sections of reasoning models")]
        show_thoughts: bool,
        #[arg(long, help = "Use the suggested context size for the model")]
        auto_token_limit: bool,
    },
    #[command(about = "List models available on the server")]
    Models,
    #[command(about = "Check that the server is reachable")]
    TestConnection {
        #[arg(long, default_value_t = 5, help = "Timeout in seconds")]
        timeout_secs: u64,
    },
    #[command(about = "Send a short test document through the model")]
    TestSummarization,
    #[command(about = "Show the suggested token limit for a model")]
    TokenLimit {
        #[arg(help = "Model name; defaults to the configured model")]
        model: Option<String>,
    },
}

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
    #[error("ollama request failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("cannot reach {endpoint}: {source} (is `ollama serve` running?)")]
    Connection {
        endpoint: String,
        source: ProviderError,
    },
    #[error("no response from the model within {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Failed(String),
}

impl Cli {
    /// Settings file, then `SPACELLAMA_*` variables, then flags.
    pub fn resolve_settings(&self) -> Result<Settings, CliError> {
        self.layer_settings(Settings::from_env())
    }

    fn layer_settings(&self, env: Settings) -> Result<Settings, CliError> {
        let file = match &self.settings {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::new(),
        };
        Ok(file.merge(env).merge(self.flag_settings()))
    }

    fn flag_settings(&self) -> Settings {
        let mut settings = Settings::new();
        if let Some(endpoint) = &self.endpoint {
            settings.set(keys::OLLAMA_ENDPOINT, endpoint.clone());
        }
        if let Some(model) = &self.model {
            settings.set(keys::OLLAMA_MODEL, model.clone());
        }
        if let Some(token_limit) = self.token_limit {
            settings.set(keys::TOKEN_LIMIT, token_limit);
        }
        if self.fact_check {
            settings.set(keys::FACT_CHECK, true);
        }
        if self.report_token_count {
            settings.set(keys::REPORT_TOKEN_COUNT, true);
        }
        settings
    }
}

/// How replies are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human { show_thoughts: bool },
    Json,
}

/// Terminal host: settings from the command line, replies rendered as text.
#[derive(Debug)]
pub struct CliHost {
    settings: Settings,
    format: OutputFormat,
    outbox: Mutex<Vec<String>>,
}

impl CliHost {
    /// Create a host over already layered settings.
    pub fn new(settings: Settings, format: OutputFormat) -> Self {
        Self {
            settings,
            format,
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Rendered replies so far, oldest first; empties the outbox.
    pub fn take_output(&self) -> String {
        let mut outbox = self
            .outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *outbox).join("\n")
    }
}

impl HostEnvironment for CliHost {
    fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.get(key).cloned()
    }

    fn send_message(&self, message: HostResponse) {
        let rendered = render_response(&message, self.format);
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(rendered);
    }

    fn open_panel(&self) {
        debug!("No panel to open in a terminal");
    }
}

/// Render one host reply for the terminal.
pub fn render_response(message: &HostResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(message)
            .unwrap_or_else(|e| format!(r#"{{"error": "failed to encode response: {e}"}}"#)),
        OutputFormat::Human { show_thoughts } => match message {
            HostResponse::Summary(SummarizeResponse::Success(outcome)) => {
                render_summary(outcome, show_thoughts)
            }
            HostResponse::Summary(SummarizeResponse::Failure(failure)) => render_failure(failure),
            HostResponse::Logs { logs } => logs
                .iter()
                .map(|entry| match &entry.data {
                    Some(data) => format!("{} {} {data}", entry.timestamp.to_rfc3339(), entry.message),
                    None => format!("{} {}", entry.timestamp.to_rfc3339(), entry.message),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            HostResponse::Ack { ok } => format!("ok: {ok}"),
        },
    }
}

fn render_summary(outcome: &SummaryOutcome, show_thoughts: bool) -> String {
    let parts = split_thoughts(&outcome.summary);
    let stats = SummaryStats::of(&outcome.summary);
    let mut lines = Vec::new();

    if show_thoughts && !parts.thoughts.is_empty() {
        lines.push("Thinking".bold().dimmed().to_string());
        lines.extend(parts.thoughts.iter().map(|t| t.dimmed().to_string()));
        lines.push(String::new());
    }

    lines.push(parts.answer);
    lines.push(String::new());

    let mut footer = vec![
        format!("{} chunk(s)", outcome.chunk_count),
        format!("depth {}", outcome.recursion_depth),
        format!("{} words", stats.word_count),
        format!("~{} min read", stats.reading_minutes),
    ];
    if let Some(tokens) = outcome.token_count {
        footer.push(format!("{tokens} input tokens"));
    }
    if let Some(check) = &outcome.fact_check {
        footer.push(format!("fact check: {}", check.label()));
    }
    if outcome.truncated {
        footer.push("content truncated".to_string());
    }
    lines.push(footer.join(" | ").dimmed().to_string());

    lines.join("\n")
}

fn render_failure(failure: &SummaryFailure) -> String {
    let mut lines = vec![failure.error.clone()];
    if let Some(endpoint) = &failure.details.endpoint {
        lines.push(format!("  endpoint: {endpoint}"));
    }
    if let Some(model) = &failure.details.model {
        lines.push(format!("  model: {model}"));
    }
    lines.join("\n")
}

/// Human-readable size, e.g. `4.58 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}

/// Table of models, the configured one marked with `*`.
pub fn render_models(models: &[ModelInfo], current_model: &str) -> String {
    if models.is_empty() {
        return "No models found. Pull one with `ollama pull <model>`.".to_string();
    }

    models
        .iter()
        .map(|model| {
            let marker = if model.name == current_model { "*" } else { " " };
            let size = model.size.map_or_else(|| "unknown".to_string(), format_bytes);
            let modified = model.modified_at.as_deref().unwrap_or("");
            format!("{marker} {:<32} {size:>10}  {modified}", model.name)
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run a parsed command and return what should be printed.
pub async fn run(cli: Cli) -> Result<String, CliError> {
    let settings = cli.resolve_settings()?;

    match cli.command {
        Commands::Summarize {
            input,
            prompt,
            prompt_file,
            url,
            json,
            show_thoughts,
            auto_token_limit,
        } => {
            let system_prompt = match (prompt, prompt_file) {
                (Some(prompt), _) => prompt,
                (None, Some(path)) => read_source(&path.to_string_lossy())?,
                (None, None) => DEFAULT_SYSTEM_PROMPT.to_string(),
            };
            if system_prompt.trim().is_empty() {
                return Err(CliError::InvalidArgument(
                    "system prompt cannot be empty".to_string(),
                ));
            }
            let content = read_source(&input)?;
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Human { show_thoughts }
            };

            summarize(settings, content, system_prompt, url, format, auto_token_limit).await
        }
        Commands::Models => {
            let config = SummarizerConfig::from_settings(&settings)?;
            let provider = OllamaProvider::new(config.endpoint.clone())?;
            let models = provider.list_models().await?;
            Ok(render_models(&models, &config.model))
        }
        Commands::TestConnection { timeout_secs } => {
            let config = SummarizerConfig::from_settings(&settings)?;
            let provider = OllamaProvider::new(config.endpoint.clone())?;
            let count = provider
                .check_connection(Duration::from_secs(timeout_secs))
                .await
                .map_err(|source| CliError::Connection {
                    endpoint: config.endpoint.clone(),
                    source,
                })?;
            Ok(format!(
                "Connected to {} ({count} models available)",
                config.endpoint
            ))
        }
        Commands::TestSummarization => test_summarization(&settings).await,
        Commands::TokenLimit { model } => {
            let model = match model {
                Some(model) => model,
                None => SummarizerConfig::from_settings(&settings)?.model,
            };
            Ok(format!("{model}: {} tokens", suggested_token_limit(&model)))
        }
    }
}

async fn summarize(
    mut settings: Settings,
    content: String,
    system_prompt: String,
    url: Option<String>,
    format: OutputFormat,
    auto_token_limit: bool,
) -> Result<String, CliError> {
    if auto_token_limit {
        let model = SummarizerConfig::from_settings(&settings)?.model;
        let token_limit = suggested_token_limit(&model);
        info!(%model, token_limit, "Using suggested token limit");
        settings.set(keys::TOKEN_LIMIT, token_limit);
    }

    let host = Arc::new(CliHost::new(settings, format));
    let background = Background::new(host.clone(), Arc::new(OllamaFactory));

    let response = background
        .handle(HostRequest::Summarize {
            content,
            system_prompt,
            url,
        })
        .await;
    let failed = matches!(response, HostResponse::Summary(SummarizeResponse::Failure(_)));

    host.send_message(response);
    let output = host.take_output();
    if failed {
        Err(CliError::Failed(output))
    } else {
        Ok(output)
    }
}

async fn test_summarization(settings: &Settings) -> Result<String, CliError> {
    let config = SummarizerConfig::from_settings(settings)?;
    let provider = OllamaProvider::new(config.endpoint.clone())?;
    let request = GenerateRequest::new(chunk_prompt(TEST_PROMPT, TEST_DOCUMENT), config.model.clone())
        .with_num_ctx(TEST_NUM_CTX);

    let response = tokio::time::timeout(
        Duration::from_secs(TEST_TIMEOUT_SECS),
        provider.generate(request),
    )
    .await
    .map_err(|_| CliError::Timeout(TEST_TIMEOUT_SECS))??;

    let reply = response.content.trim();
    if reply.is_empty() {
        return Err(ProviderError::Decode("empty response from the model".to_string()).into());
    }

    Ok(format!(
        "Summarization successful\nModel: {}\nResponse: \"{reply}\"",
        config.model
    ))
}

fn read_source(source: &str) -> Result<String, CliError> {
    let io_error = |source_err| CliError::Io {
        path: source.to_string(),
        source: source_err,
    };

    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(io_error)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(Path::new(source)).map_err(io_error)
    }
}
