//! Request router between the host and the summarizer

use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::{Diagnostics, LogBuffer};
use crate::facade::{ProviderFactory, Summarizer};
use crate::host::{HostEnvironment, HostRequest, HostResponse};
use crate::prompt::{customize_prompt, ContentKind};
use crate::retry::RetryConfig;

/// Request router between a host and the summarizer
pub struct Background {
    host: Arc<dyn HostEnvironment>,
    summarizer: Summarizer,
    logs: Arc<LogBuffer>,
}

impl Background {
    /// Router with a fresh log buffer wired into the summarizer.
    pub fn new(host: Arc<dyn HostEnvironment>, factory: Arc<dyn ProviderFactory>) -> Self {
        let logs = Arc::new(LogBuffer::default());
        let summarizer =
            Summarizer::new(host.clone(), factory).with_diagnostics(Diagnostics::new(logs.clone()));
        Self {
            host,
            summarizer,
            logs,
        }
    }

    /// Override retry timing.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.summarizer = self.summarizer.with_retry(retry);
        self
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Diagnostics recorded so far.
    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Handle one request and build the reply without sending it.
    pub async fn handle(&self, request: HostRequest) -> HostResponse {
        match request {
            HostRequest::Summarize {
                content,
                system_prompt,
                url,
            } => {
                let kind = ContentKind::detect(url.as_deref(), &content);
                debug!(?kind, url = url.as_deref().unwrap_or(""), "Summarize request");
                let prompt = customize_prompt(&system_prompt, kind);
                HostResponse::Summary(self.summarizer.respond(&content, &prompt).await)
            }
            HostRequest::GetLogs => HostResponse::Logs {
                logs: self.logs.snapshot(),
            },
            HostRequest::OpenPanel => {
                self.host.open_panel();
                HostResponse::Ack { ok: true }
            }
        }
    }

    /// Handle `request` and deliver the reply through the host.
    pub async fn dispatch(&self, request: HostRequest) {
        let response = self.handle(request).await;
        self.host.send_message(response);
    }
}
