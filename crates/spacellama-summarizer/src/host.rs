//! Host environment seam
//!
//! The summarizer never talks to browser storage or UI directly. A host
//! supplies settings, receives responses and can be asked to show its panel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Settings;
use crate::diagnostics::DiagnosticEntry;
use crate::facade::SummarizeResponse;

/// Environment the summarizer runs in
pub trait HostEnvironment: Send + Sync {
    fn get_setting(&self, key: &str) -> Option<Value>;

    fn send_message(&self, message: HostResponse);

    fn open_panel(&self);
}

/// Message received from the host, tagged by `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostRequest {
    Summarize {
        content: String,
        #[serde(rename = "systemPrompt")]
        system_prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    GetLogs,
    OpenPanel,
}

/// Reply sent to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostResponse {
    Summary(SummarizeResponse),
    Logs { logs: Vec<DiagnosticEntry> },
    Ack { ok: bool },
}

/// In-memory host: fixed settings, recorded outbox.
#[derive(Debug, Default)]
pub struct StaticHost {
    settings: Settings,
    outbox: Mutex<Vec<HostResponse>>,
    panel_opens: AtomicUsize,
}

impl StaticHost {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Messages passed to `send_message`, in order.
    pub fn sent_messages(&self) -> Vec<HostResponse> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn panel_open_count(&self) -> usize {
        self.panel_opens.load(Ordering::SeqCst)
    }
}

impl HostEnvironment for StaticHost {
    fn get_setting(&self, key: &str) -> Option<Value> {
        self.settings.get(key).cloned()
    }

    fn send_message(&self, message: HostResponse) {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }

    fn open_panel(&self) {
        self.panel_opens.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys;
    use serde_json::json;

    #[test]
    fn parses_summarize_request() {
        let request: HostRequest = serde_json::from_value(json!({
            "action": "summarize",
            "content": "Page text",
            "systemPrompt": "Be brief.",
            "url": "https://example.com/post"
        }))
        .unwrap();

        assert_eq!(
            request,
            HostRequest::Summarize {
                content: "Page text".into(),
                system_prompt: "Be brief.".into(),
                url: Some("https://example.com/post".into()),
            }
        );
    }

    #[test]
    fn parses_unit_actions() {
        let logs: HostRequest = serde_json::from_value(json!({ "action": "getLogs" })).unwrap();
        let panel: HostRequest = serde_json::from_value(json!({ "action": "openPanel" })).unwrap();

        assert_eq!(logs, HostRequest::GetLogs);
        assert_eq!(panel, HostRequest::OpenPanel);
        assert!(serde_json::from_value::<HostRequest>(json!({ "action": "reboot" })).is_err());
    }

    #[test]
    fn static_host_records_interactions() {
        let host = StaticHost::new(Settings::new().with(keys::OLLAMA_MODEL, "phi3"));

        host.open_panel();
        host.send_message(HostResponse::Ack { ok: true });

        assert_eq!(host.get_setting(keys::OLLAMA_MODEL), Some(json!("phi3")));
        assert_eq!(host.get_setting(keys::TOKEN_LIMIT), None);
        assert_eq!(host.panel_open_count(), 1);
        assert_eq!(host.sent_messages(), vec![HostResponse::Ack { ok: true }]);
    }

    #[test]
    fn ack_serializes_flat() {
        let value = serde_json::to_value(HostResponse::Ack { ok: true }).unwrap();
        assert_eq!(value, json!({ "ok": true }));
    }
}
