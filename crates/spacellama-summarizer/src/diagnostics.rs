//! Diagnostic log entries surfaced to the host
//!
//! Every checkpoint is also emitted through `tracing`; the sink keeps a copy
//! the host can fetch later (the `getLogs` request).

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entries kept by [`LogBuffer::default`].
pub const DEFAULT_LOG_CAPACITY: usize = 1_000;

/// One diagnostics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl DiagnosticEntry {
    /// Entry stamped with the current time.
    pub fn new(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            data,
        }
    }
}

/// Append-only destination for diagnostic entries. Appending never fails.
pub trait DiagnosticsSink: Send + Sync {
    fn append(&self, entry: DiagnosticEntry);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn append(&self, _entry: DiagnosticEntry) {}
}

/// Bounded in-memory log; the oldest entries are dropped first.
#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<DiagnosticEntry>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// Buffer keeping at most `capacity` entries, dropping the oldest.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
            capacity,
        }
    }

    /// Copy of all entries, oldest first.
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Messages only, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock leaves the queue intact, so keep using it.
    fn lock(&self) -> MutexGuard<'_, VecDeque<DiagnosticEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticsSink for LogBuffer {
    fn append(&self, entry: DiagnosticEntry) {
        let mut entries = self.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}

/// Cheap handle passed down the pipeline
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticsSink>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    /// Handle that drops every entry.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Record `message` with optional structured `data`.
    pub fn emit(&self, message: impl Into<String>, data: Option<Value>) {
        self.sink.append(DiagnosticEntry::new(message, data));
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffer_drops_oldest_entries() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.append(DiagnosticEntry::new(format!("entry {i}"), None));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.messages(), vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn handle_writes_through_to_shared_buffer() {
        let buffer = Arc::new(LogBuffer::default());
        let diagnostics = Diagnostics::new(buffer.clone());

        diagnostics.emit("Summarizing chunk", Some(json!({ "chunk": 1, "of": 2 })));
        diagnostics.clone().emit("Chunk summarized", None);

        let entries = buffer.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].data, Some(json!({ "chunk": 1, "of": 2 })));
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn entry_serializes_without_empty_data() {
        let entry = DiagnosticEntry::new("Recursion limit reached", None);
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["message"], "Recursion limit reached");
        assert!(value.get("data").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn disabled_handle_is_silent() {
        Diagnostics::disabled().emit("ignored", Some(json!(1)));
    }
}
