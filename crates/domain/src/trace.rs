use serde::Serialize;

/// Structured trace events emitted across all docguide crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        user_id: String,
        sessions: usize,
    },
    HistoryTrimmed {
        user_id: String,
        dropped: usize,
        kept: usize,
    },
    ProvisioningStep {
        step: String,
        id: String,
    },
    DocumentSkipped {
        file_name: String,
        reason: String,
    },
    RunDispatched {
        user_id: String,
        history_len: usize,
    },
    RunFinished {
        user_id: String,
        reply_chars: usize,
        messages_completed: usize,
        duration_ms: u64,
    },
    RunFailed {
        user_id: String,
        empty_reply: bool,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "dg_event");
    }
}
