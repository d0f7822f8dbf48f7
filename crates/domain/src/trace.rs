use serde::Serialize;

/// Structured trace events emitted across all Apiary crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    DaemonStarted {
        agent: String,
        provider: String,
        pid: u32,
        resume_ready: bool,
    },
    DaemonStopped {
        agent: String,
    },
    InvocationStarted {
        agent: String,
        invocation_id: String,
        command: String,
        resumed: bool,
    },
    InvocationFinished {
        agent: String,
        invocation_id: String,
        exit_code: Option<i32>,
        timed_out: bool,
        input_tokens: u64,
        output_tokens: u64,
        compaction: bool,
    },
    CompactionDetected {
        agent: String,
        trigger: String,
        pre_tokens: u64,
    },
    HistoryReinjected {
        agent: String,
        snapshot_chars: usize,
    },
    RepeatedFailures {
        agent: String,
        consecutive_failures: u32,
        last_error: String,
    },
    UsageRecorded {
        agent: String,
        total_input_tokens: u64,
        total_output_tokens: u64,
        context_window: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ap_event");
    }
}
