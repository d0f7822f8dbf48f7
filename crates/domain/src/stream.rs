use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for model-CLI output streams.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Typed events recognized in a model CLI's line-delimited JSON output.
///
/// The daemon only acts on these four shapes; every other line (tool
/// results, unknown event types, non-JSON noise) stays opaque and is
/// captured raw by the rolling buffer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ModelEvent {
    /// Stream opened — `{"type":"system","subtype":"init",...}`.
    #[serde(rename = "init")]
    Init {
        session_id: String,
        model: String,
        permission_mode: String,
    },

    /// Provider summarized older context to free window space —
    /// `{"type":"system","subtype":"compact_boundary",...}`.
    #[serde(rename = "compact_boundary")]
    CompactBoundary {
        /// `"auto"` or `"manual"`.
        trigger: String,
        /// Token count before compaction, when reported.
        pre_tokens: u64,
    },

    /// Visible assistant text (joined `text` blocks of one message event).
    #[serde(rename = "assistant_text")]
    AssistantText { text: String },

    /// Error/warning payload surfaced by the CLI outside assistant output.
    #[serde(rename = "notice")]
    Notice { level: String, message: String },

    /// Terminal result event — exactly one per successful stream.
    #[serde(rename = "result")]
    Result(ResultEvent),
}

/// Extracted terminal result of one invocation stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultEvent {
    pub is_error: bool,
    pub duration_ms: u64,
    pub num_turns: u64,
    /// Input tokens summed across the per-model breakdown, including
    /// cache-read and cache-creation categories (they still occupy
    /// context even though cheaper to produce).
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Max context window reported across the per-model breakdown.
    /// 0 = not reported.
    pub context_window: u64,
}

/// One entry of the terminal event's per-model usage breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub context_window: u64,
}

impl ModelUsage {
    /// Total input-side tokens: fresh input plus both cache categories.
    pub fn total_input(&self) -> u64 {
        self.input_tokens + self.cache_read_input_tokens + self.cache_creation_input_tokens
    }
}

/// Per-invocation outcome handed from the invoker to the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// 0 = unknown.
    pub context_window: u64,
    /// A compact-boundary event appeared in the stream.
    pub compaction: bool,
    pub is_error: bool,
    /// Failure detail when `is_error` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageSnapshot {
    /// Zero-usage error snapshot. Invocation failure is a normal cycle
    /// outcome, never a propagated exception.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
