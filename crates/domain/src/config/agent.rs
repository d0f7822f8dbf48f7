use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for one agent identity.
///
/// Each agent runs as its own daemon process with its own system prompt,
/// model CLI, history budget, and retry policy. Immutable for the daemon's
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Role label used in prompt assembly. `lead` gets the task-governance
    /// rules; everything else gets the worker rules.
    #[serde(default = "d_role")]
    pub role: String,
    /// Which model CLI this agent invokes.
    #[serde(default)]
    pub provider: ProviderKind,
    /// System prompt text. When empty, a minimal default is synthesized
    /// from the agent name and role.
    #[serde(default)]
    pub system: String,
    /// Tool allow-list passed through to the model CLI (provider syntax).
    #[serde(default)]
    pub allowed_tools: Option<String>,
    /// Permission mode passed through to the model CLI.
    #[serde(default)]
    pub permission_mode: Option<String>,
    /// Model identifier override. When `None`, the CLI uses its default.
    #[serde(default)]
    pub model: Option<String>,
    /// History recall budget in token-equivalent units. The rolling buffer
    /// holds `max_history_tokens * history_chars_per_token` characters.
    #[serde(default = "d_history_tokens")]
    pub max_history_tokens: u64,
    /// Approximate characters per token used to size the rolling buffer.
    /// A sizing heuristic, not a tokenizer.
    #[serde(default = "d_chars_per_token")]
    pub history_chars_per_token: u64,
    /// Kill an invocation that produces no output for this long.
    #[serde(default = "d_no_output_timeout")]
    pub no_output_timeout_sec: u64,
    /// Base retry delay after a failed invocation (doubles per consecutive
    /// failure).
    #[serde(default = "d_backoff")]
    pub retry_backoff_sec: u64,
    /// Ceiling for the retry delay.
    #[serde(default = "d_backoff_max")]
    pub retry_backoff_max_sec: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            role: d_role(),
            provider: ProviderKind::default(),
            system: String::new(),
            allowed_tools: None,
            permission_mode: None,
            model: None,
            max_history_tokens: d_history_tokens(),
            history_chars_per_token: d_chars_per_token(),
            no_output_timeout_sec: d_no_output_timeout(),
            retry_backoff_sec: d_backoff(),
            retry_backoff_max_sec: d_backoff_max(),
        }
    }
}

impl AgentConfig {
    /// Rolling-buffer capacity in characters.
    pub fn history_capacity_chars(&self) -> usize {
        (self.max_history_tokens * self.history_chars_per_token) as usize
    }
}

/// Which model CLI an agent invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Claude,
    Codex,
    Gemini,
    Opencode,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Opencode => "opencode",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_role() -> String {
    "coder".into()
}
fn d_history_tokens() -> u64 {
    100_000
}
fn d_chars_per_token() -> u64 {
    4
}
fn d_no_output_timeout() -> u64 {
    600
}
fn d_backoff() -> u64 {
    30
}
fn d_backoff_max() -> u64 {
    300
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
