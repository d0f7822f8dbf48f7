use ap_domain::config::ProviderKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / capability types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One model-CLI invocation as the daemon requests it.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    /// Fully assembled prompt text.
    pub prompt: String,
    /// Continue the CLI's most recent session instead of starting fresh.
    /// Ignored by adapters that cannot resume.
    pub resume: bool,
}

impl InvocationRequest {
    pub fn fresh(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resume: false,
        }
    }

    pub fn resume(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            resume: true,
        }
    }
}

/// Static facts about a CLI's wire behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliCapabilities {
    /// The CLI can pick up its most recent session with a resume flag.
    pub supports_resume: bool,
    /// The stream ends with a terminal `result` event carrying usage.
    /// When false, a zero exit code alone counts as success and usage
    /// is unavailable.
    pub emits_result_event: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core adapter trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every model-CLI adapter implements.
///
/// Adapters are pure argv builders. The daemon owns process spawning,
/// stream consumption, and timeouts; adapters only know one CLI's flag
/// surface and quirks.
pub trait ModelCli: Send + Sync {
    /// Which provider family this adapter drives.
    fn kind(&self) -> ProviderKind;

    /// The program to execute (resolved through `PATH`).
    fn program(&self) -> &str;

    /// Arguments for one invocation, prompt included.
    fn args(&self, req: &InvocationRequest) -> Vec<String>;

    /// Wire behavior of this CLI.
    fn capabilities(&self) -> CliCapabilities;

    /// Extra discipline lines appended to every prompt. Empty for CLIs
    /// that follow the protocol prompt without reinforcement.
    fn guardrails(&self, _agent: &str) -> String {
        String::new()
    }

    /// Short human label for the resume form, used in logs when a resume
    /// attempt falls back to a fresh session.
    fn resume_label(&self) -> &str {
        ""
    }
}
