//! Adapter selection.

use crate::claude::ClaudeCli;
use crate::codex::CodexCli;
use crate::gemini::GeminiCli;
use crate::opencode::OpencodeCli;
use crate::traits::ModelCli;
use ap_domain::config::{AgentConfig, ProviderKind};

/// Build the CLI adapter for an agent's configured provider.
pub fn cli_for(cfg: &AgentConfig) -> Box<dyn ModelCli> {
    match cfg.provider {
        ProviderKind::Claude => Box::new(ClaudeCli::from_config(cfg)),
        ProviderKind::Codex => Box::new(CodexCli::from_config(cfg)),
        ProviderKind::Gemini => Box::new(GeminiCli::from_config(cfg)),
        ProviderKind::Opencode => Box::new(OpencodeCli::from_config(cfg)),
    }
}
