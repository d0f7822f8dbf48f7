//! Claude Code CLI adapter.
//!
//! Emits line-delimited JSON via `--output-format stream-json`, ending in
//! a terminal `result` event with token usage and a per-model breakdown.

use crate::traits::{CliCapabilities, InvocationRequest, ModelCli};
use ap_domain::config::{AgentConfig, ProviderKind};

pub struct ClaudeCli {
    model: Option<String>,
    allowed_tools: Option<String>,
    permission_mode: Option<String>,
}

impl ClaudeCli {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            allowed_tools: cfg.allowed_tools.clone(),
            permission_mode: cfg.permission_mode.clone(),
        }
    }
}

impl ModelCli for ClaudeCli {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn program(&self) -> &str {
        "claude"
    }

    fn args(&self, req: &InvocationRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            req.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        // No --continue: agents share one project dir, so it would pick up
        // whichever session last wrote. History rides in the prompt instead.
        if let Some(tools) = &self.allowed_tools {
            args.push("--allowed-tools".to_string());
            args.push(tools.clone());
        }
        if let Some(mode) = &self.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(mode.clone());
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }

    fn capabilities(&self) -> CliCapabilities {
        CliCapabilities {
            supports_resume: false,
            emits_result_event: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_args_request_stream_json() {
        let cli = ClaudeCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest::fresh("do the thing"));
        assert_eq!(
            args,
            vec!["-p", "do the thing", "--output-format", "stream-json", "--verbose"]
        );
    }

    #[test]
    fn optional_flags_append_in_order() {
        let cfg = AgentConfig {
            model: Some("claude-sonnet-4-20250514".into()),
            allowed_tools: Some("Bash,Read,Edit".into()),
            permission_mode: Some("acceptEdits".into()),
            ..AgentConfig::default()
        };
        let cli = ClaudeCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest::fresh("p"));
        assert_eq!(
            args[5..],
            [
                "--allowed-tools",
                "Bash,Read,Edit",
                "--permission-mode",
                "acceptEdits",
                "--model",
                "claude-sonnet-4-20250514",
            ]
        );
    }

    #[test]
    fn resume_flag_is_ignored() {
        let cli = ClaudeCli::from_config(&AgentConfig::default());
        let fresh = cli.args(&InvocationRequest::fresh("p"));
        let resumed = cli.args(&InvocationRequest {
            prompt: "p".into(),
            resume: true,
        });
        assert_eq!(fresh, resumed);
        assert!(!cli.capabilities().supports_resume);
    }
}
