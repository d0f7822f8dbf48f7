//! OpenAI Codex CLI adapter.

use crate::traits::{CliCapabilities, InvocationRequest, ModelCli};
use ap_domain::config::{AgentConfig, ProviderKind};

pub struct CodexCli {
    model: Option<String>,
    permission_mode: Option<String>,
}

impl CodexCli {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            permission_mode: cfg.permission_mode.clone(),
        }
    }
}

impl ModelCli for CodexCli {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn program(&self) -> &str {
        "codex"
    }

    fn args(&self, req: &InvocationRequest) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if req.resume {
            args.push("resume".to_string());
            args.push("--last".to_string());
        }
        args.push("--json".to_string());
        if self.permission_mode.as_deref() == Some("bypassPermissions") {
            args.push("-c".to_string());
            args.push(r#"sandbox_permissions=["disk-full-read-access"]"#.to_string());
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(req.prompt.clone());
        args
    }

    fn capabilities(&self) -> CliCapabilities {
        CliCapabilities {
            supports_resume: true,
            emits_result_event: false,
        }
    }

    fn guardrails(&self, agent: &str) -> String {
        format!(
            "You are {agent}. Run only the commands listed, then stop.\n\
             Do not explore the codebase or take initiative beyond the task."
        )
    }

    fn resume_label(&self) -> &str {
        "codex resume --last"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_invocation_uses_exec_json() {
        let cli = CodexCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest::fresh("summarize inbox"));
        assert_eq!(args, vec!["exec", "--json", "summarize inbox"]);
    }

    #[test]
    fn resume_inserts_resume_last_before_json() {
        let cli = CodexCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest {
            prompt: "p".into(),
            resume: true,
        });
        assert_eq!(args, vec!["exec", "resume", "--last", "--json", "p"]);
    }

    #[test]
    fn bypass_permissions_widens_sandbox() {
        let cfg = AgentConfig {
            permission_mode: Some("bypassPermissions".into()),
            ..AgentConfig::default()
        };
        let cli = CodexCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest::fresh("p"));
        assert!(args.contains(&"-c".to_string()));
        assert!(args
            .iter()
            .any(|a| a.contains("disk-full-read-access")));
    }

    #[test]
    fn prompt_is_last_argument() {
        let cfg = AgentConfig {
            model: Some("o4-mini".into()),
            ..AgentConfig::default()
        };
        let cli = CodexCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest::fresh("the prompt"));
        assert_eq!(args.last().map(String::as_str), Some("the prompt"));
        assert_eq!(args[args.len() - 3..args.len() - 1], ["--model", "o4-mini"]);
    }
}
