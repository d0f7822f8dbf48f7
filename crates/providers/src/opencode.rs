//! Opencode CLI adapter.

use crate::traits::{CliCapabilities, InvocationRequest, ModelCli};
use ap_domain::config::{AgentConfig, ProviderKind};

pub struct OpencodeCli {
    model: Option<String>,
}

impl OpencodeCli {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            model: cfg.model.clone(),
        }
    }
}

impl ModelCli for OpencodeCli {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Opencode
    }

    fn program(&self) -> &str {
        "opencode"
    }

    fn args(&self, req: &InvocationRequest) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        if req.resume {
            args.push("--continue".to_string());
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
        "opencode --continue"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_invocation_runs_json_format() {
        let cli = OpencodeCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest::fresh("check mail"));
        assert_eq!(args, vec!["run", "--format", "json", "check mail"]);
    }

    #[test]
    fn resume_adds_continue() {
        let cfg = AgentConfig {
            model: Some("anthropic/claude-sonnet-4".into()),
            ..AgentConfig::default()
        };
        let cli = OpencodeCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest {
            prompt: "p".into(),
            resume: true,
        });
        assert_eq!(
            args,
            vec![
                "run",
                "--format",
                "json",
                "--continue",
                "--model",
                "anthropic/claude-sonnet-4",
                "p"
            ]
        );
    }
}
