//! Gemini CLI adapter.
//!
//! Permission modes are translated to Gemini's `--approval-mode` values,
//! and the comma/space tool list expands to repeated `--allowed-tools`
//! flags.

use crate::traits::{CliCapabilities, InvocationRequest, ModelCli};
use ap_domain::config::{AgentConfig, ProviderKind};

pub struct GeminiCli {
    model: Option<String>,
    allowed_tools: Option<String>,
    permission_mode: Option<String>,
}

impl GeminiCli {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            allowed_tools: cfg.allowed_tools.clone(),
            permission_mode: cfg.permission_mode.clone(),
        }
    }
}

fn approval_mode(permission_mode: &str) -> &str {
    match permission_mode {
        "bypassPermissions" => "yolo",
        "acceptEdits" => "auto_edit",
        other => other,
    }
}

impl ModelCli for GeminiCli {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn program(&self) -> &str {
        "gemini"
    }

    fn args(&self, req: &InvocationRequest) -> Vec<String> {
        let mut args = vec![
            "--prompt".to_string(),
            req.prompt.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ];
        if req.resume {
            args.push("--resume".to_string());
            args.push("latest".to_string());
        }
        if let Some(mode) = &self.permission_mode {
            args.push("--approval-mode".to_string());
            args.push(approval_mode(mode).to_string());
        }
        if let Some(tools) = &self.allowed_tools {
            for tool in tools.replace(',', " ").split_whitespace() {
                args.push("--allowed-tools".to_string());
                args.push(tool.to_string());
            }
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }

    fn capabilities(&self) -> CliCapabilities {
        CliCapabilities {
            supports_resume: true,
            emits_result_event: false,
        }
    }

    fn guardrails(&self, agent: &str) -> String {
        [
            format!("CRITICAL IDENTITY: You are {agent}. Not any other name. You are {agent}."),
            format!(
                "When running comms commands, always use --agent {agent}. \
                 Never substitute another name."
            ),
            String::new(),
            "EXECUTION DISCIPLINE:".to_string(),
            "- Run ONLY the commands listed. Do not explore, search, or investigate on your own."
                .to_string(),
            "- After completing the listed commands, STOP. Do not look for tasks, read files, \
             or take initiative."
                .to_string(),
            "- Wait for messages to arrive via the polling loop. You will be invoked again \
             when there is work."
                .to_string(),
            "- One response = one task. No chaining, no speculative exploration.".to_string(),
        ]
        .join("\n")
    }

    fn resume_label(&self) -> &str {
        "gemini --resume latest"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_args_carry_prompt_and_format() {
        let cli = GeminiCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest::fresh("hello"));
        assert_eq!(
            args,
            vec!["--prompt", "hello", "--output-format", "stream-json"]
        );
    }

    #[test]
    fn resume_targets_latest_session() {
        let cli = GeminiCli::from_config(&AgentConfig::default());
        let args = cli.args(&InvocationRequest {
            prompt: "p".into(),
            resume: true,
        });
        assert_eq!(args[4..6], ["--resume", "latest"]);
    }

    #[test]
    fn permission_mode_maps_to_approval_mode() {
        let cfg = AgentConfig {
            permission_mode: Some("bypassPermissions".into()),
            ..AgentConfig::default()
        };
        let cli = GeminiCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest::fresh("p"));
        assert_eq!(args[4..6], ["--approval-mode", "yolo"]);

        assert_eq!(approval_mode("acceptEdits"), "auto_edit");
        assert_eq!(approval_mode("plan"), "plan");
    }

    #[test]
    fn tool_list_expands_to_repeated_flags() {
        let cfg = AgentConfig {
            allowed_tools: Some("run_shell_command, read_file".into()),
            ..AgentConfig::default()
        };
        let cli = GeminiCli::from_config(&cfg);
        let args = cli.args(&InvocationRequest::fresh("p"));
        assert_eq!(
            args[4..8],
            ["--allowed-tools", "run_shell_command", "--allowed-tools", "read_file"]
        );
    }
}
