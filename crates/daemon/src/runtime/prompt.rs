//! Prompt assembly.
//!
//! Every invocation gets a stitched prompt: the agent's system text, the
//! comms protocol, optional recovered history, the daemon rules, and the
//! cycle instruction. Boot keeps the ON STARTUP block; later cycles
//! strip it so the agent does not re-register on every message.

use regex::Regex;

use ap_domain::config::AgentConfig;

const HISTORY_HEADER: &str =
    "════════════════════ RECENT HISTORY (rolling buffer) ════════════════════";
const HISTORY_DIVIDER: &str =
    "══════════════════════════════════════════════════════════════════════════";
const HISTORY_FOOTER: &str =
    "═══════════════════════ END RECENT HISTORY ═════════════════════════════";

pub struct PromptBuilder {
    agent: String,
    role: String,
    system: String,
    service: String,
    /// Provider-specific discipline lines, empty for CLIs that behave.
    guardrails: String,
    on_startup: Regex,
}

impl PromptBuilder {
    pub fn new(agent: &str, cfg: &AgentConfig, service: &str, guardrails: String) -> Self {
        let system = if cfg.system.trim().is_empty() {
            format!(
                "You are {agent} ({role}), an autonomous agent coordinating \
                 through {service}.",
                role = cfg.role
            )
        } else {
            cfg.system.trim().to_string()
        };

        Self {
            agent: agent.to_string(),
            role: cfg.role.clone(),
            system,
            service: service.to_string(),
            guardrails,
            on_startup: Regex::new(
                r"ON STARTUP[^\n]*\n(?:[ \t]+\d+\..*\n)*(?:[ \t]+Then .*\n?)?",
            )
            .expect("on-startup pattern compiles"),
        }
    }

    /// Prompt for the very first invocation: the agent registers itself
    /// and runs its ON STARTUP instructions.
    pub fn boot_prompt(&self) -> String {
        let sections = [
            self.system.clone(),
            self.protocol_section(),
            self.rules_section(),
            "BOOT: You just started. Execute your ON STARTUP instructions now.".to_string(),
            self.guardrails.clone(),
        ];
        join_sections(&sections)
    }

    /// Prompt for a work cycle, with recovered history attached when the
    /// previous cycle saw a compaction.
    pub fn cycle_prompt(&self, history: Option<&str>) -> String {
        let mut sections = vec![self.stripped_system(), self.protocol_section()];

        if let Some(snapshot) = history {
            if !snapshot.is_empty() {
                sections.push(self.history_block(snapshot));
            }
        }

        sections.push(self.rules_section());
        sections.push(format!(
            "You have new messages. Check your {service} inbox (check_inbox), \
             read and process all messages, then send results via {service} \
             send when done. Do NOT re-register — you are already registered.",
            service = self.service
        ));
        sections.push(self.guardrails.clone());
        join_sections(&sections)
    }

    // ── sections ────────────────────────────────────────────────────

    /// System text with the ON STARTUP block removed. Boot already ran
    /// it; repeating it makes agents re-register and re-check the inbox
    /// in loops.
    fn stripped_system(&self) -> String {
        self.on_startup.replace_all(&self.system, "").trim().to_string()
    }

    fn protocol_section(&self) -> String {
        let service = &self.service;
        [
            "Mandatory pre-task protocol (all agents):".to_string(),
            format!("- Use {service} for all inter-agent communication."),
            format!("- Check inbox via {service} check_inbox before starting work."),
            format!("- Send results via {service} send when done."),
        ]
        .join("\n")
    }

    fn rules_section(&self) -> String {
        let service = &self.service;
        let mut lines = vec![
            "Autonomous daemon rules:".to_string(),
            "- Do not use AskUserQuestion.".to_string(),
            format!("- Route questions to lead via {service} send."),
            "- Execute exactly the incoming task.".to_string(),
            "- Send one summary message when done.".to_string(),
            "- Task governance: lead manages task queue and assignment ownership.".to_string(),
        ];

        if self.role == "lead" {
            lines.extend([
                "- As lead: create and maintain tasks.".to_string(),
                "- As lead: define scope and acceptance criteria.".to_string(),
                "- As lead: ask domain owners to update technical details based on direct work."
                    .to_string(),
                "- As lead: after a task completes, review and assign the next task.".to_string(),
            ]);
        } else {
            lines.extend([
                "- Non-lead agents: execute assigned tasks, report results.".to_string(),
                "- If you discover new ideas, send them to lead.".to_string(),
            ]);
        }

        lines.join("\n")
    }

    fn history_block(&self, snapshot: &str) -> String {
        [
            HISTORY_HEADER,
            "The following is your captured stream-json history from before compaction.",
            "Use it to restore recent context and avoid redoing completed work.",
            HISTORY_DIVIDER,
            snapshot,
            HISTORY_FOOTER,
        ]
        .join("\n")
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }
}

fn join_sections(sections: &[String]) -> String {
    sections
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
