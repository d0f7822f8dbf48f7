mod agent;
mod comms;

pub use agent::*;
pub use comms::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runtime subdirectory created under the project dir.
const RUNTIME_DIR_NAME: &str = ".apiary";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory agents operate in (model CLIs run with this as cwd).
    /// Defaults to the current directory. Supports `~` expansion.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,
    #[serde(default)]
    pub comms: CommsConfig,
    /// Agent definitions (key = agent name).
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

impl Config {
    /// Look up an agent definition. A missing agent is fatal at daemon
    /// construction, not something to retry.
    pub fn agent(&self, name: &str) -> Result<&AgentConfig> {
        self.agents
            .get(name)
            .ok_or_else(|| Error::UnknownAgent(name.to_string()))
    }

    /// The effective project directory, `~`-expanded, falling back to the
    /// current directory.
    pub fn resolve_project_dir(&self) -> PathBuf {
        match &self.project_dir {
            Some(p) => expand_tilde(p),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// The `~`-expanded poll script path.
    pub fn resolve_poll_script(&self) -> PathBuf {
        expand_tilde(&self.comms.poll_script)
    }

    // ── runtime directory layout ────────────────────────────────────

    pub fn runtime_dir(&self) -> PathBuf {
        self.resolve_project_dir().join(RUNTIME_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.runtime_dir().join("logs")
    }

    pub fn pids_dir(&self) -> PathBuf {
        self.runtime_dir().join("pids")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.runtime_dir().join("state")
    }

    pub fn log_path(&self, agent: &str) -> PathBuf {
        self.logs_dir().join(format!("{agent}.log"))
    }

    pub fn pid_path(&self, agent: &str) -> PathBuf {
        self.pids_dir().join(format!("{agent}.pid"))
    }

    /// Create the runtime directories if missing.
    pub fn ensure_runtime_dirs(&self) -> Result<()> {
        for dir in [self.logs_dir(), self.pids_dir(), self.state_dir()] {
            std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.agents.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents".into(),
                message: "no agents defined".into(),
            });
        }

        if self.comms.poll_timeout_sec == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "comms.poll_timeout_sec".into(),
                message: "poll timeout must be greater than 0".into(),
            });
        }

        for (name, agent) in &self.agents {
            if agent.history_chars_per_token == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{name}.history_chars_per_token"),
                    message: "must be greater than 0".into(),
                });
            }
            if agent.max_history_tokens == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("agents.{name}.max_history_tokens"),
                    message: "history buffer disabled (capacity 0)".into(),
                });
            }
            if agent.retry_backoff_sec == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{name}.retry_backoff_sec"),
                    message: "base backoff must be greater than 0".into(),
                });
            }
            if agent.retry_backoff_sec > agent.retry_backoff_max_sec {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("agents.{name}.retry_backoff_max_sec"),
                    message: "max backoff is below the base backoff".into(),
                });
            }
            if agent.system.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("agents.{name}.system"),
                    message: "no system prompt; a minimal default will be used".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
