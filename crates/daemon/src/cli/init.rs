//! Starter config scaffolding.

use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = r#"# Apiary configuration.
#
# Each [agents.<name>] entry runs as its own daemon process under
# `apiary start`. Agents coordinate through the comms service named
# below; its poll script blocks until messages arrive.

# Directory the model CLIs run in (defaults to the current directory).
# project_dir = "~/work/my-project"

[comms]
# poll_script = "~/.hive-comms/poll.sh"
# service = "hive-comms"
# poll_interval_sec = 5
# poll_timeout_sec = 30

[agents.lead]
role = "lead"
provider = "claude"
system = """
You are lead, the coordinating agent of this swarm.
ON STARTUP:
  1. Register with hive-comms as 'lead'.
  2. Check your inbox for pending work.
  Then wait for incoming messages.
"""
# model = "opus"
# allowed_tools = "Bash,Read,Edit,Write"
# permission_mode = "acceptEdits"

[agents.builder]
provider = "codex"
system = """
You are builder. You implement the tasks lead assigns.
ON STARTUP:
  1. Register with hive-comms as 'builder'.
  Then report ready to lead.
"""
# max_history_tokens = 100000
# no_output_timeout_sec = 600
# retry_backoff_sec = 30
# retry_backoff_max_sec = 300
"#;

/// Write the starter config to the default (or `APIARY_CONFIG`) path.
pub fn init(force: bool) -> anyhow::Result<()> {
    let path = PathBuf::from(crate::cli::config_path());
    init_at(&path, force)?;

    eprintln!();
    eprintln!("  Apiary config written to {}", path.display());
    eprintln!();
    eprintln!("  Next steps:");
    eprintln!("    1. Edit the agent definitions and system prompts.");
    eprintln!("    2. Run `apiary config validate` to check the result.");
    eprintln!("    3. Run `apiary start` to launch the swarm.");
    eprintln!();

    Ok(())
}

// Path-parameterised for testability.
fn init_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ap_domain::config::ProviderKind;
    use ap_domain::Config;

    #[test]
    fn template_parses_into_a_valid_config() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.agents.len(), 2);

        let lead = config.agent("lead").unwrap();
        assert_eq!(lead.role, "lead");
        assert_eq!(lead.provider, ProviderKind::Claude);
        assert!(lead.system.contains("ON STARTUP"));

        let builder = config.agent("builder").unwrap();
        assert_eq!(builder.role, "coder");
        assert_eq!(builder.provider, ProviderKind::Codex);

        assert!(config.validate().is_empty());
    }

    #[test]
    fn writes_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("apiary.toml");

        init_at(&path, false).unwrap();
        assert!(path.exists());

        let second = init_at(&path, false);
        assert!(second.is_err());

        // Force replaces the file.
        std::fs::write(&path, "mangled").unwrap();
        init_at(&path, true).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[agents.lead]"));
    }
}
