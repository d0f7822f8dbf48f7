use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Mailbox collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the external mailbox service agents poll for work.
///
/// The service is a collaborator, not part of this system: the daemon only
/// runs its poll script and reads the exit code (0 work, 1 idle timeout,
/// 3 dismissed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommsConfig {
    /// Poll script invoked once per daemon cycle as
    /// `bash <script> <agent> --interval <i> --timeout <t>`.
    /// Supports `~` expansion.
    #[serde(default = "d_poll_script")]
    pub poll_script: PathBuf,
    /// Service name referenced in prompt text (agents are told to use
    /// `<service> check_inbox` / `<service> send`).
    #[serde(default = "d_service")]
    pub service: String,
    /// Re-check interval the poll script uses internally, in seconds.
    #[serde(default = "d_interval")]
    pub poll_interval_sec: u64,
    /// Maximum time one poll call may block, in seconds.
    #[serde(default = "d_timeout")]
    pub poll_timeout_sec: u64,
}

impl Default for CommsConfig {
    fn default() -> Self {
        Self {
            poll_script: d_poll_script(),
            service: d_service(),
            poll_interval_sec: d_interval(),
            poll_timeout_sec: d_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_poll_script() -> PathBuf {
    PathBuf::from("~/.hive-comms/poll.sh")
}
fn d_service() -> String {
    "hive-comms".into()
}
fn d_interval() -> u64 {
    5
}
fn d_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comms_defaults() {
        let cfg = CommsConfig::default();
        assert_eq!(cfg.service, "hive-comms");
        assert_eq!(cfg.poll_interval_sec, 5);
        assert_eq!(cfg.poll_timeout_sec, 30);
        assert!(cfg.poll_script.to_string_lossy().ends_with("poll.sh"));
    }
}
