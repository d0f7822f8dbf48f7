//! Per-agent status records.
//!
//! The daemon publishes one record after every lifecycle transition so
//! external tooling (the `status` command, a supervisor) can inspect
//! agent health without talking to the process.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle states visible to external observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    Idle,
    Working,
    Error,
    Stopped,
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DaemonStatus::Idle => "idle",
            DaemonStatus::Working => "working",
            DaemonStatus::Error => "error",
            DaemonStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// One agent's externally visible state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub agent: String,
    pub provider: String,
    pub pid: u32,
    pub status: DaemonStatus,
    pub updated_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    /// The provider has a completed session that can be resumed.
    pub resume_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Sink the daemon publishes status records to after every transition.
///
/// Publishing is observability, not control flow: implementations log
/// write failures instead of surfacing them, so a full disk cannot kill
/// a work cycle.
pub trait StatusSink: Send + Sync {
    fn publish(&self, record: &StatusRecord);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File-backed store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status store keeping one JSON file per agent under the state dir.
pub struct FileStatusStore {
    state_dir: PathBuf,
}

impl FileStatusStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn record_path(&self, agent: &str) -> PathBuf {
        self.state_dir.join(format!("{agent}.json"))
    }

    /// Read an agent's last published record. `None` when the file is
    /// missing or unreadable.
    pub fn load(&self, agent: &str) -> Option<StatusRecord> {
        let raw = std::fs::read_to_string(self.record_path(agent)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Whether the previous daemon run left a resumable session behind.
    /// Missing or corrupt records read as `false`.
    pub fn load_resume_ready(&self, agent: &str) -> bool {
        self.load(agent).map(|r| r.resume_ready).unwrap_or(false)
    }
}

impl StatusSink for FileStatusStore {
    fn publish(&self, record: &StatusRecord) {
        let path = self.record_path(&record.agent);
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.state_dir)?;
            let json = serde_json::to_string_pretty(record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(&path, json)
        };
        if let Err(e) = write() {
            tracing::warn!(
                agent = %record.agent,
                path = %path.display(),
                error = %e,
                "failed to publish status record"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
