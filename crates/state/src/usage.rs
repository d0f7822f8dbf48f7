//! Session usage ledger.
//!
//! Token accounting is reporting-only: nothing in the daemon gates on
//! these numbers, they exist so an operator can see how much window an
//! agent has burned through.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ap_domain::stream::UsageSnapshot;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session usage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cumulative token totals for one daemon process lifetime.
///
/// Reset at process start, never persisted across restarts. Only
/// successful invocations contribute.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Last observed context window. 0 = never observed.
    pub context_window: u64,
}

impl SessionUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Estimated tokens left before the context window fills.
    /// `None` until a context window has been observed.
    pub fn remaining_tokens(&self) -> Option<u64> {
        if self.context_window == 0 {
            return None;
        }
        Some(self.context_window.saturating_sub(self.input_tokens))
    }

    /// Remaining capacity as a whole percentage of the context window.
    pub fn capacity_pct(&self) -> Option<u8> {
        let remaining = self.remaining_tokens()?;
        Some((remaining * 100 / self.context_window).min(100) as u8)
    }
}

/// Sink receiving usage after every successful invocation.
pub trait UsageSink: Send + Sync {
    fn report(&self, agent: &str, totals: &SessionUsage, last: &UsageSnapshot);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File-backed ledger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The on-disk shape of one agent's usage file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub agent: String,
    pub updated_at: DateTime<Utc>,
    pub session: SessionUsage,
    /// Per-cycle delta from the most recent invocation.
    pub last: UsageSnapshot,
    #[serde(default)]
    pub remaining_tokens: Option<u64>,
    #[serde(default)]
    pub capacity_pct: Option<u8>,
}

/// Usage ledger keeping one JSON file per agent under `<state>/usage/`.
pub struct FileUsageLedger {
    usage_dir: PathBuf,
}

impl FileUsageLedger {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            usage_dir: state_dir.into().join("usage"),
        }
    }

    pub fn record_path(&self, agent: &str) -> PathBuf {
        self.usage_dir.join(format!("{agent}.json"))
    }

    /// Read an agent's last usage record. `None` when missing or
    /// unreadable.
    pub fn load(&self, agent: &str) -> Option<UsageRecord> {
        let raw = std::fs::read_to_string(self.record_path(agent)).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

impl UsageSink for FileUsageLedger {
    fn report(&self, agent: &str, totals: &SessionUsage, last: &UsageSnapshot) {
        let record = UsageRecord {
            agent: agent.to_string(),
            updated_at: Utc::now(),
            session: *totals,
            last: last.clone(),
            remaining_tokens: totals.remaining_tokens(),
            capacity_pct: totals.capacity_pct(),
        };
        let path = self.record_path(agent);
        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.usage_dir)?;
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(&path, json)
        };
        if let Err(e) = write() {
            tracing::warn!(
                agent = %agent,
                path = %path.display(),
                error = %e,
                "failed to write usage record"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
