//! Agent status table, read from the runtime state dir.

use ap_domain::Config;
use ap_state::{DaemonStatus, FileStatusStore, FileUsageLedger};

use crate::cli::pid;

pub fn status(config: &Config, config_path: &str) -> anyhow::Result<()> {
    if config.agents.is_empty() {
        println!("no agents configured in {config_path}");
        return Ok(());
    }

    let store = FileStatusStore::new(config.state_dir());
    let ledger = FileUsageLedger::new(config.state_dir());
    let mut names: Vec<&String> = config.agents.keys().collect();
    names.sort();

    println!(
        "{:<12} {:<9} {:<8} {:<8} {:>8} {:<20} {:>8}  {}",
        "AGENT", "PROVIDER", "PID", "STATUS", "FAILURES", "UPDATED", "CTX LEFT", "LAST ERROR"
    );

    for name in names {
        match store.load(name) {
            Some(record) => {
                let running = pid::alive(record.pid);
                // A record claiming a live state for a gone process
                // means the daemon crashed without publishing stopped.
                let shown_status = if running || record.status == DaemonStatus::Stopped {
                    record.status.to_string()
                } else {
                    "dead".to_string()
                };
                let ctx_left = ledger
                    .load(name)
                    .and_then(|u| u.capacity_pct)
                    .map(|pct| format!("{pct}%"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<12} {:<9} {:<8} {:<8} {:>8} {:<20} {:>8}  {}",
                    name,
                    record.provider,
                    if running {
                        record.pid.to_string()
                    } else {
                        "-".into()
                    },
                    shown_status,
                    record.consecutive_failures,
                    record.updated_at.format("%Y-%m-%d %H:%M:%S"),
                    ctx_left,
                    truncate(record.last_error.as_deref().unwrap_or("-"), 48),
                );
            }
            None => {
                let provider = config
                    .agents
                    .get(name)
                    .map(|a| a.provider.to_string())
                    .unwrap_or_default();
                println!(
                    "{:<12} {:<9} {:<8} {:<8} {:>8} {:<20} {:>8}  {}",
                    name, provider, "-", "never", 0, "-", "-", "-"
                );
            }
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
