//! Graceful daemon shutdown with SIGKILL escalation.

use std::time::{Duration, Instant};

use ap_domain::Config;

use crate::cli::{pid, resolve_targets};

/// How long a daemon gets to exit after SIGTERM before SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub fn stop(config: &Config, agent: Option<&str>) -> anyhow::Result<()> {
    for name in resolve_targets(config, agent)? {
        let pid_path = config.pid_path(&name);
        let Some(target) = pid::read_pid(&pid_path) else {
            println!("{name}: not running");
            continue;
        };
        if !pid::alive(target) {
            let _ = std::fs::remove_file(&pid_path);
            println!("{name}: not running (stale PID file removed)");
            continue;
        }

        pid::terminate_group(target);
        let deadline = Instant::now() + STOP_GRACE;
        while pid::alive(target) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(200));
        }

        if pid::alive(target) {
            pid::kill_group(target);
            println!(
                "{name}: killed after {}s grace (pid {target})",
                STOP_GRACE.as_secs()
            );
        } else {
            println!("{name}: stopped (pid {target})");
        }
        let _ = std::fs::remove_file(&pid_path);
    }

    Ok(())
}
