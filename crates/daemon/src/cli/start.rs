//! Background launcher for agent daemons.

use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use ap_domain::Config;

use crate::cli::{pid, resolve_targets};

/// Spawn a detached `apiary run <agent>` per target, appending the
/// daemon's output to the agent log.
pub fn start(config: &Config, config_path: &str, agent: Option<&str>) -> anyhow::Result<()> {
    let targets = resolve_targets(config, agent)?;
    config.ensure_runtime_dirs()?;
    let exe = std::env::current_exe()?;

    for name in targets {
        let pid_path = config.pid_path(&name);
        if let Some(existing) = pid::read_pid(&pid_path) {
            if pid::alive(existing) {
                println!("{name}: already running (pid {existing})");
                continue;
            }
            // Leftover from an unclean shutdown.
            let _ = std::fs::remove_file(&pid_path);
        }

        let log_path = config.log_path(&name);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| anyhow::anyhow!("opening {}: {e}", log_path.display()))?;

        let child = Command::new(&exe)
            .arg("run")
            .arg(&name)
            .env("APIARY_CONFIG", config_path)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log)
            // Own process group, so `stop` can take down the daemon and
            // any model CLI it is streaming from together.
            .process_group(0)
            .spawn()
            .map_err(|e| anyhow::anyhow!("spawning daemon for {name}: {e}"))?;

        // The daemon rewrites this file under a lock once it is up;
        // writing it here covers a `status` call in between.
        std::fs::write(&pid_path, format!("{}\n", child.id()))?;
        println!(
            "{name}: started (pid {}, log {})",
            child.id(),
            log_path.display()
        );
    }

    Ok(())
}
