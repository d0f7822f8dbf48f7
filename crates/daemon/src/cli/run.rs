//! Foreground daemon runner, the target process of `apiary start`.

use tokio_util::sync::CancellationToken;

use ap_domain::Config;

use crate::cli::pid;
use crate::runtime::AgentDaemon;

/// Run one agent's daemon until a signal or a dismissed poll stops it.
pub async fn run(config: Config, agent: &str) -> anyhow::Result<()> {
    let script = config.resolve_poll_script();
    if !script.exists() {
        anyhow::bail!(
            "poll script not found at {} (install the comms service first)",
            script.display()
        );
    }
    config.ensure_runtime_dirs()?;

    let stop = CancellationToken::new();
    let mut daemon = AgentDaemon::new(&config, agent, stop.clone())?;

    // Lock held for the daemon's lifetime; a second `run` for the same
    // agent fails here instead of double-polling the mailbox.
    let pid_path = config.pid_path(agent);
    let pid_handle = pid::write_pid_file(&pid_path)?;

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_stop.cancel();
    });

    daemon.run().await;

    pid::remove_pid_file(&pid_path, pid_handle);
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
