//! Inbox polling.
//!
//! Wraps the comms service's poll script in a bounded blocking call and
//! classifies its exit into the three outcomes the daemon acts on. Poll
//! hiccups never feed the failure counter; a flaky mailbox idles the
//! agent instead of backing it off.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ap_domain::config::Config;

/// Pause after a failed poll-script spawn so a missing script cannot
/// spin the loop hot.
const SPAWN_FAILURE_PAUSE: Duration = Duration::from_secs(5);

/// Outcome of one bounded poll against the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Messages are waiting.
    Work,
    /// Nothing arrived within the timeout. The expected idle outcome.
    NoWork,
    /// A coordinating party told this agent to stand down.
    Dismissed,
}

/// The daemon's view of the external mailbox.
#[async_trait::async_trait]
pub trait Mailbox: Send + Sync {
    async fn poll(&self) -> PollOutcome;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Script-backed poller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Polls by running `bash <script> <agent> --interval <i> --timeout <t>`.
///
/// Script exit codes: 0 = messages waiting, 1 = none within the timeout,
/// 3 = dismissed. Anything else is logged and read as no-work.
pub struct InboxPoller {
    script: PathBuf,
    agent: String,
    interval_sec: u64,
    timeout_sec: u64,
    stop: CancellationToken,
}

impl InboxPoller {
    pub fn new(config: &Config, agent: &str, stop: CancellationToken) -> Self {
        Self {
            script: config.resolve_poll_script(),
            agent: agent.to_string(),
            interval_sec: config.comms.poll_interval_sec,
            timeout_sec: config.comms.poll_timeout_sec,
            stop,
        }
    }

    pub fn script_path(&self) -> &PathBuf {
        &self.script
    }
}

#[async_trait::async_trait]
impl Mailbox for InboxPoller {
    async fn poll(&self) -> PollOutcome {
        let child = tokio::process::Command::new("bash")
            .arg(&self.script)
            .arg(&self.agent)
            .arg("--interval")
            .arg(self.interval_sec.to_string())
            .arg("--timeout")
            .arg(self.timeout_sec.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Dropping the future on cancellation must reap the script.
            .kill_on_drop(true)
            .status();

        let status = tokio::select! {
            status = child => status,
            _ = self.stop.cancelled() => return PollOutcome::NoWork,
        };

        match status {
            Ok(status) => match status.code() {
                Some(0) => PollOutcome::Work,
                Some(1) => PollOutcome::NoWork,
                Some(3) => PollOutcome::Dismissed,
                code => {
                    tracing::warn!(agent = %self.agent, ?code, "unexpected poll script exit");
                    PollOutcome::NoWork
                }
            },
            Err(e) => {
                tracing::warn!(
                    agent = %self.agent,
                    script = %self.script.display(),
                    error = %e,
                    "failed to run poll script"
                );
                tokio::select! {
                    _ = tokio::time::sleep(SPAWN_FAILURE_PAUSE) => {}
                    _ = self.stop.cancelled() => {}
                }
                PollOutcome::NoWork
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn poller_for_script(dir: &std::path::Path, body: &str) -> InboxPoller {
        let script = dir.join("poll.sh");
        let mut f = std::fs::File::create(&script).unwrap();
        writeln!(f, "#!/usr/bin/env bash\n{body}").unwrap();

        let mut config = Config {
            project_dir: Some(dir.to_path_buf()),
            ..Config::default()
        };
        config.comms.poll_script = script;
        config.comms.poll_timeout_sec = 1;
        InboxPoller::new(&config, "builder", CancellationToken::new())
    }

    #[tokio::test]
    async fn exit_zero_means_work() {
        let dir = tempfile::tempdir().unwrap();
        let poller = poller_for_script(dir.path(), "exit 0");
        assert_eq!(poller.poll().await, PollOutcome::Work);
    }

    #[tokio::test]
    async fn exit_one_means_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let poller = poller_for_script(dir.path(), "exit 1");
        assert_eq!(poller.poll().await, PollOutcome::NoWork);
    }

    #[tokio::test]
    async fn exit_three_means_dismissed() {
        let dir = tempfile::tempdir().unwrap();
        let poller = poller_for_script(dir.path(), "exit 3");
        assert_eq!(poller.poll().await, PollOutcome::Dismissed);
    }

    #[tokio::test]
    async fn unknown_exit_is_read_as_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let poller = poller_for_script(dir.path(), "exit 7");
        assert_eq!(poller.poll().await, PollOutcome::NoWork);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_long_poll() {
        let dir = tempfile::tempdir().unwrap();
        let mut poller = poller_for_script(dir.path(), "sleep 30");
        let stop = CancellationToken::new();
        poller.stop = stop.clone();

        let start = std::time::Instant::now();
        let handle = tokio::spawn(async move { poller.poll().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.cancel();

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, PollOutcome::NoWork);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn poll_passes_agent_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        // Record argv, then report no work.
        let body = format!("echo \"$@\" > {}/argv.txt\nexit 1", dir.path().display());
        let poller = poller_for_script(dir.path(), &body);
        assert_eq!(poller.poll().await, PollOutcome::NoWork);

        let argv = std::fs::read_to_string(dir.path().join("argv.txt")).unwrap();
        assert_eq!(argv.trim(), "builder --interval 5 --timeout 1");
    }
}
