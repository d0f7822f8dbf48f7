//! The per-agent daemon lifecycle.
//!
//! Boot once, then loop: poll the mailbox, run one model invocation
//! when work arrives, fold the outcome into usage and the compaction
//! flag, back off on failure. Every transition publishes a status
//! record; a dismissed poll or the stop token ends the loop.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use ap_domain::config::{AgentConfig, Config};
use ap_domain::{Result, TraceEvent, UsageSnapshot};
use ap_state::{DaemonStatus, FileStatusStore, FileUsageLedger, StatusRecord, StatusSink, UsageSink};

use crate::runtime::backoff::backoff_delay;
use crate::runtime::history::RollingBuffer;
use crate::runtime::invoker::{CliInvoker, ModelRunner};
use crate::runtime::poller::{InboxPoller, Mailbox, PollOutcome};
use crate::runtime::prompt::PromptBuilder;
use crate::runtime::usage::UsageTracker;

/// Failure streak at which a trace alert goes out. Retries continue
/// regardless; acting on the streak is a supervisor's call.
const REPEATED_FAILURE_ALERT: u32 = 3;

pub struct AgentDaemon {
    agent: String,
    cfg: AgentConfig,
    prompt: PromptBuilder,
    buffer: RollingBuffer,
    tracker: UsageTracker,
    mailbox: Box<dyn Mailbox>,
    runner: Box<dyn ModelRunner>,
    status: Arc<dyn StatusSink>,
    usage_sink: Arc<dyn UsageSink>,
    stop: CancellationToken,
    /// Attach the history snapshot to the next cycle's prompt.
    reinject_next_cycle: bool,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl AgentDaemon {
    pub fn new(config: &Config, agent: &str, stop: CancellationToken) -> Result<Self> {
        let cfg = config.agent(agent)?.clone();
        let cli = ap_providers::cli_for(&cfg);
        let guardrails = cli.guardrails(agent);
        let prompt = PromptBuilder::new(agent, &cfg, &config.comms.service, guardrails);

        let store = FileStatusStore::new(config.state_dir());
        let resume_ready = store.load_resume_ready(agent);
        let runner = CliInvoker::new(agent, &cfg, cli, config.resolve_project_dir(), resume_ready);
        let mailbox = InboxPoller::new(config, agent, stop.clone());
        let ledger = FileUsageLedger::new(config.state_dir());

        Ok(Self::from_parts(
            agent,
            cfg,
            prompt,
            Box::new(mailbox),
            Box::new(runner),
            Arc::new(store),
            Arc::new(ledger),
            stop,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        agent: &str,
        cfg: AgentConfig,
        prompt: PromptBuilder,
        mailbox: Box<dyn Mailbox>,
        runner: Box<dyn ModelRunner>,
        status: Arc<dyn StatusSink>,
        usage_sink: Arc<dyn UsageSink>,
        stop: CancellationToken,
    ) -> Self {
        let buffer = RollingBuffer::new(cfg.history_capacity_chars());
        Self {
            agent: agent.to_string(),
            cfg,
            prompt,
            buffer,
            tracker: UsageTracker::new(),
            mailbox,
            runner,
            status,
            usage_sink,
            stop,
            reinject_next_cycle: false,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Run until the stop token cancels or the mailbox dismisses the
    /// agent. All invocation failures are absorbed here; this returns
    /// only when the daemon is done.
    pub async fn run(&mut self) {
        tracing::info!(
            agent = %self.agent,
            provider = %self.cfg.provider,
            resume_ready = self.runner.resume_ready(),
            "starting daemon"
        );
        TraceEvent::DaemonStarted {
            agent: self.agent.clone(),
            provider: self.cfg.provider.to_string(),
            pid: std::process::id(),
            resume_ready: self.runner.resume_ready(),
        }
        .emit();

        self.boot().await;

        while !self.stop.is_cancelled() {
            let outcome = self.mailbox.poll().await;
            if self.stop.is_cancelled() {
                break;
            }
            match outcome {
                PollOutcome::NoWork => continue,
                PollOutcome::Dismissed => {
                    tracing::info!(agent = %self.agent, "dismissed; shutting down");
                    self.stop.cancel();
                    break;
                }
                PollOutcome::Work => self.work_cycle().await,
            }
        }

        self.publish(DaemonStatus::Stopped);
        TraceEvent::DaemonStopped {
            agent: self.agent.clone(),
        }
        .emit();
        tracing::info!(agent = %self.agent, "daemon stopped");
    }

    /// One invocation with the boot prompt so the agent can register
    /// with the mailbox. Failure is logged, never fatal: the agent can
    /// still receive work afterwards.
    async fn boot(&mut self) {
        tracing::info!(agent = %self.agent, "boot: invoking agent for startup instructions");
        self.publish(DaemonStatus::Working);

        let prompt = self.prompt.boot_prompt();
        let snapshot = self.runner.invoke(&prompt, &mut self.buffer).await;
        self.note_compaction(&snapshot);

        if snapshot.is_error {
            tracing::warn!(
                agent = %self.agent,
                error = snapshot.error.as_deref().unwrap_or("unknown"),
                "boot invocation failed; continuing to poll loop"
            );
        } else {
            self.fold_usage(&snapshot);
            tracing::info!(agent = %self.agent, "boot complete");
        }

        self.publish(DaemonStatus::Idle);
    }

    async fn work_cycle(&mut self) {
        tracing::info!(agent = %self.agent, "messages detected, invoking agent");
        self.publish(DaemonStatus::Working);

        let history = self.take_history();
        let prompt = self.prompt.cycle_prompt(history.as_deref());
        let snapshot = self.runner.invoke(&prompt, &mut self.buffer).await;
        self.note_compaction(&snapshot);

        if !snapshot.is_error {
            self.fold_usage(&snapshot);
            self.consecutive_failures = 0;
            self.last_error = None;
            self.publish(DaemonStatus::Idle);
            return;
        }

        self.consecutive_failures += 1;
        self.last_error = snapshot.error.clone();
        self.publish(DaemonStatus::Error);

        if self.consecutive_failures >= REPEATED_FAILURE_ALERT {
            TraceEvent::RepeatedFailures {
                agent: self.agent.clone(),
                consecutive_failures: self.consecutive_failures,
                last_error: self.last_error.clone().unwrap_or_default(),
            }
            .emit();
        }

        let delay = backoff_delay(
            self.cfg.retry_backoff_sec,
            self.cfg.retry_backoff_max_sec,
            self.consecutive_failures,
        );
        tracing::warn!(
            agent = %self.agent,
            failure = self.consecutive_failures,
            backoff_sec = delay.as_secs(),
            error = self.last_error.as_deref().unwrap_or("unknown"),
            "invocation failed; backing off"
        );
        // Interruptible: shutdown must not wait out the backoff.
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.stop.cancelled() => {}
        }
    }

    /// Consume the reinjection flag. Cleared before the invocation
    /// starts so a crash mid-cycle cannot cause double injection.
    fn take_history(&mut self) -> Option<String> {
        if !self.reinject_next_cycle {
            return None;
        }
        self.reinject_next_cycle = false;
        if self.buffer.is_empty() {
            return None;
        }
        let snapshot = self.buffer.snapshot();
        tracing::info!(
            agent = %self.agent,
            chars = snapshot.len(),
            "re-injecting rolling history after compaction"
        );
        TraceEvent::HistoryReinjected {
            agent: self.agent.clone(),
            snapshot_chars: snapshot.len(),
        }
        .emit();
        Some(snapshot)
    }

    /// Arm reinjection for the next cycle, not the current one: at the
    /// moment of detection the buffer holds the compacted session's own
    /// tail, and the gap only matters to the cycle that follows.
    fn note_compaction(&mut self, snapshot: &UsageSnapshot) {
        if snapshot.compaction {
            self.reinject_next_cycle = true;
            tracing::info!(
                agent = %self.agent,
                "compaction boundary seen; history will be re-injected next cycle"
            );
        }
    }

    fn fold_usage(&mut self, snapshot: &UsageSnapshot) {
        self.tracker.record(snapshot);
        let session = self.tracker.session();
        self.usage_sink.report(&self.agent, &session, snapshot);
        TraceEvent::UsageRecorded {
            agent: self.agent.clone(),
            total_input_tokens: session.input_tokens,
            total_output_tokens: session.output_tokens,
            context_window: session.context_window,
        }
        .emit();
    }

    fn publish(&self, status: DaemonStatus) {
        self.status.publish(&StatusRecord {
            agent: self.agent.clone(),
            provider: self.cfg.provider.to_string(),
            pid: std::process::id(),
            status,
            updated_at: Utc::now(),
            consecutive_failures: self.consecutive_failures,
            resume_ready: self.runner.resume_ready(),
            last_error: self.last_error.clone(),
        });
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use ap_state::SessionUsage;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct FakeMailbox {
        script: Mutex<VecDeque<PollOutcome>>,
    }

    #[async_trait::async_trait]
    impl Mailbox for FakeMailbox {
        async fn poll(&self) -> PollOutcome {
            // An exhausted script dismisses so a test can never hang.
            self.script.lock().pop_front().unwrap_or(PollOutcome::Dismissed)
        }
    }

    struct FakeRunner {
        script: Mutex<VecDeque<UsageSnapshot>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl ModelRunner for FakeRunner {
        async fn invoke(&mut self, prompt: &str, buffer: &mut RollingBuffer) -> UsageSnapshot {
            self.prompts.lock().push(prompt.to_string());
            buffer.append("raw stream chunk\n");
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| UsageSnapshot::error("runner script exhausted"))
        }

        fn resume_ready(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        records: Mutex<Vec<StatusRecord>>,
    }

    impl StatusSink for RecordingStatus {
        fn publish(&self, record: &StatusRecord) {
            self.records.lock().push(record.clone());
        }
    }

    #[derive(Default)]
    struct RecordingUsage {
        reports: Mutex<Vec<(SessionUsage, UsageSnapshot)>>,
    }

    impl UsageSink for RecordingUsage {
        fn report(&self, _agent: &str, totals: &SessionUsage, last: &UsageSnapshot) {
            self.reports.lock().push((*totals, last.clone()));
        }
    }

    struct Harness {
        daemon: AgentDaemon,
        status: Arc<RecordingStatus>,
        usage: Arc<RecordingUsage>,
        prompts: Arc<Mutex<Vec<String>>>,
        stop: CancellationToken,
    }

    fn harness(polls: Vec<PollOutcome>, results: Vec<UsageSnapshot>) -> Harness {
        let cfg = AgentConfig::default();
        let prompt = PromptBuilder::new("builder", &cfg, "hive-comms", String::new());
        let status = Arc::new(RecordingStatus::default());
        let usage = Arc::new(RecordingUsage::default());
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let stop = CancellationToken::new();

        let daemon = AgentDaemon::from_parts(
            "builder",
            cfg,
            prompt,
            Box::new(FakeMailbox {
                script: Mutex::new(polls.into()),
            }),
            Box::new(FakeRunner {
                script: Mutex::new(results.into()),
                prompts: prompts.clone(),
            }),
            status.clone(),
            usage.clone(),
            stop.clone(),
        );

        Harness {
            daemon,
            status,
            usage,
            prompts,
            stop,
        }
    }

    fn ok(input: u64, output: u64) -> UsageSnapshot {
        UsageSnapshot {
            input_tokens: input,
            output_tokens: output,
            ..UsageSnapshot::default()
        }
    }

    fn compacted() -> UsageSnapshot {
        UsageSnapshot {
            compaction: true,
            ..UsageSnapshot::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_working_idle_stopped_through_a_cycle() {
        let mut h = harness(
            vec![PollOutcome::Work, PollOutcome::Dismissed],
            vec![ok(1, 1), ok(1, 1)],
        );
        h.daemon.run().await;

        let statuses: Vec<DaemonStatus> =
            h.status.records.lock().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                DaemonStatus::Working, // boot
                DaemonStatus::Idle,
                DaemonStatus::Working, // one work cycle
                DaemonStatus::Idle,
                DaemonStatus::Stopped,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn history_reinjects_on_the_cycle_after_compaction() {
        // Boot, then three work cycles: normal, compaction-flagged, normal.
        let mut h = harness(
            vec![PollOutcome::Work, PollOutcome::Work, PollOutcome::Work],
            vec![ok(0, 0), ok(0, 0), compacted(), ok(0, 0)],
        );
        h.daemon.run().await;

        let prompts = h.prompts.lock();
        assert_eq!(prompts.len(), 4);
        assert!(!prompts[1].contains("RECENT HISTORY"));
        // The cycle that produced the compaction signal still runs bare.
        assert!(!prompts[2].contains("RECENT HISTORY"));
        // Only the following cycle carries the buffer snapshot.
        assert!(prompts[3].contains("RECENT HISTORY"));
        assert!(prompts[3].contains("raw stream chunk"));
    }

    #[tokio::test(start_paused = true)]
    async fn reinjection_flag_is_consumed_once() {
        let mut h = harness(
            vec![PollOutcome::Work, PollOutcome::Work, PollOutcome::Work],
            vec![ok(0, 0), compacted(), ok(0, 0), ok(0, 0)],
        );
        h.daemon.run().await;

        let prompts = h.prompts.lock();
        assert!(prompts[2].contains("RECENT HISTORY"));
        assert!(!prompts[3].contains("RECENT HISTORY"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_streak_counts_and_resets() {
        let mut h = harness(
            vec![
                PollOutcome::Work,
                PollOutcome::Work,
                PollOutcome::Work,
                PollOutcome::Work,
            ],
            vec![
                ok(0, 0), // boot
                ok(1, 1),
                UsageSnapshot::error("claude exited with code 1"),
                UsageSnapshot::error("claude exited with code 1"),
                ok(1, 1),
            ],
        );
        h.daemon.run().await;

        let failures: Vec<u32> = h
            .status
            .records
            .lock()
            .iter()
            .filter(|r| matches!(r.status, DaemonStatus::Idle | DaemonStatus::Error))
            .map(|r| r.consecutive_failures)
            .collect();
        // Boot, then the four cycles.
        assert_eq!(failures, vec![0, 0, 1, 2, 0]);

        let errored: Vec<Option<String>> = h
            .status
            .records
            .lock()
            .iter()
            .filter(|r| r.status == DaemonStatus::Error)
            .map(|r| r.last_error.clone())
            .collect();
        assert_eq!(errored.len(), 2);
        assert!(errored[0].as_deref().unwrap().contains("exited with code 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_stops_without_further_invocations() {
        let mut h = harness(vec![PollOutcome::Dismissed], vec![ok(0, 0)]);
        h.daemon.run().await;

        // Only the boot invocation ever ran.
        assert_eq!(h.prompts.lock().len(), 1);
        assert!(h.stop.is_cancelled());
        let records = h.status.records.lock();
        assert_eq!(records.last().unwrap().status, DaemonStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn no_work_polls_do_not_invoke_or_publish() {
        let mut h = harness(
            vec![PollOutcome::NoWork, PollOutcome::NoWork, PollOutcome::Dismissed],
            vec![ok(0, 0)],
        );
        h.daemon.run().await;

        assert_eq!(h.prompts.lock().len(), 1);
        let statuses: Vec<DaemonStatus> =
            h.status.records.lock().iter().map(|r| r.status).collect();
        // No-work iterations leave the published state alone.
        assert_eq!(
            statuses,
            vec![DaemonStatus::Working, DaemonStatus::Idle, DaemonStatus::Stopped]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn usage_accumulates_across_successes_only() {
        let mut h = harness(
            vec![PollOutcome::Work, PollOutcome::Work, PollOutcome::Work],
            vec![
                ok(0, 0), // boot
                ok(10, 5),
                UsageSnapshot::error("timeout"),
                ok(7, 3),
            ],
        );
        h.daemon.run().await;

        let reports = h.usage.reports.lock();
        // Boot and the two successful cycles report; the failure doesn't.
        assert_eq!(reports.len(), 3);
        let (totals, last) = reports.last().unwrap();
        assert_eq!(totals.input_tokens, 17);
        assert_eq!(totals.output_tokens, 8);
        assert_eq!(last.input_tokens, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_failure_does_not_block_the_loop() {
        let mut h = harness(
            vec![PollOutcome::Work],
            vec![UsageSnapshot::error("command not found: claude"), ok(2, 2)],
        );
        h.daemon.run().await;

        // The work cycle still ran after the failed boot.
        assert_eq!(h.prompts.lock().len(), 2);
        let records = h.status.records.lock();
        // Boot failure is logged, not published as an error state, and
        // does not feed the failure streak.
        assert!(records.iter().all(|r| r.status != DaemonStatus::Error));
        assert!(records.iter().all(|r| r.consecutive_failures == 0));
    }

    #[tokio::test]
    async fn stop_token_interrupts_backoff() {
        let mut h = harness(
            vec![PollOutcome::Work],
            vec![ok(0, 0), UsageSnapshot::error("claude exited with code 1")],
        );
        let status = h.status.clone();
        let stop = h.stop.clone();
        let mut daemon = h.daemon;

        let task = tokio::spawn(async move { daemon.run().await });
        // Give the daemon time to reach the 30s backoff sleep.
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.cancel();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("daemon did not stop during backoff")
            .unwrap();
        let records = status.records.lock();
        assert_eq!(records.last().unwrap().status, DaemonStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_prompt_differs_from_cycle_prompt() {
        let mut h = harness(vec![PollOutcome::Work], vec![ok(0, 0), ok(0, 0)]);
        h.daemon.run().await;

        let prompts = h.prompts.lock();
        assert!(prompts[0].contains("BOOT:"));
        assert!(!prompts[1].contains("BOOT:"));
        assert!(prompts[1].contains("You have new messages"));
    }
}
