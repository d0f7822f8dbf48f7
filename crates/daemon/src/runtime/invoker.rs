//! Model-CLI invocation.
//!
//! One invocation = spawn the agent's CLI, fold its line stream into
//! three accumulators (raw capture into the rolling buffer, a bounded
//! console mirror, the terminal result), then turn exit conditions into
//! a [`UsageSnapshot`]. Invocation failure is a cycle outcome the
//! daemon retries with backoff, never a propagated error.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use ap_domain::config::AgentConfig;
use ap_domain::stream::{BoxStream, ModelEvent, ResultEvent, UsageSnapshot};
use ap_domain::TraceEvent;
use ap_providers::events;
use ap_providers::{InvocationRequest, ModelCli};

use crate::runtime::history::RollingBuffer;

/// Cap on mirrored stream text per invocation. The full stream always
/// lands in the agent log through the rolling buffer path; the mirror
/// exists so a human tailing the log sees the shape of a cycle without
/// megabytes of tool chatter.
const MAX_CONSOLE_STREAM_CHARS: usize = 12_000;

/// How long a child gets between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the exit status once the stream has closed.
const EXIT_GRACE: Duration = Duration::from_secs(30);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runner seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The daemon's view of "run the model once with this prompt".
///
/// The runner owns the resume-ready flag: it decides whether to try a
/// resume invocation, clears the flag when a resume attempt fails, and
/// sets it after any successful invocation. The daemon only reads the
/// flag for status records.
#[async_trait::async_trait]
pub trait ModelRunner: Send {
    async fn invoke(&mut self, prompt: &str, buffer: &mut RollingBuffer) -> UsageSnapshot;

    fn resume_ready(&self) -> bool;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream fold
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Console mirror with a fixed character budget.
struct ConsoleMirror<W: Write> {
    sink: W,
    budget: usize,
    shown: usize,
    hidden: usize,
}

impl<W: Write> ConsoleMirror<W> {
    fn new(sink: W, budget: usize) -> Self {
        Self {
            sink,
            budget,
            shown: 0,
            hidden: 0,
        }
    }

    /// Write as much of `text` as the remaining budget allows; the rest
    /// is only counted, so the end banner can say how much was hidden.
    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let remaining = self.budget.saturating_sub(self.shown);
        let mut cut = remaining.min(text.len());
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let visible = &text[..cut];
        if !visible.is_empty() {
            let _ = self.sink.write_all(visible.as_bytes());
            let _ = self.sink.flush();
            self.shown += visible.len();
        }
        self.hidden += text.len() - visible.len();
    }
}

/// What one drained stream amounted to.
#[derive(Debug, Default)]
struct StreamSummary {
    result: Option<ResultEvent>,
    compaction: bool,
    shown: usize,
    hidden: usize,
}

/// Single-pass fold over a model CLI's output lines.
///
/// Every line goes into the rolling buffer verbatim. Recognized events
/// drive the compaction flag and result extraction; everything else is
/// rendered for the console through the generic text-fragment walk.
struct StreamFold<'a, W: Write> {
    agent: String,
    buffer: &'a mut RollingBuffer,
    console: ConsoleMirror<W>,
    result: Option<ResultEvent>,
    compaction: bool,
}

impl<'a, W: Write> StreamFold<'a, W> {
    fn new(agent: &str, buffer: &'a mut RollingBuffer, sink: W) -> Self {
        Self {
            agent: agent.to_string(),
            buffer,
            console: ConsoleMirror::new(sink, MAX_CONSOLE_STREAM_CHARS),
            result: None,
            compaction: false,
        }
    }

    fn feed(&mut self, line: &str) {
        // Raw capture first: the buffer is the post-compaction recall
        // source and must see the stream exactly as emitted.
        self.buffer.append(&format!("{line}\n"));

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return;
        }

        let payload: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                match events::condense_oversized(trimmed) {
                    Some(summary) => self.console.write(&format!("[{summary}]\n")),
                    None => {
                        self.console.write(trimmed);
                        self.console.write("\n");
                    }
                }
                return;
            }
        };

        match events::parse_event(&payload) {
            Some(ModelEvent::Init { model, session_id, .. }) => {
                tracing::debug!(
                    agent = %self.agent,
                    model = %model,
                    session_id = %session_id,
                    "model stream opened"
                );
            }
            Some(ModelEvent::CompactBoundary { trigger, pre_tokens }) => {
                self.compaction = true;
                TraceEvent::CompactionDetected {
                    agent: self.agent.clone(),
                    trigger,
                    pre_tokens,
                }
                .emit();
            }
            Some(ModelEvent::AssistantText { text }) => self.console.write(&text),
            Some(ModelEvent::Notice { level, message }) => {
                self.console.write(&format!("[{level}] {message}\n"));
            }
            Some(ModelEvent::Result(result)) => {
                // Last one wins if a CLI ever emits more than one.
                self.result = Some(result);
            }
            None => {
                let rendered = events::text_fragments(&payload);
                if !rendered.is_empty() {
                    self.console.write(&rendered);
                } else if let Some(summary) = events::condense_oversized(trimmed) {
                    self.console.write(&format!("[{summary}]\n"));
                }
            }
        }
    }

    fn finish(self) -> StreamSummary {
        StreamSummary {
            result: self.result,
            compaction: self.compaction,
            shown: self.console.shown,
            hidden: self.console.hidden,
        }
    }
}

/// Drain a line stream into the fold, bounding the gap between lines.
/// Returns `true` when the no-output timeout fired.
async fn drain_stream<W: Write>(
    mut lines: BoxStream<'_, String>,
    fold: &mut StreamFold<'_, W>,
    no_output_timeout: Duration,
) -> bool {
    loop {
        match tokio::time::timeout(no_output_timeout, lines.next()).await {
            Ok(Some(line)) => fold.feed(&line),
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}

/// Merge a child's stdout and stderr into one line stream, in arrival
/// order. Ends when both pipes close.
fn merged_lines(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> BoxStream<'static, String> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(64);

    if let Some(out) = stdout {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    if let Some(err) = stderr {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(err).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    Box::pin(async_stream::stream! {
        while let Some(line) = rx.recv().await {
            yield line;
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLI-backed runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct RunAttempt {
    snapshot: UsageSnapshot,
    timed_out: bool,
}

/// Runs the agent's model CLI as a child process.
pub struct CliInvoker {
    agent: String,
    cli: Box<dyn ModelCli>,
    project_dir: PathBuf,
    no_output_timeout: Duration,
    resume_ready: bool,
}

impl CliInvoker {
    pub fn new(
        agent: &str,
        cfg: &AgentConfig,
        cli: Box<dyn ModelCli>,
        project_dir: PathBuf,
        resume_ready: bool,
    ) -> Self {
        Self {
            agent: agent.to_string(),
            cli,
            project_dir,
            no_output_timeout: Duration::from_secs(cfg.no_output_timeout_sec),
            resume_ready,
        }
    }

    async fn run_once(&self, req: &InvocationRequest, buffer: &mut RollingBuffer) -> RunAttempt {
        let program = self.cli.program();
        let invocation_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            agent = %self.agent,
            program,
            provider = %self.cli.kind(),
            resumed = req.resume,
            "exec"
        );
        TraceEvent::InvocationStarted {
            agent: self.agent.clone(),
            invocation_id: invocation_id.clone(),
            command: program.to_string(),
            resumed: req.resume,
        }
        .emit();
        println!("\n=== model-stream start: agent={} cmd={program} ===", self.agent);

        // CLAUDECODE is stripped so a nested claude session does not
        // refuse to start under a claude-launched daemon.
        let spawned = Command::new(program)
            .args(self.cli.args(req))
            .current_dir(&self.project_dir)
            .env_remove("CLAUDECODE")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    format!("command not found: {program}")
                } else {
                    format!("failed to launch {program}: {e}")
                };
                tracing::warn!(agent = %self.agent, program, error = %e, "spawn failed");
                self.print_stream_end(program, 0, 0);
                let snapshot = UsageSnapshot::error(message);
                self.finish_trace(&invocation_id, Some(127), false, &snapshot);
                return RunAttempt {
                    snapshot,
                    timed_out: false,
                };
            }
        };

        let lines = merged_lines(child.stdout.take(), child.stderr.take());
        let mut fold = StreamFold::new(&self.agent, buffer, std::io::stdout());
        let timed_out = drain_stream(lines, &mut fold, self.no_output_timeout).await;
        let summary = fold.finish();

        let exit_code = wait_with_deadline(&mut child, timed_out).await;
        self.print_stream_end(program, summary.shown, summary.hidden);

        let snapshot = self.snapshot_from(&summary, timed_out, exit_code);
        self.finish_trace(&invocation_id, exit_code, timed_out, &snapshot);
        RunAttempt { snapshot, timed_out }
    }

    fn snapshot_from(
        &self,
        summary: &StreamSummary,
        timed_out: bool,
        exit_code: Option<i32>,
    ) -> UsageSnapshot {
        let program = self.cli.program();
        let mut snapshot = if timed_out {
            UsageSnapshot::error(format!(
                "{} produced no output for {}s",
                self.cli.kind(),
                self.no_output_timeout.as_secs()
            ))
        } else {
            match exit_code {
                Some(0) => match &summary.result {
                    Some(result) if result.is_error => {
                        UsageSnapshot::error(format!("{program} reported an error result"))
                    }
                    Some(result) => UsageSnapshot {
                        input_tokens: result.input_tokens,
                        output_tokens: result.output_tokens,
                        context_window: result.context_window,
                        ..UsageSnapshot::default()
                    },
                    None if self.cli.capabilities().emits_result_event => UsageSnapshot::error(
                        format!("{program} stream ended without a result event"),
                    ),
                    // CLIs without a terminal event: a zero exit is the
                    // whole success signal, usage stays unknown.
                    None => UsageSnapshot::default(),
                },
                Some(code) => UsageSnapshot::error(format!("{program} exited with code {code}")),
                None => UsageSnapshot::error(format!("{program} terminated by signal")),
            }
        };
        snapshot.compaction = summary.compaction;
        snapshot
    }

    fn print_stream_end(&self, program: &str, shown: usize, hidden: usize) {
        if hidden > 0 {
            println!("\n[model-stream abbreviated: {hidden} chars hidden]");
        }
        println!(
            "=== model-stream end: agent={} cmd={program} shown={shown} chars ===",
            self.agent
        );
    }

    fn finish_trace(
        &self,
        invocation_id: &str,
        exit_code: Option<i32>,
        timed_out: bool,
        snapshot: &UsageSnapshot,
    ) {
        TraceEvent::InvocationFinished {
            agent: self.agent.clone(),
            invocation_id: invocation_id.to_string(),
            exit_code,
            timed_out,
            input_tokens: snapshot.input_tokens,
            output_tokens: snapshot.output_tokens,
            compaction: snapshot.compaction,
        }
        .emit();
    }
}

#[async_trait::async_trait]
impl ModelRunner for CliInvoker {
    async fn invoke(&mut self, prompt: &str, buffer: &mut RollingBuffer) -> UsageSnapshot {
        if self.resume_ready && self.cli.capabilities().supports_resume {
            let attempt = self.run_once(&InvocationRequest::resume(prompt), buffer).await;
            // A timed-out resume is not evidence the session is gone;
            // only a clean nonzero exit clears the flag.
            if attempt.timed_out || !attempt.snapshot.is_error {
                if !attempt.snapshot.is_error {
                    self.resume_ready = true;
                }
                return attempt.snapshot;
            }
            self.resume_ready = false;
            tracing::warn!(
                agent = %self.agent,
                resume = self.cli.resume_label(),
                error = attempt.snapshot.error.as_deref().unwrap_or("unknown"),
                "resume attempt failed; retrying without resume"
            );
        }

        let attempt = self.run_once(&InvocationRequest::fresh(prompt), buffer).await;
        if !attempt.snapshot.is_error {
            self.resume_ready = true;
        }
        attempt.snapshot
    }

    fn resume_ready(&self) -> bool {
        self.resume_ready
    }
}

/// Reap the child: SIGTERM first on timeout, then bounded waits with a
/// SIGKILL escalation. `None` means the exit status never materialized
/// (killed, or reaping failed).
async fn wait_with_deadline(child: &mut Child, timed_out: bool) -> Option<i32> {
    if timed_out {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        match tokio::time::timeout(KILL_GRACE, child.wait()).await {
            Ok(Ok(status)) => return status.code(),
            Ok(Err(_)) | Err(_) => {
                let _ = child.start_kill();
            }
        }
    }

    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => status.code(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "waiting for model CLI failed");
            None
        }
        Err(_) => {
            let _ = child.start_kill();
            match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                Ok(Ok(status)) => status.code(),
                _ => None,
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
