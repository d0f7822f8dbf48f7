//! Per-agent daemon runtime.
//!
//! [`daemon::AgentDaemon`] owns the lifecycle; the other modules are its
//! collaborators: [`poller`] watches the mailbox, [`invoker`] runs the
//! model CLI and folds its stream, [`history`] keeps the compaction
//! recall buffer, [`prompt`] assembles cycle prompts, [`usage`] folds
//! token totals and [`backoff`] spaces out retries.

pub mod backoff;
pub mod daemon;
pub mod history;
pub mod invoker;
pub mod poller;
pub mod prompt;
pub mod usage;

pub use daemon::AgentDaemon;
pub use history::RollingBuffer;
pub use invoker::{CliInvoker, ModelRunner};
pub use poller::{InboxPoller, Mailbox, PollOutcome};
