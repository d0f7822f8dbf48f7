//! Externally visible agent state for Apiary.
//!
//! File-backed status records and the session usage ledger, written
//! under the project's runtime state dir and read back by the CLI.

pub mod status;
pub mod usage;

pub use status::{DaemonStatus, FileStatusStore, StatusRecord, StatusSink};
pub use usage::{FileUsageLedger, SessionUsage, UsageRecord, UsageSink};
