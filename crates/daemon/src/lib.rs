//! The Apiary daemon and its supervisor CLI.
//!
//! One `apiary run <agent>` process per agent: it boots the agent,
//! polls the shared mailbox, and drives one model-CLI invocation per
//! work cycle. The remaining subcommands manage those processes from
//! the outside (start/stop/status/logs) through the runtime directory.

pub mod cli;
pub mod runtime;
