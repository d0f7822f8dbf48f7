//! Model-CLI adapters for Apiary.
//!
//! One adapter per supported coding-agent CLI (claude, codex, gemini,
//! opencode), a shared parser for their line-delimited JSON output, and
//! the registry that picks an adapter from agent config.

pub mod claude;
pub mod codex;
pub mod events;
pub mod gemini;
pub mod opencode;
pub mod registry;
pub mod traits;

// Re-exports for convenience.
pub use registry::cli_for;
pub use traits::{CliCapabilities, InvocationRequest, ModelCli};
