//! Shared domain types for Apiary.
//!
//! Configuration, the model-stream event vocabulary, usage accounting
//! types, structured trace events, and the common error type used by
//! every other crate in the workspace.

pub mod config;
pub mod error;
pub mod stream;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
pub use stream::{ModelEvent, ModelUsage, ResultEvent, UsageSnapshot};
pub use trace::TraceEvent;
