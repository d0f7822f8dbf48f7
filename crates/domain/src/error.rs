/// Shared error type used across all Apiary crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("spawn {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
