//! Error types for the simulation core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("GPX track invalid: {0}")]
    GpxInvalid(String),

    #[error("engine already running")]
    AlreadyRunning,

    #[error("engine not running")]
    NotRunning,

    #[error("socket bind failed: {0}")]
    SocketBindFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
