use chrono::{DateTime, Utc};
use thiserror::Error;

use vigil_core::{KeyringError, ValidationError};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("action validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("keyring error: {0}")]
    Keyring(#[from] KeyringError),

    #[error("action is scheduled for later ({0})")]
    NotYetDue(DateTime<Utc>),

    #[error("order '{0}' is not understood")]
    OrderNotUnderstood(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("inter-task queue closed")]
    PipeClosed,
}

pub type Result<T> = std::result::Result<T, AgentError>;
