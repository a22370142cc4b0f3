use thiserror::Error;

use crate::chat::{MessageRole, SessionState};
use crate::llm::LlmError;

/// Errors raised when appending to a message log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("role '{0}' is not recorded in the message log")]
    UnloggedRole(MessageRole),

    #[error("timestamp {next} is earlier than the last logged message at {last}")]
    OutOfOrder { last: String, next: String },
}

/// Errors from the durable session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid session key: '{0}'")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record for session '{session_id}': {reason}")]
    Corrupt { session_id: String, reason: String },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Errors from the relational thread title sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("thread database connection error: {0}")]
    Connection(String),

    #[error("no thread row with id '{0}'")]
    ThreadNotFound(String),

    #[error("thread query error: {0}")]
    Query(String),
}

/// Errors surfaced by the session lifecycle controller.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation '{operation}' is not valid in state '{state}'")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("session already ended")]
    AlreadyEnded,

    #[error("completion gateway error: {0}")]
    Gateway(#[from] LlmError),

    #[error("session storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("message log error: {0}")]
    Log(#[from] LogError),
}
