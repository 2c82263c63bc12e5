//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("message not found: {0}")]
    NotFound(String),

    /// Insert with an id that already exists. Deliberate hardening over the
    /// original behavior of silently creating duplicate rows.
    #[error("duplicate message id: {0}")]
    DuplicateId(String),

    #[error("context chain exceeds maximum depth {depth}")]
    ChainTooDeep { depth: usize },

    #[error("parent chain cycle detected at message {0}")]
    CycleDetected(String),

    #[error("invalid role in stored row: {0:?}")]
    InvalidRole(String),

    #[error("storage operation timed out")]
    Timeout,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
