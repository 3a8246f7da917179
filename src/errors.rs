use std::io;
use thiserror::Error;

/// Failure outcome of a single task, surfaced through its handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("task was discarded by an abandon-mode shutdown before it started")]
    Cancelled,
    #[error("result channel closed without a value")]
    ChannelClosed,
    #[error("timed out waiting for task result")]
    Timeout,
}

/// Errors returned by pool-level operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is shutting down")]
    ShuttingDown,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}
