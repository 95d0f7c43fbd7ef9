//! Watcher error types.

use crate::position::PositionError;

/// Errors that can occur while following log files.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// A configured path pattern is not a valid glob.
    #[error("Invalid path pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// Position store error.
    #[error("Position store error: {0}")]
    Position(#[from] PositionError),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while delivering records.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// The receiving side of a channel sink was dropped.
    #[error("Channel closed")]
    ChannelClosed,

    /// Records could not be encoded.
    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Records could not be written.
    #[error("Failed to write records: {0}")]
    Io(#[from] std::io::Error),
}
