//! Position store error types.

use std::path::PathBuf;

/// Errors that can occur while loading or persisting positions.
#[derive(thiserror::Error, Debug)]
pub enum PositionError {
    /// A line of the position file is malformed.
    #[error("Invalid position entry at {path}:{line_number}: {reason} ({line:?})")]
    Parse {
        path: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },

    /// The position file could not be read.
    #[error("Failed to read position file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The position file could not be written.
    #[error("Failed to write position file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
