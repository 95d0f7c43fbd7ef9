//! Watcher module for W3C log files.
//!
//! Resolves path patterns, follows each matching file and delivers the
//! records it produces.

mod discovery;
mod error;
mod follower;
mod service;
mod sink;
mod watch_set;

pub use discovery::{resolve_pattern, resolve_patterns, split_patterns};
pub use error::{SinkError, WatcherError};
pub use follower::{
    CycleOutcome, FileFollower, FollowerHandle, FollowerOptions, FollowerState,
    DEFAULT_READ_INTERVAL, DEFAULT_READ_LINE_LIMIT, DIRECTIVE_SCAN_LIMIT,
};
pub use service::{ServiceOptions, TailService};
pub use sink::{Batch, ChannelSink, RecordSink, StdoutSink};
pub use watch_set::{RefreshSummary, WatchOptions, WatchSetManager};
