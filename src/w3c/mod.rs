//! W3C extended log format support.
//!
//! Parses directive blocks and turns log lines into structured records.

mod directives;
mod record;
mod timestamp;

pub use directives::{is_directive, DirectiveState};
pub use record::{Record, RecordBuilder, LOG_PATH_KEY, MESSAGE_KEY, TIMESTAMP_KEY};
pub use timestamp::Timestamp;
