//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::watcher::{FollowerOptions, ServiceOptions, WatchOptions};

/// Configuration for the tailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailConfig {
    /// Comma-separated glob patterns of log files to follow.
    #[serde(default = "default_path")]
    pub path: String,
    /// Tag attached to every emitted batch.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Position file. Positions are kept in memory only when unset.
    #[serde(default)]
    pub pos_file: Option<PathBuf>,
    /// Seconds between pattern re-resolutions.
    #[serde(default = "default_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Seconds between position file dirty checks.
    #[serde(default = "default_interval_secs")]
    pub flush_interval_secs: u64,
    /// Seconds between read cycles of a single file.
    #[serde(default = "default_interval_secs")]
    pub read_interval_secs: u64,
    /// Maximum lines consumed per read cycle.
    #[serde(default = "default_read_line_limit")]
    pub read_line_limit: usize,
    /// Merge mapped fields into the record top level.
    #[serde(default)]
    pub expand_fields: bool,
}

fn default_path() -> String {
    "C:/inetpub/logs/LogFiles/W3SVC*/**/*.log".to_string()
}

fn default_tag() -> String {
    "iis".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_read_line_limit() -> usize {
    crate::watcher::DEFAULT_READ_LINE_LIMIT
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            tag: default_tag(),
            pos_file: None,
            refresh_interval_secs: default_interval_secs(),
            flush_interval_secs: default_interval_secs(),
            read_interval_secs: default_interval_secs(),
            read_line_limit: default_read_line_limit(),
            expand_fields: false,
        }
    }
}

impl TailConfig {
    /// Build the service settings described by this configuration.
    ///
    /// Zero intervals are raised to one second and a zero line limit to one.
    #[must_use]
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            watch: WatchOptions {
                patterns: self.path.clone(),
                tag: self.tag.clone(),
                follower: FollowerOptions {
                    read_line_limit: self.read_line_limit.max(1),
                    expand_fields: self.expand_fields,
                    read_interval: secs(self.read_interval_secs),
                },
            },
            refresh_interval: secs(self.refresh_interval_secs),
            flush_interval: secs(self.flush_interval_secs),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}
