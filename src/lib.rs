//! w3c-tail - Follow W3C extended log files and emit structured records.

pub mod config;
pub mod position;
pub mod w3c;
pub mod watcher;
