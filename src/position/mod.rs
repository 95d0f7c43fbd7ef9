//! Position tracking for followed log files.

mod error;
mod store;

pub use error::PositionError;
pub use store::{Position, PositionStore};
