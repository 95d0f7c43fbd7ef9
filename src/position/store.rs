//! Durable read checkpoints for followed log files.
//!
//! The position file is plain text with one entry per line:
//!
//! ```text
//! <path> <last directive block offset> <last read offset>
//! ```
//!
//! `-1` marks an offset that has not been recorded yet.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::error::PositionError;

/// Read checkpoint for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// The followed file.
    pub path: PathBuf,
    /// Start of the most recent directive block, if one has been seen.
    pub last_directive_block_offset: Option<u64>,
    /// Byte offset just past the last consumed line.
    pub last_read_offset: Option<u64>,
}

impl Position {
    /// Create a position with no recorded offsets.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_directive_block_offset: None,
            last_read_offset: None,
        }
    }

    /// Parse one line of the position file.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the line does not have exactly
    /// three whitespace-separated tokens or the offsets are not integers.
    pub fn parse_entry(line: &str) -> Result<Self, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [path, directive, read] = tokens.as_slice() else {
            return Err(format!("expected 3 fields, found {}", tokens.len()));
        };

        Ok(Self {
            path: PathBuf::from(path),
            last_directive_block_offset: parse_offset(directive)?,
            last_read_offset: parse_offset(read)?,
        })
    }

    /// Offset to start reading from; unset means the start of the file.
    #[must_use]
    pub fn read_offset(&self) -> u64 {
        self.last_read_offset.unwrap_or(0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.path.display(),
            format_offset(self.last_directive_block_offset),
            format_offset(self.last_read_offset)
        )
    }
}

fn parse_offset(token: &str) -> Result<Option<u64>, String> {
    let value: i64 = token
        .parse()
        .map_err(|_| format!("offset {token:?} is not an integer"))?;
    // Negative offsets only ever mean "unset".
    Ok(u64::try_from(value).ok())
}

fn format_offset(offset: Option<u64>) -> String {
    offset.map_or_else(|| "-1".to_string(), |o| o.to_string())
}

#[derive(Debug, Default)]
struct StoreState {
    positions: HashMap<PathBuf, Position>,
    /// When any checkpoint last changed.
    last_advanced: Option<SystemTime>,
}

/// Shared mapping of file path to [`Position`].
///
/// A store opened with a backing file loads it once and rewrites it whole on
/// every [`flush`](Self::flush). An in-memory store keeps positions for the
/// life of the process only.
#[derive(Debug)]
pub struct PositionStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl PositionStore {
    /// Open a store backed by `path`, loading existing entries.
    ///
    /// A missing file yields an empty store; it is created on first flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any line is malformed.
    /// A single bad line fails the whole load.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PositionError> {
        let path = path.into();
        let positions = if path.exists() {
            load_positions(&path)?
        } else {
            HashMap::new()
        };

        tracing::debug!(
            path = %path.display(),
            entries = positions.len(),
            "Loaded position file"
        );

        Ok(Self {
            path: Some(path),
            state: Mutex::new(StoreState {
                positions,
                last_advanced: None,
            }),
        })
    }

    /// Create a store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Get the position for `path`, creating an unset one if none exists.
    pub fn get(&self, path: &Path) -> Position {
        self.state()
            .positions
            .entry(path.to_path_buf())
            .or_insert_with(|| Position::new(path))
            .clone()
    }

    /// Look up a position without creating it.
    #[must_use]
    pub fn peek(&self, path: &Path) -> Option<Position> {
        self.state().positions.get(path).cloned()
    }

    /// Record new offsets for an existing entry.
    ///
    /// Entries that were removed are not recreated. Returns `true` if the
    /// stored offsets changed.
    pub fn update(&self, position: &Position) -> bool {
        let mut state = self.state();
        let Some(entry) = state.positions.get_mut(&position.path) else {
            return false;
        };
        if entry == position {
            return false;
        }
        entry.clone_from(position);
        state.last_advanced = Some(SystemTime::now());
        true
    }

    /// Remove and return the entry for `path`.
    pub fn remove(&self, path: &Path) -> Option<Position> {
        let mut state = self.state();
        let removed = state.positions.remove(path);
        if removed.is_some() {
            state.last_advanced = Some(SystemTime::now());
        }
        removed
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().positions.len()
    }

    /// Whether the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().positions.is_empty()
    }

    /// Write every entry to the backing file, replacing its contents.
    ///
    /// The file is written to a sibling temp file and renamed into place.
    /// In-memory stores do nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    pub fn flush(&self) -> Result<(), PositionError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        // Held across the write so concurrent flushes cannot interleave.
        let state = self.state();
        let mut entries: Vec<&Position> = state.positions.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut contents = String::new();
        for position in entries {
            // The file format is whitespace-delimited, so such a path could not be read back.
            if has_whitespace(&position.path) {
                tracing::warn!(
                    path = %position.path.display(),
                    "Not persisting position for path containing whitespace"
                );
                continue;
            }
            contents.push_str(&position.to_string());
            contents.push('\n');
        }

        atomic_write(path, contents.as_bytes()).map_err(|source| PositionError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            entries = state.positions.len(),
            "Wrote position file"
        );
        Ok(())
    }

    /// Flush only if a checkpoint changed after the backing file was last
    /// written.
    ///
    /// Returns `true` if a flush happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush_if_dirty(&self) -> Result<bool, PositionError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };

        let Some(last_advanced) = self.state().last_advanced else {
            return Ok(false);
        };

        let last_written = fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if last_advanced < last_written {
            return Ok(false);
        }

        self.flush()?;
        Ok(true)
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_positions(path: &Path) -> Result<HashMap<PathBuf, Position>, PositionError> {
    let content = fs::read_to_string(path).map_err(|source| PositionError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut positions = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let position = Position::parse_entry(line).map_err(|reason| PositionError::Parse {
            path: path.to_path_buf(),
            line_number: index + 1,
            line: line.to_string(),
            reason,
        })?;
        positions.insert(position.path.clone(), position);
    }
    Ok(positions)
}

fn has_whitespace(path: &Path) -> bool {
    path.to_string_lossy().chars().any(char::is_whitespace)
}

fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)
}
