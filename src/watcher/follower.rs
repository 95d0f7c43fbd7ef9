//! Per-file read state machine.
//!
//! A follower owns one file's [`Position`] and [`DirectiveState`]. Every
//! read interval it picks up where the last cycle stopped, rebuilds the
//! directive context, reads a bounded batch of lines and hands the
//! resulting records to the sink.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::WatcherError;
use super::sink::{Batch, RecordSink};
use crate::position::{Position, PositionStore};
use crate::w3c::{is_directive, DirectiveState, Record, RecordBuilder};

/// Maximum number of lines read when rebuilding a directive block.
pub const DIRECTIVE_SCAN_LIMIT: usize = 20;

/// Default maximum number of lines read per cycle.
pub const DEFAULT_READ_LINE_LIMIT: usize = 1000;

/// Default delay between read cycles.
pub const DEFAULT_READ_INTERVAL: Duration = Duration::from_secs(60);

/// Tunables for a [`FileFollower`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowerOptions {
    /// Maximum lines consumed per cycle, directive lines included.
    pub read_line_limit: usize,
    /// Emit one key per `#Fields:` entry instead of `message`.
    pub expand_fields: bool,
    /// Delay between the end of one cycle and the start of the next.
    pub read_interval: Duration,
}

impl Default for FollowerOptions {
    fn default() -> Self {
        Self {
            read_line_limit: DEFAULT_READ_LINE_LIMIT,
            expand_fields: false,
            read_interval: DEFAULT_READ_INTERVAL,
        }
    }
}

/// Mutable state of a followed file.
#[derive(Debug, Clone)]
pub struct FollowerState {
    /// Read checkpoint.
    pub position: Position,
    /// Directives of the block currently in effect.
    pub directives: DirectiveState,
    /// When the last batch was produced.
    pub last_emit: SystemTime,
    /// Whether the last cycle stopped at the line limit rather than EOF.
    pub has_unread_lines: bool,
}

impl FollowerState {
    /// Fresh state for a newly watched file.
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position,
            directives: DirectiveState::new(),
            last_emit: SystemTime::UNIX_EPOCH,
            has_unread_lines: true,
        }
    }
}

/// Result of a single read cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The file is gone or cannot be opened; the next refresh cleans it up.
    Unavailable,
    /// Nothing changed since the last cycle.
    Unchanged,
    /// Lines were read. The batch may be empty.
    Read(Vec<Record>),
}

/// Follows a single W3C log file.
#[derive(Debug)]
pub struct FileFollower {
    state: FollowerState,
    builder: RecordBuilder,
    options: FollowerOptions,
    store: Arc<PositionStore>,
}

impl FileFollower {
    /// Create a follower starting from `position`.
    #[must_use]
    pub fn new(position: Position, store: Arc<PositionStore>, options: FollowerOptions) -> Self {
        let builder = RecordBuilder::new(position.path.to_string_lossy());
        Self {
            state: FollowerState::new(position),
            builder,
            options,
            store,
        }
    }

    /// The followed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state.position.path
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &FollowerState {
        &self.state
    }

    /// Run one read cycle.
    ///
    /// On success the position is advanced and written to the store before
    /// the records are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading fails part way through. The
    /// stored position is left untouched in that case.
    pub async fn read_cycle(&mut self) -> Result<CycleOutcome, WatcherError> {
        let path = self.state.position.path.clone();

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(CycleOutcome::Unavailable),
            Err(e) if is_unavailable(&e) => return Ok(CycleOutcome::Unavailable),
            Err(e) => return Err(e.into()),
        };
        let file_len = metadata.len();

        if !self.state.has_unread_lines
            && file_len == self.state.position.read_offset()
            && metadata
                .modified()
                .is_ok_and(|modified| modified <= self.state.last_emit)
        {
            return Ok(CycleOutcome::Unchanged);
        }

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if is_unavailable(&e) => return Ok(CycleOutcome::Unavailable),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);

        let mut position = self.state.position.clone();
        if exceeds(position.last_read_offset, file_len)
            || exceeds(position.last_directive_block_offset, file_len)
        {
            tracing::warn!(
                path = %path.display(),
                old_offset = position.read_offset(),
                new_len = file_len,
                "File truncated, reading from the start"
            );
            position = Position::new(&path);
            self.state.directives = DirectiveState::new();
        }

        let mut line = Vec::new();
        let mut in_block = false;

        if let Some(block_offset) = position.last_directive_block_offset {
            self.state.directives = DirectiveState::new();
            reader.seek(SeekFrom::Start(block_offset)).await?;

            let mut block_end = block_offset;
            for _ in 0..DIRECTIVE_SCAN_LIMIT {
                let Some(len) = next_line(&mut reader, &mut line).await? else {
                    break;
                };
                let text = String::from_utf8_lossy(&line);
                let text = text.trim();
                if !is_directive(text) {
                    break;
                }
                self.state.directives.apply(text);
                block_end += len as u64;
            }

            // The previous batch stopped inside this block; more of it may follow.
            let read_offset = position.read_offset();
            in_block = read_offset > block_offset && read_offset <= block_end;
        }

        let start = position.read_offset();
        reader.seek(SeekFrom::Start(start)).await?;

        let mut offset = start;
        let mut records = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut new_block_offset = None;
        let mut reached_eof = false;

        for _ in 0..self.options.read_line_limit {
            let Some(len) = next_line(&mut reader, &mut line).await? else {
                reached_eof = true;
                break;
            };
            let line_start = offset;
            offset += len as u64;

            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            if is_directive(text) {
                if !in_block {
                    new_block_offset = Some(line_start);
                    self.state.directives = DirectiveState::new();
                    in_block = true;
                }
                self.state.directives.apply(text);
                pending.push(text.to_string());
            } else {
                in_block = false;
                drain_directives(
                    &mut pending,
                    &self.builder,
                    &self.state.directives,
                    &mut records,
                );
                records.push(self.builder.data_record(
                    text,
                    &self.state.directives,
                    self.options.expand_fields,
                ));
            }
        }
        drain_directives(
            &mut pending,
            &self.builder,
            &self.state.directives,
            &mut records,
        );

        if offset > start {
            position.last_read_offset = Some(offset);
        }
        if new_block_offset.is_some() {
            position.last_directive_block_offset = new_block_offset;
        }
        self.store.update(&position);
        self.state.position = position;
        self.state.has_unread_lines = !reached_eof;
        self.state.last_emit = SystemTime::now();

        tracing::trace!(
            path = %path.display(),
            records = records.len(),
            offset,
            caught_up = reached_eof,
            unrecognized_directives = self.state.directives.unrecognized(),
            "Read cycle complete"
        );

        Ok(CycleOutcome::Read(records))
    }

    /// Start the follower's repeating read task.
    ///
    /// Each cycle waits the read interval, reads, and delivers a non-empty
    /// batch to `sink`. Failures are logged and never stop the loop.
    #[must_use]
    pub fn spawn(self, tag: String, sink: Arc<dyn RecordSink>) -> FollowerHandle {
        let path = self.path().to_path_buf();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(tag, sink, cancel.clone()));
        FollowerHandle { path, cancel, task }
    }

    async fn run(mut self, tag: String, sink: Arc<dyn RecordSink>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.options.read_interval) => {}
            }

            match self.read_cycle().await {
                Ok(CycleOutcome::Read(records)) if !records.is_empty() => {
                    let count = records.len();
                    let batch = Batch {
                        tag: tag.clone(),
                        path: self.path().to_path_buf(),
                        records,
                    };
                    match sink.emit(batch) {
                        Ok(()) => tracing::debug!(
                            path = %self.path().display(),
                            count,
                            "Emitted records"
                        ),
                        Err(e) => tracing::warn!(
                            path = %self.path().display(),
                            error = %e,
                            "Failed to deliver records"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path().display(),
                    error = %e,
                    "Read cycle failed"
                ),
            }
        }

        tracing::debug!(path = %self.path().display(), "Follower stopped");
    }
}

/// Handle to a running follower task.
#[derive(Debug)]
pub struct FollowerHandle {
    path: PathBuf,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FollowerHandle {
    /// Stop scheduling further cycles. A cycle already running completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the follower and wait for its task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(path = %self.path.display(), error = %e, "Follower task failed");
        }
    }
}

/// Read one newline-terminated line into `buf`.
///
/// Returns `None` at EOF, including when the last line has no newline yet:
/// the writer is mid-line and the line is left for a later cycle.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<usize>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let len = reader.read_until(b'\n', buf).await?;
    if len == 0 || buf.last() != Some(&b'\n') {
        return Ok(None);
    }
    Ok(Some(len))
}

fn drain_directives(
    pending: &mut Vec<String>,
    builder: &RecordBuilder,
    directives: &DirectiveState,
    records: &mut Vec<Record>,
) {
    records.extend(
        pending
            .drain(..)
            .map(|line| builder.directive_record(&line, directives)),
    );
}

fn exceeds(offset: Option<u64>, len: u64) -> bool {
    offset.is_some_and(|offset| offset > len)
}

fn is_unavailable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
    )
}
