//! Record delivery.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use super::error::SinkError;
use crate::w3c::Record;

/// The records produced by one read cycle of one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    /// Output tag, passed through unmodified from configuration.
    pub tag: String,
    /// The file the records were read from.
    pub path: PathBuf,
    /// Records in file order.
    pub records: Vec<Record>,
}

/// Destination for record batches.
///
/// Delivery is synchronous: a batch is handed over in full before the
/// follower arms its next cycle.
pub trait RecordSink: Send + Sync {
    /// Deliver one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be delivered.
    fn emit(&self, batch: Batch) -> Result<(), SinkError>;
}

/// Sink that forwards batches over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Batch>,
}

impl ChannelSink {
    /// Create a sink and the receiver its batches arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RecordSink for ChannelSink {
    fn emit(&self, batch: Batch) -> Result<(), SinkError> {
        self.tx.send(batch).map_err(|_| SinkError::ChannelClosed)
    }
}

/// Sink that prints one JSON object per record to stdout.
///
/// Each line has the shape `{"tag": ..., "record": {...}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[derive(Serialize)]
struct TaggedRecord<'a> {
    tag: &'a str,
    record: &'a Record,
}

impl StdoutSink {
    fn write_batch(out: &mut impl Write, batch: &Batch) -> Result<(), SinkError> {
        for record in &batch.records {
            serde_json::to_writer(
                &mut *out,
                &TaggedRecord {
                    tag: &batch.tag,
                    record,
                },
            )?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}

impl RecordSink for StdoutSink {
    fn emit(&self, batch: Batch) -> Result<(), SinkError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        Self::write_batch(&mut out, &batch)
    }
}
