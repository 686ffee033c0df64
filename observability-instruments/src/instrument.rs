//! The instrument/collector protocol and the standard collectors.

use std::io::Write;
use std::sync::Arc;

use observability_primitives::Record;
use tracing::{info, warn};

use crate::InstrumentResult;

/// Destination for records produced by instruments.
pub trait Collector {
    /// Accepts one record. The collector owns it from here on.
    fn put(&mut self, record: Record);
}

/// A pluggable source of point-in-time measurements.
///
/// Implementations read their state synchronously, holding whatever internal
/// lock they need, and must not perform blocking I/O. A failed read fails the
/// whole call; instruments never retry.
pub trait Instrument: Send + Sync {
    /// Default name under which the instrument is registered.
    fn name(&self) -> &str;

    /// Reads the current state and writes zero or more records into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::Measurement`](crate::InstrumentError::Measurement)
    /// when the internal state cannot be read.
    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()>;
}

impl<T> Instrument for Arc<T>
where
    T: Instrument + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        (**self).measure_and_report(sink)
    }
}

/// Collects records into an ordered list handed back to the caller.
#[derive(Debug, Default)]
pub struct ListCollector {
    records: Vec<Record>,
}

impl ListCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records collected so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the collector, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl Collector for ListCollector {
    fn put(&mut self, record: Record) {
        self.records.push(record);
    }
}

/// Streams each record as one JSON line into a writer as soon as it arrives.
#[derive(Debug)]
pub struct JsonLinesCollector<W: Write> {
    writer: W,
    failures: usize,
}

impl<W: Write> JsonLinesCollector<W> {
    /// Wraps the supplied writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failures: 0,
        }
    }

    /// Number of records that could not be written.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, record: &Record) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> Collector for JsonLinesCollector<W> {
    fn put(&mut self, record: Record) {
        if let Err(err) = self.write_line(&record) {
            self.failures += 1;
            warn!(?err, "failed to stream metrics record");
        }
    }
}

/// Emits each record as an `info` tracing event.
#[derive(Debug, Default)]
pub struct TracingCollector;

impl Collector for TracingCollector {
    fn put(&mut self, record: Record) {
        match serde_json::to_string(&record) {
            Ok(encoded) => info!(record = %encoded, "metrics snapshot"),
            Err(err) => warn!(?err, "failed to encode metrics record"),
        }
    }
}
