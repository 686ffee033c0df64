//! Composition of named instruments into a single snapshot record.

use observability_primitives::Record;
use serde_json::Value;
use tracing::debug;

use crate::{Collector, Instrument, InstrumentRegistry, InstrumentResult, ListCollector};

const DEFAULT_NAME: &str = "aggregate";

/// Instrument that folds the output of many named instruments into one record.
///
/// Each registered instrument reports into its own bucket, keyed by its
/// registration name. With `flatten` enabled, a bucket holding exactly one
/// record is stored as that record; every other bucket (including empty ones)
/// is stored as a list. With `flatten` disabled, buckets are always lists.
#[derive(Debug, Clone)]
pub struct AggregatingInstrument {
    name: String,
    instruments: InstrumentRegistry,
    flatten: bool,
}

impl AggregatingInstrument {
    /// Creates an aggregator over the supplied registry.
    #[must_use]
    pub fn new(instruments: InstrumentRegistry, flatten: bool) -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            instruments,
            flatten,
        }
    }

    /// Overrides the name reported by [`Instrument::name`].
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns `true` when single-record buckets are flattened.
    #[must_use]
    pub const fn flatten(&self) -> bool {
        self.flatten
    }

    /// Returns the aggregated instruments.
    #[must_use]
    pub fn instruments(&self) -> &InstrumentRegistry {
        &self.instruments
    }

    /// Measures every instrument and returns the combined record.
    ///
    /// # Errors
    ///
    /// Propagates the first measurement failure; no partial snapshot is returned.
    pub fn snapshot(&self) -> InstrumentResult<Record> {
        let mut record = Record::new();
        for (name, instrument) in self.instruments.iter() {
            let mut bucket = ListCollector::new();
            instrument
                .measure_and_report(&mut bucket)
                .inspect_err(|err| debug!(instrument = name, %err, "instrument measurement failed"))?;
            record.insert(name, self.bucket_value(bucket.into_records()));
        }
        Ok(record)
    }

    fn bucket_value(&self, mut records: Vec<Record>) -> Value {
        if self.flatten && records.len() == 1 {
            if let Some(only) = records.pop() {
                return only.into_value();
            }
        }
        Value::Array(records.into_iter().map(Record::into_value).collect())
    }
}

impl Instrument for AggregatingInstrument {
    fn name(&self) -> &str {
        &self.name
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let record = self.snapshot()?;
        sink.put(record);
        Ok(())
    }
}
