//! Snapshot queries served to the HTTP layer.

use observability_primitives::{Record, unix_timestamp};
use serde_json::Value;

use crate::{AggregatingInstrument, InstrumentRegistry, InstrumentResult, ListCollector};

/// Read-only query surface over a set of named instruments.
///
/// Every query measures on demand; nothing is cached between calls. Errors
/// carry an [`InstrumentError::status_code`](crate::InstrumentError::status_code)
/// for the transport to answer with.
#[derive(Debug, Clone)]
pub struct MetricsEndpoint {
    registry: InstrumentRegistry,
    flatten: bool,
}

impl MetricsEndpoint {
    /// Creates an endpoint over `registry`, flattening single-record buckets.
    #[must_use]
    pub fn new(registry: InstrumentRegistry) -> Self {
        Self {
            registry,
            flatten: true,
        }
    }

    /// Selects flatten or grouped aggregation for [`Self::get_all_metrics`].
    #[must_use]
    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Returns the instruments served by this endpoint.
    #[must_use]
    pub fn registry(&self) -> &InstrumentRegistry {
        &self.registry
    }

    /// Aggregates the requested instruments, or all of them when `filter` is
    /// empty, and stamps the result with a `timestamp` field.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::NotFound`](crate::InstrumentError::NotFound)
    /// for an unknown name in `filter`, or the first measurement failure.
    pub fn get_all_metrics<S: AsRef<str>>(&self, filter: &[S]) -> InstrumentResult<Record> {
        let registry = if filter.is_empty() {
            self.registry.clone()
        } else {
            self.registry.select(filter)?
        };
        let mut record = AggregatingInstrument::new(registry, self.flatten).snapshot()?;
        record.insert("timestamp", unix_timestamp());
        Ok(record)
    }

    /// Returns the records of one instrument, unaggregated.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::NotFound`](crate::InstrumentError::NotFound)
    /// for an unknown name, or the instrument's measurement failure.
    pub fn get_metrics(&self, name: &str) -> InstrumentResult<Vec<Record>> {
        let instrument = self.registry.get(name)?;
        let mut collector = ListCollector::new();
        instrument.measure_and_report(&mut collector)?;
        Ok(collector.into_records())
    }

    /// Returns `{timestamp, <name>: [records...]}` for one instrument.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_metrics`].
    pub fn instrument_snapshot(&self, name: &str) -> InstrumentResult<Record> {
        let records = self.get_metrics(name)?;
        let rows = Value::Array(records.into_iter().map(Record::into_value).collect());
        Ok(Record::new()
            .with("timestamp", unix_timestamp())
            .with(name, rows))
    }
}
