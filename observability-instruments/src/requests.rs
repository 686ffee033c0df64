//! Request counting instrument fed by the host's request pipeline.

use std::sync::{Mutex, PoisonError};

use observability_primitives::Record;

use crate::{Collector, Instrument, InstrumentError, InstrumentResult};

const NAME: &str = "requests";

#[derive(Debug)]
struct Counts {
    total: u64,
    by_operation: Vec<u64>,
}

/// Counts every request plus an allow-listed set of `service.operation` pairs.
///
/// Pairs outside the allow-list only contribute to `total`. Allow-listed
/// counters are reported even while still zero, in configured order.
#[derive(Debug)]
pub struct RequestCounter {
    filter: Vec<String>,
    counts: Mutex<Counts>,
}

impl RequestCounter {
    /// Creates a counter tracking the supplied `service.operation` keys.
    #[must_use]
    pub fn new<I, S>(filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = Vec::new();
        for key in filter {
            let key = key.into();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let counts = Counts {
            total: 0,
            by_operation: vec![0; keys.len()],
        };
        Self {
            filter: keys,
            counts: Mutex::new(counts),
        }
    }

    /// Returns the configured allow-list.
    #[must_use]
    pub fn filter(&self) -> &[String] {
        &self.filter
    }

    /// Records one request handled by `service` for `operation`.
    pub fn on_request(&self, service: &str, operation: &str) {
        let slot = self.slot(service, operation);
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.total += 1;
        if let Some(index) = slot {
            counts.by_operation[index] += 1;
        }
    }

    /// Records a request for which the host could not resolve a service or operation.
    pub fn on_unrouted_request(&self) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.total += 1;
    }

    /// Resets every counter to zero.
    pub fn clear(&self) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.total = 0;
        counts.by_operation.iter_mut().for_each(|count| *count = 0);
    }

    /// Returns the current total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }

    fn slot(&self, service: &str, operation: &str) -> Option<usize> {
        self.filter.iter().position(|key| {
            key.strip_prefix(service)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|rest| rest == operation)
        })
    }
}

impl Instrument for RequestCounter {
    fn name(&self) -> &str {
        NAME
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let record = {
            let counts = self
                .counts
                .lock()
                .map_err(|_| InstrumentError::measurement(NAME, "request counter lock poisoned"))?;
            let mut record = Record::new().with("total", counts.total);
            for (key, count) in self.filter.iter().zip(&counts.by_operation) {
                record.insert(key.as_str(), *count);
            }
            record
        };
        sink.put(record);
        Ok(())
    }
}
