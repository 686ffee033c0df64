//! Instruments that read resource counts from host-owned stores.
//!
//! The host exposes its queue and function stores through
//! [`QueueInventory`] and [`FunctionInventory`]; the instruments here only
//! read them. Reads must be cheap, in-memory walks of host state.

use std::sync::Arc;

use observability_primitives::Record;
use serde::{Deserialize, Serialize};

use crate::{Collector, Instrument, InstrumentError, InstrumentResult};

/// Point-in-time message counts of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    /// Queue identifier (ARN).
    pub arn: String,
    /// Messages ready to be received.
    pub visible: usize,
    /// Messages received but not yet deleted.
    pub inflight: usize,
    /// Messages whose delivery delay has not elapsed yet.
    pub delayed: usize,
}

impl QueueState {
    /// Creates a state entry with all counts at zero.
    #[must_use]
    pub fn new(arn: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            visible: 0,
            inflight: 0,
            delayed: 0,
        }
    }
}

/// Read access to the host's queues.
pub trait QueueInventory: Send + Sync {
    /// Returns the current state of every queue.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::Measurement`] when the store cannot be read.
    fn queues(&self) -> InstrumentResult<Vec<QueueState>>;
}

/// Read access to the host's deployed functions.
pub trait FunctionInventory: Send + Sync {
    /// Returns the number of deployed functions.
    ///
    /// # Errors
    ///
    /// Returns [`InstrumentError::Measurement`] when the store cannot be read.
    fn function_count(&self) -> InstrumentResult<usize>;
}

/// One row per queue: `{queue, visible, invisible, delayed}`.
pub struct QueueStatistics {
    inventory: Arc<dyn QueueInventory>,
}

impl QueueStatistics {
    const NAME: &'static str = "queues";

    /// Creates the instrument over the supplied inventory.
    #[must_use]
    pub fn new(inventory: Arc<dyn QueueInventory>) -> Self {
        Self { inventory }
    }
}

impl Instrument for QueueStatistics {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let queues = self.inventory.queues().map_err(|err| rename(err, Self::NAME))?;
        for queue in queues {
            sink.put(
                Record::new()
                    .with("queue", queue.arn)
                    .with("visible", queue.visible)
                    .with("invisible", queue.inflight)
                    .with("delayed", queue.delayed),
            );
        }
        Ok(())
    }
}

/// Single-record summary of the host's queue and function stores.
pub struct ServiceMetrics {
    queues: Arc<dyn QueueInventory>,
    functions: Arc<dyn FunctionInventory>,
}

impl ServiceMetrics {
    const NAME: &'static str = "service_metrics";

    /// Creates the instrument over the supplied inventories.
    #[must_use]
    pub fn new(queues: Arc<dyn QueueInventory>, functions: Arc<dyn FunctionInventory>) -> Self {
        Self { queues, functions }
    }
}

impl Instrument for ServiceMetrics {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let queues = self.queues.queues().map_err(|err| rename(err, Self::NAME))?;
        let functions = self
            .functions
            .function_count()
            .map_err(|err| rename(err, Self::NAME))?;

        let queued: usize = queues.iter().map(|queue| queue.visible).sum();
        let inflight: usize = queues.iter().map(|queue| queue.inflight).sum();

        sink.put(
            Record::new()
                .with("sqs_queues", queues.len())
                .with("sqs_queued_messages", queued)
                .with("sqs_inflight_messages", inflight)
                .with("lambda_functions", functions),
        );
        Ok(())
    }
}

// Inventories report failures under their own label; the snapshot should name
// the instrument that was being measured.
fn rename(err: InstrumentError, instrument: &str) -> InstrumentError {
    match err {
        InstrumentError::Measurement { reason, .. } => {
            InstrumentError::measurement(instrument, reason)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ListCollector;
    use serde_json::json;

    #[derive(Default)]
    struct MockStore {
        queues: Mutex<Vec<QueueState>>,
        functions: usize,
        broken: bool,
    }

    impl QueueInventory for MockStore {
        fn queues(&self) -> InstrumentResult<Vec<QueueState>> {
            if self.broken {
                return Err(InstrumentError::measurement("store", "queue store vanished"));
            }
            Ok(self.queues.lock().unwrap().clone())
        }
    }

    impl FunctionInventory for MockStore {
        fn function_count(&self) -> InstrumentResult<usize> {
            Ok(self.functions)
        }
    }

    fn store() -> Arc<MockStore> {
        let standard = QueueState {
            visible: 3,
            inflight: 1,
            delayed: 2,
            ..QueueState::new("arn:aws:sqs:us-east-1:000000000000:orders")
        };
        let fifo = QueueState {
            visible: 5,
            inflight: 4,
            ..QueueState::new("arn:aws:sqs:us-east-1:000000000000:jobs.fifo")
        };
        Arc::new(MockStore {
            queues: Mutex::new(vec![standard, fifo]),
            functions: 7,
            broken: false,
        })
    }

    #[test]
    fn queue_statistics_reports_one_row_per_queue() {
        let instrument = QueueStatistics::new(store());
        let mut collector = ListCollector::new();
        instrument.measure_and_report(&mut collector).unwrap();

        let rows: Vec<_> = collector
            .into_records()
            .into_iter()
            .map(Record::into_value)
            .collect();
        assert_eq!(
            rows,
            [
                json!({
                    "queue": "arn:aws:sqs:us-east-1:000000000000:orders",
                    "visible": 3,
                    "invisible": 1,
                    "delayed": 2,
                }),
                json!({
                    "queue": "arn:aws:sqs:us-east-1:000000000000:jobs.fifo",
                    "visible": 5,
                    "invisible": 4,
                    "delayed": 0,
                }),
            ]
        );
    }

    #[test]
    fn service_metrics_sums_the_stores() {
        let store = store();
        let instrument = ServiceMetrics::new(store.clone(), store);
        let mut collector = ListCollector::new();
        instrument.measure_and_report(&mut collector).unwrap();

        assert_eq!(
            collector.into_records().remove(0).into_value(),
            json!({
                "sqs_queues": 2,
                "sqs_queued_messages": 8,
                "sqs_inflight_messages": 5,
                "lambda_functions": 7,
            })
        );
    }

    #[test]
    fn broken_inventory_is_a_measurement_failure() {
        let store = Arc::new(MockStore {
            broken: true,
            ..MockStore::default()
        });
        let instrument = QueueStatistics::new(store);
        let mut collector = ListCollector::new();
        let err = instrument
            .measure_and_report(&mut collector)
            .expect_err("broken store should fail");

        assert!(matches!(err, InstrumentError::Measurement { ref instrument, .. } if instrument == "queues"));
        assert!(collector.records().is_empty());
    }
}
