//! Host process and runtime figures.

use std::thread;
use std::time::Instant;

use observability_primitives::Record;
use tokio::runtime::Handle;

use crate::{Collector, Instrument, InstrumentResult};

/// Reports process-level figures: available parallelism, tokio runtime load
/// and uptime since construction.
///
/// Runtime figures read as zero when measured outside a tokio runtime.
#[derive(Debug)]
pub struct SystemMetrics {
    started: Instant,
}

impl SystemMetrics {
    /// Creates the instrument; uptime is counted from this call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument for SystemMetrics {
    fn name(&self) -> &str {
        "system_metrics"
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let parallelism = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let (workers, alive_tasks) = Handle::try_current().map_or((0, 0), |handle| {
            let metrics = handle.metrics();
            (metrics.num_workers(), metrics.num_alive_tasks())
        });

        sink.put(
            Record::new()
                .with("available_parallelism", parallelism)
                .with("runtime_workers", workers)
                .with("runtime_alive_tasks", alive_tasks)
                .with("uptime_secs", self.started.elapsed().as_secs_f64()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListCollector;
    use serde_json::json;

    fn measure() -> Record {
        let mut collector = ListCollector::new();
        SystemMetrics::new()
            .measure_and_report(&mut collector)
            .unwrap();
        collector.into_records().remove(0)
    }

    #[test]
    fn outside_a_runtime_reports_zero_workers() {
        let record = measure();
        assert_eq!(record.get("runtime_workers"), Some(&json!(0)));
        assert_eq!(record.get("runtime_alive_tasks"), Some(&json!(0)));
        assert!(record.get("available_parallelism").and_then(|v| v.as_u64()).unwrap() >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn inside_a_runtime_reports_its_workers() {
        let record = measure();
        assert_eq!(record.get("runtime_workers"), Some(&json!(2)));
        let keys: Vec<_> = record.keys().cloned().collect();
        assert_eq!(
            keys,
            [
                "available_parallelism",
                "runtime_workers",
                "runtime_alive_tasks",
                "uptime_secs"
            ]
        );
    }
}
