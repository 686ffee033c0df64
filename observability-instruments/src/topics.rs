//! Per-topic publish and delivery counters.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use observability_primitives::Record;

use crate::{Collector, Instrument, InstrumentError, InstrumentResult};

const NAME: &str = "topics";

#[derive(Debug, Default, Clone, Copy)]
struct TopicCounts {
    published: u64,
    delivered: u64,
    failed: u64,
}

/// Counts messages published to each topic and the outcome of their fan-out.
///
/// Rows are reported in topic-ARN order, one per topic seen so far.
#[derive(Debug, Default)]
pub struct TopicStatistics {
    topics: Mutex<BTreeMap<String, TopicCounts>>,
}

impl TopicStatistics {
    /// Creates an instrument with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` messages published to `topic_arn`.
    pub fn on_publish(&self, topic_arn: &str, count: u64) {
        self.update(topic_arn, |counts| counts.published += count);
    }

    /// Records the outcome of delivering one message to a subscriber.
    pub fn on_delivery(&self, topic_arn: &str, success: bool) {
        self.update(topic_arn, |counts| {
            if success {
                counts.delivered += 1;
            } else {
                counts.failed += 1;
            }
        });
    }

    /// Forgets every topic.
    pub fn clear(&self) {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn update(&self, topic_arn: &str, apply: impl FnOnce(&mut TopicCounts)) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        apply(topics.entry(topic_arn.to_owned()).or_default());
    }
}

impl Instrument for TopicStatistics {
    fn name(&self) -> &str {
        NAME
    }

    fn measure_and_report(&self, sink: &mut dyn Collector) -> InstrumentResult<()> {
        let rows: Vec<(String, TopicCounts)> = {
            let topics = self
                .topics
                .lock()
                .map_err(|_| InstrumentError::measurement(NAME, "topic table lock poisoned"))?;
            topics.iter().map(|(arn, counts)| (arn.clone(), *counts)).collect()
        };

        for (arn, counts) in rows {
            sink.put(
                Record::new()
                    .with("topic_arn", arn)
                    .with("published", counts.published)
                    .with("delivered", counts.delivered)
                    .with("failed", counts.failed),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListCollector;
    use serde_json::json;

    #[test]
    fn rows_are_sorted_by_topic() {
        let topics = TopicStatistics::new();
        topics.on_publish("arn:aws:sns:us-east-1:000000000000:zeta", 1);
        topics.on_publish("arn:aws:sns:us-east-1:000000000000:alpha", 2);
        topics.on_delivery("arn:aws:sns:us-east-1:000000000000:alpha", true);
        topics.on_delivery("arn:aws:sns:us-east-1:000000000000:alpha", false);

        let mut collector = ListCollector::new();
        topics.measure_and_report(&mut collector).unwrap();
        let rows: Vec<_> = collector
            .into_records()
            .into_iter()
            .map(Record::into_value)
            .collect();

        assert_eq!(
            rows,
            [
                json!({
                    "topic_arn": "arn:aws:sns:us-east-1:000000000000:alpha",
                    "published": 2,
                    "delivered": 1,
                    "failed": 1,
                }),
                json!({
                    "topic_arn": "arn:aws:sns:us-east-1:000000000000:zeta",
                    "published": 1,
                    "delivered": 0,
                    "failed": 0,
                }),
            ]
        );
    }

    #[test]
    fn no_topics_means_no_rows() {
        let topics = TopicStatistics::new();
        topics.on_publish("arn:aws:sns:us-east-1:000000000000:alpha", 1);
        topics.clear();

        let mut collector = ListCollector::new();
        topics.measure_and_report(&mut collector).unwrap();
        assert!(collector.records().is_empty());
    }
}
