//! Lifecycle hook traits called by the host, and the tracers implementing them.
//!
//! Hooks are synchronous and infallible from the host's point of view: they
//! stamp an event, append it to an in-memory buffer and return.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use observability_primitives::unix_timestamp;
use tracing::debug;

use crate::{
    EventSourceEvent, EventSourceEventKind, EventTracer, InvocationEvent, InvocationEventKind,
    TraceSource,
};

/// Identifiers of one function invocation, as the host has them in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationRef<'a> {
    /// Request id of the invocation.
    pub request_id: &'a str,
    /// ARN of the invoked function.
    pub function_arn: &'a str,
}

impl<'a> InvocationRef<'a> {
    /// Bundles the identifiers of one invocation.
    #[must_use]
    pub const fn new(request_id: &'a str, function_arn: &'a str) -> Self {
        Self {
            request_id,
            function_arn,
        }
    }
}

/// Points in the invocation lifecycle at which the host notifies observers.
pub trait InvocationHooks: Send + Sync {
    /// The invocation was put on the internal invoke queue.
    fn on_enqueue(&self, invocation: InvocationRef<'_>);
    /// A worker handed the invocation to its invoker pool.
    fn on_submit(&self, invocation: InvocationRef<'_>);
    /// The function is about to run.
    fn on_invoke_start(&self, invocation: InvocationRef<'_>);
    /// The function returned successfully.
    fn on_invoke_success(&self, invocation: InvocationRef<'_>);
    /// The function failed with the given classification.
    fn on_invoke_failure(&self, invocation: InvocationRef<'_>, cause: &str);
    /// A throttle or system error will cause the invocation to be retried.
    fn on_retry(&self, invocation: InvocationRef<'_>, cause: &str);
}

/// Records invocation lifecycle transitions into an [`EventTracer`].
#[derive(Debug, Default)]
pub struct InvocationTracer {
    events: EventTracer<InvocationEvent>,
}

impl InvocationTracer {
    /// Creates a tracer with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps and buffers one transition.
    pub fn record(
        &self,
        kind: InvocationEventKind,
        invocation: InvocationRef<'_>,
        failure_cause: Option<&str>,
    ) {
        let event = InvocationEvent {
            timestamp: unix_timestamp(),
            event: kind,
            request_id: invocation.request_id.to_owned(),
            function_arn: invocation.function_arn.to_owned(),
            failure_cause: failure_cause.map(str::to_owned),
        };
        self.events.append(event);
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl TraceSource for InvocationTracer {
    type Event = InvocationEvent;

    fn flush(&self) -> Vec<InvocationEvent> {
        self.events.drain()
    }
}

impl InvocationHooks for InvocationTracer {
    fn on_enqueue(&self, invocation: InvocationRef<'_>) {
        self.record(InvocationEventKind::Enqueued, invocation, None);
    }

    fn on_submit(&self, invocation: InvocationRef<'_>) {
        self.record(InvocationEventKind::Submitted, invocation, None);
    }

    fn on_invoke_start(&self, invocation: InvocationRef<'_>) {
        self.record(InvocationEventKind::Invoking, invocation, None);
    }

    fn on_invoke_success(&self, invocation: InvocationRef<'_>) {
        self.record(InvocationEventKind::Successful, invocation, None);
    }

    fn on_invoke_failure(&self, invocation: InvocationRef<'_>, cause: &str) {
        self.record(InvocationEventKind::Failed, invocation, Some(cause));
    }

    fn on_retry(&self, invocation: InvocationRef<'_>, cause: &str) {
        self.record(InvocationEventKind::Retry, invocation, Some(cause));
    }
}

/// Hooks that only emit `debug` tracing events.
#[derive(Debug, Default)]
pub struct TracingInvocationHooks;

impl InvocationHooks for TracingInvocationHooks {
    fn on_enqueue(&self, invocation: InvocationRef<'_>) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            "invocation enqueued"
        );
    }

    fn on_submit(&self, invocation: InvocationRef<'_>) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            "invocation submitted"
        );
    }

    fn on_invoke_start(&self, invocation: InvocationRef<'_>) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            "invocation started"
        );
    }

    fn on_invoke_success(&self, invocation: InvocationRef<'_>) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            "invocation succeeded"
        );
    }

    fn on_invoke_failure(&self, invocation: InvocationRef<'_>, cause: &str) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            cause,
            "invocation failed"
        );
    }

    fn on_retry(&self, invocation: InvocationRef<'_>, cause: &str) {
        debug!(
            request_id = invocation.request_id,
            function_arn = invocation.function_arn,
            cause,
            "invocation retried"
        );
    }
}

/// Forwards every invocation notification to a list of hooks, in order.
#[derive(Default)]
pub struct CompositeInvocationHooks {
    hooks: Vec<Arc<dyn InvocationHooks>>,
}

impl CompositeInvocationHooks {
    /// Creates a composite from the supplied hooks.
    #[must_use]
    pub fn new<I>(hooks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn InvocationHooks>>,
    {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }

    /// Adds a hook to the end of the fan-out list.
    pub fn push(&mut self, hooks: Arc<dyn InvocationHooks>) {
        self.hooks.push(hooks);
    }
}

impl fmt::Debug for CompositeInvocationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeInvocationHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl InvocationHooks for CompositeInvocationHooks {
    fn on_enqueue(&self, invocation: InvocationRef<'_>) {
        self.hooks.iter().for_each(|hooks| hooks.on_enqueue(invocation));
    }

    fn on_submit(&self, invocation: InvocationRef<'_>) {
        self.hooks.iter().for_each(|hooks| hooks.on_submit(invocation));
    }

    fn on_invoke_start(&self, invocation: InvocationRef<'_>) {
        self.hooks.iter().for_each(|hooks| hooks.on_invoke_start(invocation));
    }

    fn on_invoke_success(&self, invocation: InvocationRef<'_>) {
        self.hooks.iter().for_each(|hooks| hooks.on_invoke_success(invocation));
    }

    fn on_invoke_failure(&self, invocation: InvocationRef<'_>, cause: &str) {
        self.hooks
            .iter()
            .for_each(|hooks| hooks.on_invoke_failure(invocation, cause));
    }

    fn on_retry(&self, invocation: InvocationRef<'_>, cause: &str) {
        self.hooks.iter().for_each(|hooks| hooks.on_retry(invocation, cause));
    }
}

/// One queue message carried in an invocation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRecord<'a> {
    /// Id of the queue message.
    pub message_id: &'a str,
    /// ARN of the queue the message came from.
    pub event_source_arn: &'a str,
}

impl<'a> SourceRecord<'a> {
    /// Bundles the identifiers of one message.
    #[must_use]
    pub const fn new(message_id: &'a str, event_source_arn: &'a str) -> Self {
        Self {
            message_id,
            event_source_arn,
        }
    }

    fn from_queue(&self) -> bool {
        self.event_source_arn.contains("sqs")
    }
}

/// Points in the queue-to-function pipeline at which the host notifies observers.
pub trait EventSourceHooks: Send + Sync {
    /// An event source mapping was created for `source_arn`.
    fn on_mapping_created(&self, source_arn: &str);
    /// A message was put on the queue `queue_arn`.
    fn on_message_queued(&self, queue_arn: &str, message_id: &str);
    /// The poller received `message_ids` from `source_arn` for `function_arn`.
    fn on_messages_dequeued(&self, source_arn: &str, function_arn: &str, message_ids: &[&str]);
    /// The records were turned into an asynchronous invocation.
    fn on_invoke_queued(&self, invocation: InvocationRef<'_>, records: &[SourceRecord<'_>]);
    /// The function is being invoked synchronously with the records.
    fn on_invoke(&self, invocation: InvocationRef<'_>, records: &[SourceRecord<'_>]);
    /// The invocation completed; `error` is set when it returned an error.
    fn on_invoke_complete(
        &self,
        invocation: InvocationRef<'_>,
        records: &[SourceRecord<'_>],
        error: Option<&str>,
    );
    /// The invocation could not be attempted.
    fn on_invoke_exception(
        &self,
        invocation: InvocationRef<'_>,
        records: &[SourceRecord<'_>],
        cause: &str,
    );
}

/// Records the queue-to-function pipeline into an [`EventTracer`].
///
/// Only queues that back an event source mapping are traced on enqueue, and
/// per-record hooks skip records that did not originate from a queue.
#[derive(Debug, Default)]
pub struct EventSourceTracer {
    events: EventTracer<EventSourceEvent>,
    queues: RwLock<HashSet<String>>,
}

impl EventSourceTracer {
    /// Creates a tracer with no registered queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `queue_arn` backs a known event source mapping.
    #[must_use]
    pub fn is_registered(&self, queue_arn: &str) -> bool {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(queue_arn)
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Stamps and buffers one transition.
    ///
    /// Records unconditionally; queue registration and the per-record source
    /// filter are applied by the hook methods only.
    pub fn record(
        &self,
        kind: EventSourceEventKind,
        record: SourceRecord<'_>,
        function_arn: Option<&str>,
        request_id: Option<&str>,
        failure_cause: Option<&str>,
    ) {
        let event = EventSourceEvent {
            timestamp: unix_timestamp(),
            event: kind,
            message_id: record.message_id.to_owned(),
            event_source_arn: record.event_source_arn.to_owned(),
            function_arn: function_arn.map(str::to_owned),
            request_id: request_id.map(str::to_owned),
            failure_cause: failure_cause.map(str::to_owned),
        };
        self.events.append(event);
    }

    fn record_each(
        &self,
        kind: EventSourceEventKind,
        invocation: InvocationRef<'_>,
        records: &[SourceRecord<'_>],
        failure_cause: Option<&str>,
    ) {
        for record in records.iter().filter(|record| record.from_queue()) {
            self.record(
                kind,
                *record,
                Some(invocation.function_arn),
                Some(invocation.request_id),
                failure_cause,
            );
        }
    }
}

impl TraceSource for EventSourceTracer {
    type Event = EventSourceEvent;

    fn flush(&self) -> Vec<EventSourceEvent> {
        self.events.drain()
    }
}

impl EventSourceHooks for EventSourceTracer {
    fn on_mapping_created(&self, source_arn: &str) {
        if source_arn.contains(":sqs:") {
            self.queues
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(source_arn.to_owned());
        }
    }

    fn on_message_queued(&self, queue_arn: &str, message_id: &str) {
        if self.is_registered(queue_arn) {
            self.record(
                EventSourceEventKind::MessageQueued,
                SourceRecord::new(message_id, queue_arn),
                None,
                None,
                None,
            );
        }
    }

    fn on_messages_dequeued(&self, source_arn: &str, function_arn: &str, message_ids: &[&str]) {
        for message_id in message_ids {
            self.record(
                EventSourceEventKind::MessageDequeued,
                SourceRecord::new(message_id, source_arn),
                Some(function_arn),
                None,
                None,
            );
        }
    }

    fn on_invoke_queued(&self, invocation: InvocationRef<'_>, records: &[SourceRecord<'_>]) {
        self.record_each(EventSourceEventKind::InvokeQueued, invocation, records, None);
    }

    fn on_invoke(&self, invocation: InvocationRef<'_>, records: &[SourceRecord<'_>]) {
        self.record_each(EventSourceEventKind::Invoke, invocation, records, None);
    }

    fn on_invoke_complete(
        &self,
        invocation: InvocationRef<'_>,
        records: &[SourceRecord<'_>],
        error: Option<&str>,
    ) {
        let kind = if error.is_some() {
            EventSourceEventKind::InvokeError
        } else {
            EventSourceEventKind::InvokeSuccess
        };
        self.record_each(kind, invocation, records, error);
    }

    fn on_invoke_exception(
        &self,
        invocation: InvocationRef<'_>,
        records: &[SourceRecord<'_>],
        cause: &str,
    ) {
        self.record_each(EventSourceEventKind::InvokeException, invocation, records, Some(cause));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION: &str = "arn:aws:lambda:us-east-1:000000000000:function:worker";
    const QUEUE: &str = "arn:aws:sqs:us-east-1:000000000000:jobs";

    #[test]
    fn invocation_lifecycle_is_recorded_in_order() {
        let tracer = InvocationTracer::new();
        let invocation = InvocationRef::new("1", FUNCTION);
        tracer.on_enqueue(invocation);
        tracer.on_submit(invocation);
        tracer.on_invoke_start(invocation);
        tracer.on_invoke_failure(invocation, "Unhandled");
        tracer.on_retry(invocation, "TooManyRequestsException");
        tracer.on_invoke_success(invocation);

        let events = tracer.flush();
        let kinds: Vec<_> = events.iter().map(|event| event.event).collect();
        assert_eq!(
            kinds,
            [
                InvocationEventKind::Enqueued,
                InvocationEventKind::Submitted,
                InvocationEventKind::Invoking,
                InvocationEventKind::Failed,
                InvocationEventKind::Retry,
                InvocationEventKind::Successful,
            ]
        );
        assert_eq!(events[3].failure_cause.as_deref(), Some("Unhandled"));
        assert_eq!(events[0].failure_cause, None);
        assert!(events.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
        assert!(tracer.is_empty());
    }

    #[test]
    fn composite_fans_out_to_every_hook() {
        let first = Arc::new(InvocationTracer::new());
        let second = Arc::new(InvocationTracer::new());
        let mut composite = CompositeInvocationHooks::new([
            first.clone() as Arc<dyn InvocationHooks>,
            Arc::new(TracingInvocationHooks) as Arc<dyn InvocationHooks>,
        ]);
        composite.push(second.clone());

        composite.on_enqueue(InvocationRef::new("7", FUNCTION));
        composite.on_invoke_failure(InvocationRef::new("7", FUNCTION), "Timeout");

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn only_mapped_queues_trace_enqueues() {
        let tracer = EventSourceTracer::new();
        tracer.on_message_queued(QUEUE, "m-0");
        tracer.on_mapping_created("arn:aws:kinesis:us-east-1:000000000000:stream/s");
        tracer.on_mapping_created(QUEUE);
        tracer.on_message_queued(QUEUE, "m-1");
        tracer.on_message_queued("arn:aws:sqs:us-east-1:000000000000:other", "m-2");

        let events = tracer.flush();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, EventSourceEventKind::MessageQueued);
        assert_eq!(events[0].message_id, "m-1");
        assert_eq!(events[0].function_arn, None);
        assert!(!tracer.is_registered("arn:aws:kinesis:us-east-1:000000000000:stream/s"));
    }

    #[test]
    fn per_record_hooks_skip_non_queue_records() {
        let tracer = EventSourceTracer::new();
        let invocation = InvocationRef::new("req-1", FUNCTION);
        let records = [
            SourceRecord::new("m-1", QUEUE),
            SourceRecord::new("s-1", "arn:aws:kinesis:us-east-1:000000000000:stream/s"),
            SourceRecord::new("m-2", QUEUE),
        ];

        tracer.on_invoke(invocation, &records);
        tracer.on_invoke_complete(invocation, &records, Some("Unhandled"));

        let events = tracer.flush();
        let summary: Vec<_> = events
            .iter()
            .map(|event| (event.event, event.message_id.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                (EventSourceEventKind::Invoke, "m-1"),
                (EventSourceEventKind::Invoke, "m-2"),
                (EventSourceEventKind::InvokeError, "m-1"),
                (EventSourceEventKind::InvokeError, "m-2"),
            ]
        );
        assert_eq!(events[2].request_id.as_deref(), Some("req-1"));
        assert_eq!(events[2].failure_cause.as_deref(), Some("Unhandled"));
    }

    #[test]
    fn dequeue_and_completion_without_error() {
        let tracer = EventSourceTracer::new();
        tracer.on_messages_dequeued(QUEUE, FUNCTION, &["m-1", "m-2"]);
        tracer.on_invoke_complete(
            InvocationRef::new("req-2", FUNCTION),
            &[SourceRecord::new("m-1", QUEUE)],
            None,
        );
        tracer.on_invoke_exception(
            InvocationRef::new("req-3", FUNCTION),
            &[SourceRecord::new("m-2", QUEUE)],
            "ConnectionError",
        );

        let events = tracer.flush();
        let kinds: Vec<_> = events.iter().map(|event| event.event).collect();
        assert_eq!(
            kinds,
            [
                EventSourceEventKind::MessageDequeued,
                EventSourceEventKind::MessageDequeued,
                EventSourceEventKind::InvokeSuccess,
                EventSourceEventKind::InvokeException,
            ]
        );
        assert_eq!(events[0].request_id, None);
        assert_eq!(events[0].function_arn.as_deref(), Some(FUNCTION));
        assert_eq!(events[2].failure_cause, None);
    }
}
