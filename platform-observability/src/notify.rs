//! Host notification boundary.
//!
//! The host reports lifecycle points by tracer id and event name instead of
//! calling hook methods directly. Nothing reported here can fail back into
//! the host: malformed notifications are logged and dropped.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::Arc;

use observability_tracing::{
    EventSourceEventKind, EventSourceHooks, EventSourceTracer, InvocationEventKind,
    InvocationRef, InvocationTracer, SourceRecord, TraceError,
};
use thiserror::Error;
use tracing::{error, trace, warn};

/// Tracers addressable through [`NotificationRouter::notify_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TracerId {
    /// Invocation lifecycle tracer.
    Invocation,
    /// Queue-to-function pipeline tracer.
    EventSource,
}

impl TracerId {
    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invocation => "invocation",
            Self::EventSource => "event_source",
        }
    }
}

impl fmt::Display for TracerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TracerId {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invocation" => Ok(Self::Invocation),
            "event_source" => Ok(Self::EventSource),
            other => Err(Rejection::UnknownTracer(other.to_owned())),
        }
    }
}

/// Identifiers the host has in scope when it reports an event.
///
/// Invocation events need `request_id` and `function_arn`; event source
/// events need `message_id` and `event_source_arn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventIdentifiers<'a> {
    /// Request id of the invocation.
    pub request_id: Option<&'a str>,
    /// ARN of the function.
    pub function_arn: Option<&'a str>,
    /// Id of the queue message.
    pub message_id: Option<&'a str>,
    /// ARN of the queue the message belongs to.
    pub event_source_arn: Option<&'a str>,
}

impl<'a> EventIdentifiers<'a> {
    /// Identifiers of one invocation.
    #[must_use]
    pub const fn invocation(request_id: &'a str, function_arn: &'a str) -> Self {
        Self {
            request_id: Some(request_id),
            function_arn: Some(function_arn),
            message_id: None,
            event_source_arn: None,
        }
    }

    /// Identifiers of one queue message.
    #[must_use]
    pub const fn message(message_id: &'a str, event_source_arn: &'a str) -> Self {
        Self {
            request_id: None,
            function_arn: None,
            message_id: Some(message_id),
            event_source_arn: Some(event_source_arn),
        }
    }

    /// Adds the invocation a message was delivered with.
    #[must_use]
    pub const fn with_invocation(mut self, request_id: &'a str, function_arn: &'a str) -> Self {
        self.request_id = Some(request_id);
        self.function_arn = Some(function_arn);
        self
    }

    /// Adds the function a message was dequeued for.
    #[must_use]
    pub const fn with_function(mut self, function_arn: &'a str) -> Self {
        self.function_arn = Some(function_arn);
        self
    }
}

/// Why a notification was dropped.
#[derive(Debug, Error)]
pub enum Rejection {
    /// The tracer name is not one of [`TracerId`].
    #[error("unknown tracer `{0}`")]
    UnknownTracer(String),
    /// No tracer is attached for the id.
    #[error("tracer `{0}` is not attached")]
    Detached(TracerId),
    /// The event name is not known to the tracer.
    #[error(transparent)]
    UnknownKind(#[from] TraceError),
    /// A required identifier was not supplied.
    #[error("missing identifier `{0}`")]
    MissingIdentifier(&'static str),
}

/// Dispatches named host notifications to the attached tracers.
#[derive(Debug, Clone, Default)]
pub struct NotificationRouter {
    invocation: Option<Arc<InvocationTracer>>,
    event_source: Option<Arc<EventSourceTracer>>,
}

impl NotificationRouter {
    /// Creates a router with no tracers attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the invocation tracer.
    #[must_use]
    pub fn with_invocation_tracer(mut self, tracer: Arc<InvocationTracer>) -> Self {
        self.invocation = Some(tracer);
        self
    }

    /// Attaches the event source tracer.
    #[must_use]
    pub fn with_event_source_tracer(mut self, tracer: Arc<EventSourceTracer>) -> Self {
        self.event_source = Some(tracer);
        self
    }

    /// Records `kind` on the tracer identified by `tracer`.
    ///
    /// Unknown kinds, missing identifiers and detached tracers are logged at
    /// `warn` and dropped.
    pub fn notify_event(
        &self,
        tracer: TracerId,
        kind: &str,
        ids: &EventIdentifiers<'_>,
        failure_cause: Option<&str>,
    ) {
        let dispatched = catch_unwind(AssertUnwindSafe(|| {
            self.dispatch(tracer, kind, ids, failure_cause)
        }));
        match dispatched {
            Ok(Ok(())) => trace!(%tracer, kind, "host notification recorded"),
            Ok(Err(rejection)) => {
                warn!(%tracer, kind, %rejection, "host notification dropped");
            }
            Err(_) => error!(%tracer, kind, "host notification panicked; event dropped"),
        }
    }

    /// Like [`Self::notify_event`], with the tracer given by name.
    pub fn notify_named(
        &self,
        tracer: &str,
        kind: &str,
        ids: &EventIdentifiers<'_>,
        failure_cause: Option<&str>,
    ) {
        match tracer.parse() {
            Ok(tracer) => self.notify_event(tracer, kind, ids, failure_cause),
            Err(rejection) => warn!(tracer, kind, %rejection, "host notification dropped"),
        }
    }

    fn dispatch(
        &self,
        tracer: TracerId,
        kind: &str,
        ids: &EventIdentifiers<'_>,
        failure_cause: Option<&str>,
    ) -> Result<(), Rejection> {
        match tracer {
            TracerId::Invocation => {
                let target = self.invocation.as_ref().ok_or(Rejection::Detached(tracer))?;
                let kind: InvocationEventKind = kind.parse()?;
                let invocation = InvocationRef::new(
                    required(ids.request_id, "request_id")?,
                    required(ids.function_arn, "function_arn")?,
                );
                target.record(kind, invocation, failure_cause);
            }
            TracerId::EventSource => {
                let target = self
                    .event_source
                    .as_ref()
                    .ok_or(Rejection::Detached(tracer))?;
                let kind: EventSourceEventKind = kind.parse()?;
                let record = SourceRecord::new(
                    required(ids.message_id, "message_id")?,
                    required(ids.event_source_arn, "event_source_arn")?,
                );
                if kind == EventSourceEventKind::MessageQueued {
                    target.on_message_queued(record.event_source_arn, record.message_id);
                } else {
                    target.record(
                        kind,
                        record,
                        ids.function_arn,
                        ids.request_id,
                        failure_cause,
                    );
                }
            }
        }
        Ok(())
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, Rejection> {
    value.ok_or(Rejection::MissingIdentifier(name))
}
